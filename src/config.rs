use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use chrono::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
  pub api: ApiConfig,
  /// Profile id the session acts as.
  pub profile: String,
  #[serde(default)]
  pub cache: CacheConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
  pub url: String,
}

/// Per-collection time-to-live overrides, in seconds.
///
/// How long a fetched entry is served without a background refresh. Chat
/// moves fastest, shelves and reviews slowest.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
  pub comments_ttl_secs: u64,
  pub reviews_ttl_secs: u64,
  pub shelves_ttl_secs: u64,
  pub conversations_ttl_secs: u64,
  pub messages_ttl_secs: u64,
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self {
      comments_ttl_secs: 180,
      reviews_ttl_secs: 300,
      shelves_ttl_secs: 300,
      conversations_ttl_secs: 120,
      messages_ttl_secs: 60,
    }
  }
}

impl CacheConfig {
  pub fn comments_ttl(&self) -> Duration {
    Duration::seconds(self.comments_ttl_secs as i64)
  }

  pub fn reviews_ttl(&self) -> Duration {
    Duration::seconds(self.reviews_ttl_secs as i64)
  }

  pub fn shelves_ttl(&self) -> Duration {
    Duration::seconds(self.shelves_ttl_secs as i64)
  }

  pub fn conversations_ttl(&self) -> Duration {
    Duration::seconds(self.conversations_ttl_secs as i64)
  }

  pub fn messages_ttl(&self) -> Duration {
    Duration::seconds(self.messages_ttl_secs as i64)
  }
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./folio.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/folio/config.yaml
  /// 4. ~/.config/folio/config.yaml
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    match path {
      Some(p) => Self::load_from_path(&p),
      None => Err(eyre!(
        "No configuration file found. Create one at ~/.config/folio/config.yaml"
      )),
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    // Check current directory
    let local = PathBuf::from("folio.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("folio").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    let config: Config = serde_yaml::from_str(&contents)
      .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))?;

    Ok(config)
  }

  /// Get the Folio API token from environment variables.
  ///
  /// Checks FOLIO_TOKEN first, then FOLIO_API_TOKEN as fallback.
  pub fn api_token() -> Result<String> {
    std::env::var("FOLIO_TOKEN")
      .or_else(|_| std::env::var("FOLIO_API_TOKEN"))
      .map_err(|_| {
        eyre!("Folio API token not found. Set FOLIO_TOKEN or FOLIO_API_TOKEN environment variable.")
      })
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_cache_section_is_optional() {
    let config: Config = serde_yaml::from_str(
      "api:\n  url: https://api.folio.test/v1\nprofile: p1\n",
    )
    .unwrap();

    assert_eq!(config.profile, "p1");
    assert_eq!(config.cache.messages_ttl(), Duration::seconds(60));
    assert_eq!(config.cache.reviews_ttl(), Duration::minutes(5));
  }

  #[test]
  fn test_ttl_overrides_apply_per_collection() {
    let config: Config = serde_yaml::from_str(
      "api:\n  url: https://api.folio.test/v1\nprofile: p1\ncache:\n  comments_ttl_secs: 30\n",
    )
    .unwrap();

    assert_eq!(config.cache.comments_ttl(), Duration::seconds(30));
    // Unlisted collections keep their defaults.
    assert_eq!(config.cache.shelves_ttl(), Duration::minutes(5));
  }
}

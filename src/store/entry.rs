//! Core cache value types.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::error::SyncError;

/// A cached collection for one resource key.
///
/// Items are kept in display order. The `refreshed_at` stamp marks the last
/// time the collection was confirmed against the server and only ever moves
/// forward for a given key.
#[derive(Debug, Clone)]
pub struct CacheEntry<T> {
  pub items: Arc<Vec<T>>,
  pub refreshed_at: DateTime<Utc>,
}

impl<T> CacheEntry<T> {
  pub fn len(&self) -> usize {
    self.items.len()
  }

  pub fn is_empty(&self) -> bool {
    self.items.is_empty()
  }
}

/// Where the data of a cached read came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheSource {
  /// Fetched from the network by this read (cache miss).
  Network,
  /// Served from cache within its TTL window.
  Fresh,
  /// Served from cache past its TTL; a background refresh was dispatched.
  Stale,
}

/// Result of a cached read, including where the data came from.
#[derive(Debug, Clone)]
pub struct CacheRead<T> {
  pub items: Arc<Vec<T>>,
  pub source: CacheSource,
  pub refreshed_at: DateTime<Utc>,
}

impl<T> CacheRead<T> {
  pub(crate) fn from_network(items: Arc<Vec<T>>) -> Self {
    Self {
      items,
      source: CacheSource::Network,
      refreshed_at: Utc::now(),
    }
  }

  pub(crate) fn from_cache(entry: CacheEntry<T>, stale: bool) -> Self {
    Self {
      items: entry.items,
      source: if stale {
        CacheSource::Stale
      } else {
        CacheSource::Fresh
      },
      refreshed_at: entry.refreshed_at,
    }
  }

  /// True when stale data was served and a refresh is under way.
  pub fn served_stale(&self) -> bool {
    self.source == CacheSource::Stale
  }
}

/// Snapshot published to subscribers whenever a keyed collection changes.
///
/// `items` is `None` until the first successful fill, which is how a view
/// tells "not loaded yet" apart from "loaded and empty". `loading` is only
/// raised for first loads; background refreshes keep serving the current
/// items without flicker. A fetch error is kept alongside the last good
/// items so the view can show both.
#[derive(Debug, Clone)]
pub struct CollectionState<T> {
  pub items: Option<Arc<Vec<T>>>,
  pub loading: bool,
  pub error: Option<SyncError>,
}

impl<T> CollectionState<T> {
  pub fn is_loading(&self) -> bool {
    self.loading
  }

  pub fn items(&self) -> Option<&[T]> {
    self.items.as_deref().map(|v| v.as_slice())
  }

  pub fn error(&self) -> Option<&SyncError> {
    self.error.as_ref()
  }
}

impl<T> Default for CollectionState<T> {
  fn default() -> Self {
    Self {
      items: None,
      loading: false,
      error: None,
    }
  }
}

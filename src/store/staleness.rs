//! TTL policy for cached collections.

use chrono::{DateTime, Duration, Utc};

/// True when `refreshed_at` is older than `ttl` as of `now`.
///
/// Pure elapsed-time comparison. Staleness never blocks a read: callers serve
/// the stale entry immediately and dispatch a background refresh.
pub fn is_stale(refreshed_at: DateTime<Utc>, ttl: Duration, now: DateTime<Utc>) -> bool {
  now - refreshed_at > ttl
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_fresh_within_ttl() {
    let now = Utc::now();
    let refreshed = now - Duration::seconds(30);
    assert!(!is_stale(refreshed, Duration::seconds(120), now));
  }

  #[test]
  fn test_stale_past_ttl() {
    let now = Utc::now();
    let refreshed = now - Duration::seconds(300);
    assert!(is_stale(refreshed, Duration::seconds(120), now));
  }

  #[test]
  fn test_zero_ttl_is_immediately_stale() {
    let now = Utc::now();
    let refreshed = now - Duration::milliseconds(1);
    assert!(is_stale(refreshed, Duration::zero(), now));
  }

  #[test]
  fn test_exact_boundary_is_not_stale() {
    let now = Utc::now();
    let refreshed = now - Duration::seconds(120);
    assert!(!is_stale(refreshed, Duration::seconds(120), now));
  }
}

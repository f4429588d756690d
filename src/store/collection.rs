//! Read path for one entity kind: cache first, coalesced fetches, silent
//! background refresh of stale entries.

use std::future::Future;
use std::sync::Arc;

use chrono::{Duration, Utc};
use tokio::sync::broadcast;
use tracing::{debug, warn};

use super::entry::{CacheEntry, CacheRead};
use super::handle::CollectionHandle;
use super::keyed::KeyedStore;
use super::optimistic::MutationLocks;
use super::pending::{settled, FetchResult, PendingFetches};
use super::staleness;
use crate::error::SyncError;
use crate::model::Entity;

/// Cached collections of one entity type, keyed by resource id.
///
/// Wraps a [`KeyedStore`] with the fetch discipline every caller shares:
/// a fresh entry is served as-is, a stale entry is served immediately while
/// one background refresh runs, and a miss waits for a single coalesced
/// network fetch. Mutations go through [`optimistic`](super::optimistic) or
/// the realtime reconciler, never around the store.
pub struct Collection<T: Entity> {
  store: Arc<KeyedStore<T>>,
  pending: PendingFetches<T>,
  ttl: Duration,
  locks: MutationLocks,
}

impl<T: Entity> Collection<T> {
  /// A new, empty collection whose entries go stale `ttl` after a fetch.
  pub fn new(ttl: Duration) -> Self {
    Self {
      store: Arc::new(KeyedStore::new(T::collection())),
      pending: PendingFetches::new(T::collection()),
      ttl,
      locks: MutationLocks::new(),
    }
  }

  /// Cached items for `key`, or run `fetch` to fill the cache.
  ///
  /// A fresh hit and a stale hit both return without touching the network;
  /// the stale hit additionally kicks off one background refresh, shared by
  /// every caller that sees the same stale entry. Only a miss awaits the
  /// network, and concurrent misses for one key share a single fetch.
  pub async fn get_or_fetch<F, Fut>(&self, key: &str, fetch: F) -> Result<CacheRead<T>, SyncError>
  where
    F: FnOnce() -> Fut + Send + 'static,
    Fut: Future<Output = Result<Vec<T>, SyncError>> + Send + 'static,
  {
    if let Some(entry) = self.store.get(key) {
      if !staleness::is_stale(entry.refreshed_at, self.ttl, Utc::now()) {
        return Ok(CacheRead::from_cache(entry, false));
      }
      self.refresh_in_background(key, fetch);
      return Ok(CacheRead::from_cache(entry, true));
    }

    let rx = self.start_first_load(key, fetch);
    match settled(rx).await {
      Ok(items) => Ok(CacheRead::from_network(items)),
      Err(err) => {
        // Covers joining a background flight whose wrapper does not record
        // load failures.
        self.store.fail_load(key, err.clone());
        Err(err)
      }
    }
  }

  /// Force a fetch for `key`, bypassing the staleness check.
  ///
  /// Still coalesced: a refresh issued while another fetch for the key is in
  /// flight joins it instead of stacking a second network call.
  pub async fn refresh<F, Fut>(&self, key: &str, fetch: F) -> Result<CacheRead<T>, SyncError>
  where
    F: FnOnce() -> Fut + Send + 'static,
    Fut: Future<Output = Result<Vec<T>, SyncError>> + Send + 'static,
  {
    let store = Arc::clone(&self.store);
    let key_owned = key.to_string();
    let rx = self.pending.join_or_start(key, move || async move {
      fetch()
        .await
        .map(|items| store.set(&key_owned, items).items)
    });

    match settled(rx).await {
      Ok(items) => Ok(CacheRead::from_network(items)),
      Err(err) => {
        self.store.fail_load(key, err.clone());
        Err(err)
      }
    }
  }

  /// Make sure `key` is loaded or loading, without ever waiting on it.
  ///
  /// This is the subscribe-time companion to [`subscribe`](Self::subscribe):
  /// a miss starts a load, a stale entry starts a background refresh, a
  /// fresh entry does nothing. Results arrive through the subscription.
  pub fn ensure_fresh<F, Fut>(&self, key: &str, fetch: F)
  where
    F: FnOnce() -> Fut + Send + 'static,
    Fut: Future<Output = Result<Vec<T>, SyncError>> + Send + 'static,
  {
    match self.store.get(key) {
      Some(entry) if !staleness::is_stale(entry.refreshed_at, self.ttl, Utc::now()) => {}
      Some(_) => self.refresh_in_background(key, fetch),
      None => {
        let _ = self.start_first_load(key, fetch);
      }
    }
  }

  /// Current cache entry without any fetch side effects.
  pub fn peek(&self, key: &str) -> Option<CacheEntry<T>> {
    self.store.get(key)
  }

  /// Subscribe to state changes for `key`. Pair with
  /// [`ensure_fresh`](Self::ensure_fresh) to also get data flowing.
  pub fn subscribe(&self, key: &str) -> CollectionHandle<T> {
    CollectionHandle::new(self.store.subscribe(key))
  }

  /// Drop the cached entry for `key`; the next read fetches.
  pub fn invalidate(&self, key: &str) {
    self.store.invalidate(key);
  }

  /// Drop every cached entry for this entity type.
  pub fn invalidate_all(&self) {
    self.store.invalidate_all();
  }

  pub(crate) fn mutate(&self, key: &str, f: impl FnOnce(&mut Vec<T>)) -> Option<CacheEntry<T>> {
    self.store.mutate(key, f)
  }

  pub(crate) fn mutate_snapshotted(
    &self,
    key: &str,
    f: impl FnOnce(&mut Vec<T>),
  ) -> Option<(Arc<Vec<T>>, CacheEntry<T>)> {
    self.store.mutate_snapshotted(key, f)
  }

  pub(crate) fn restore(&self, key: &str, snapshot: Arc<Vec<T>>) -> Option<CacheEntry<T>> {
    self.store.restore(key, snapshot)
  }

  pub(crate) async fn lock_key(&self, key: &str) -> tokio::sync::OwnedMutexGuard<()> {
    self.locks.lock_key(key).await
  }

  /// First load for a key nobody has cached: flips the loading flag and
  /// starts (or joins) the fetch. The wrapper records success and failure on
  /// the store itself so spawn-and-forget callers stay correct.
  fn start_first_load<F, Fut>(&self, key: &str, fetch: F) -> broadcast::Receiver<FetchResult<T>>
  where
    F: FnOnce() -> Fut + Send + 'static,
    Fut: Future<Output = Result<Vec<T>, SyncError>> + Send + 'static,
  {
    self.store.mark_loading(key);
    let store = Arc::clone(&self.store);
    let key_owned = key.to_string();
    self.pending.join_or_start(key, move || async move {
      match fetch().await {
        Ok(items) => Ok(store.set(&key_owned, items).items),
        Err(err) => {
          store.fail_load(&key_owned, err.clone());
          Err(err)
        }
      }
    })
  }

  /// Refresh a stale entry off the caller's path. Failures are logged and
  /// swallowed; the stale entry keeps serving until a refresh lands.
  fn refresh_in_background<F, Fut>(&self, key: &str, fetch: F)
  where
    F: FnOnce() -> Fut + Send + 'static,
    Fut: Future<Output = Result<Vec<T>, SyncError>> + Send + 'static,
  {
    debug!(collection = T::collection(), key, "stale hit, refreshing in background");
    let store = Arc::clone(&self.store);
    let key_owned = key.to_string();
    let _ = self.pending.join_or_start(key, move || async move {
      match fetch().await {
        Ok(items) => Ok(store.set(&key_owned, items).items),
        Err(err) => {
          warn!(
            collection = T::collection(),
            key = %key_owned,
            error = %err,
            "background refresh failed, keeping cached data"
          );
          Err(err)
        }
      }
    });
  }
}

#[cfg(test)]
mod tests {
  use std::sync::atomic::{AtomicU32, Ordering};
  use std::time::Duration as StdDuration;

  use chrono::Utc;

  use super::*;
  use crate::model::Comment;
  use crate::store::entry::CacheSource;

  fn comment(id: &str) -> Comment {
    Comment {
      id: id.to_string(),
      author: "u1".to_string(),
      body: "nice chapter".to_string(),
      posted_at: Utc::now(),
      reactions: Vec::new(),
    }
  }

  async fn counted_fetch(
    collection: &Collection<Comment>,
    calls: &Arc<AtomicU32>,
    items: Vec<Comment>,
  ) -> Result<CacheRead<Comment>, SyncError> {
    let calls = Arc::clone(calls);
    collection
      .get_or_fetch("b1", move || async move {
        calls.fetch_add(1, Ordering::SeqCst);
        Ok(items)
      })
      .await
  }

  #[tokio::test]
  async fn test_fresh_hit_skips_network() {
    let collection = Collection::<Comment>::new(Duration::minutes(5));
    let calls = Arc::new(AtomicU32::new(0));

    let read = counted_fetch(&collection, &calls, vec![comment("c1")])
      .await
      .unwrap();
    assert_eq!(read.source, CacheSource::Network);

    let read = counted_fetch(&collection, &calls, vec![comment("c1")])
      .await
      .unwrap();
    assert_eq!(read.source, CacheSource::Fresh);
    assert!(!read.served_stale());
    assert_eq!(calls.load(Ordering::SeqCst), 1);
  }

  #[tokio::test]
  async fn test_concurrent_misses_share_one_fetch() {
    let collection = Arc::new(Collection::<Comment>::new(Duration::minutes(5)));
    let calls = Arc::new(AtomicU32::new(0));

    let mut handles = Vec::new();
    for _ in 0..4 {
      let collection = Arc::clone(&collection);
      let calls = Arc::clone(&calls);
      handles.push(tokio::spawn(async move {
        collection
          .get_or_fetch("b1", move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(StdDuration::from_millis(10)).await;
            Ok(vec![comment("c1")])
          })
          .await
      }));
    }

    for handle in handles {
      let read = handle.await.unwrap().unwrap();
      assert_eq!(read.items.len(), 1);
    }
    assert_eq!(calls.load(Ordering::SeqCst), 1);
  }

  #[tokio::test]
  async fn test_stale_hit_serves_cache_and_refreshes_once() {
    let collection = Collection::<Comment>::new(Duration::zero());
    let calls = Arc::new(AtomicU32::new(0));

    counted_fetch(&collection, &calls, vec![comment("c1")])
      .await
      .unwrap();
    tokio::time::sleep(StdDuration::from_millis(2)).await;

    // Two stale reads in a row: both serve the old entry, and the refresh
    // they trigger is shared.
    for _ in 0..2 {
      let calls = Arc::clone(&calls);
      let read = collection
        .get_or_fetch("b1", move || async move {
          calls.fetch_add(1, Ordering::SeqCst);
          tokio::time::sleep(StdDuration::from_millis(20)).await;
          Ok(vec![comment("c1"), comment("c2")])
        })
        .await
        .unwrap();
      assert!(read.served_stale());
      assert_eq!(read.items.len(), 1);
    }

    tokio::time::sleep(StdDuration::from_millis(40)).await;
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(collection.peek("b1").unwrap().len(), 2);
  }

  #[tokio::test]
  async fn test_first_load_error_surfaces_to_caller_and_subscribers() {
    let collection = Collection::<Comment>::new(Duration::minutes(5));

    let err = collection
      .get_or_fetch("b1", || async { Err(SyncError::network("boom")) })
      .await
      .unwrap_err();
    assert!(matches!(err, SyncError::Network { .. }));

    let handle = collection.subscribe("b1");
    let state = handle.state();
    assert!(!state.is_loading());
    assert!(state.items.is_none());
    assert_eq!(state.error, Some(SyncError::network("boom")));
  }

  #[tokio::test]
  async fn test_ensure_fresh_loads_miss_without_blocking() {
    let collection = Collection::<Comment>::new(Duration::minutes(5));
    let calls = Arc::new(AtomicU32::new(0));

    {
      let calls = Arc::clone(&calls);
      collection.ensure_fresh("b1", move || async move {
        calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(StdDuration::from_millis(10)).await;
        Ok(vec![comment("c1")])
      });
    }
    let handle = collection.subscribe("b1");
    assert!(handle.state().is_loading());

    tokio::time::sleep(StdDuration::from_millis(30)).await;
    assert_eq!(collection.peek("b1").unwrap().len(), 1);
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    // Entry is fresh now, so this is a no-op.
    {
      let calls = Arc::clone(&calls);
      collection.ensure_fresh("b1", move || async move {
        calls.fetch_add(1, Ordering::SeqCst);
        Ok(Vec::new())
      });
    }
    tokio::time::sleep(StdDuration::from_millis(10)).await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);
  }

  #[tokio::test]
  async fn test_invalidate_forces_refetch() {
    let collection = Collection::<Comment>::new(Duration::minutes(5));
    let calls = Arc::new(AtomicU32::new(0));

    counted_fetch(&collection, &calls, vec![comment("c1")])
      .await
      .unwrap();
    collection.invalidate("b1");
    assert!(collection.peek("b1").is_none());

    let read = counted_fetch(&collection, &calls, vec![comment("c2")])
      .await
      .unwrap();
    assert_eq!(read.source, CacheSource::Network);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
  }
}

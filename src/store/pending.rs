//! Coalescing of concurrent fetches for the same resource key.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use tokio::sync::broadcast;
use tracing::debug;

use super::lock::lock_or_recover;
use crate::error::SyncError;

/// What a settled fetch hands every waiter.
pub type FetchResult<T> = Result<Arc<Vec<T>>, SyncError>;

struct PendingFetch<T> {
  started_at: DateTime<Utc>,
  tx: broadcast::Sender<FetchResult<T>>,
}

type PendingMap<T> = HashMap<String, PendingFetch<T>>;

/// Registry holding at most one in-flight fetch per resource key.
///
/// The first caller for a key becomes the leader and its factory runs on a
/// detached task; everyone arriving while that fetch is in flight gets a
/// receiver for the same settlement instead of a second network call. The
/// registry entry is removed the moment the fetch settles, so a later call
/// starts a fresh fetch. The detached task keeps running even if every
/// waiter gives up, which lets an abandoned fetch still fill the cache.
pub struct PendingFetches<T> {
  label: &'static str,
  inner: Arc<Mutex<PendingMap<T>>>,
}

impl<T: Send + Sync + 'static> PendingFetches<T> {
  pub fn new(label: &'static str) -> Self {
    Self {
      label,
      inner: Arc::new(Mutex::new(HashMap::new())),
    }
  }

  /// Join the in-flight fetch for `key`, or start one from `factory`.
  ///
  /// `factory` is only invoked when this call becomes the leader. The
  /// returned receiver resolves exactly once, with the shared result.
  pub fn join_or_start<F, Fut>(
    &self,
    key: &str,
    factory: F,
  ) -> broadcast::Receiver<FetchResult<T>>
  where
    F: FnOnce() -> Fut,
    Fut: Future<Output = FetchResult<T>> + Send + 'static,
  {
    let rx = {
      let mut inner = lock_or_recover(&self.inner, self.label);
      if let Some(pending) = inner.get(key) {
        debug!(collection = self.label, key, "joining in-flight fetch");
        return pending.tx.subscribe();
      }
      let (tx, rx) = broadcast::channel(1);
      inner.insert(
        key.to_string(),
        PendingFetch {
          started_at: Utc::now(),
          tx,
        },
      );
      rx
    };

    debug!(collection = self.label, key, "starting fetch");
    let settlement = Settlement {
      label: self.label,
      inner: Arc::clone(&self.inner),
      key: key.to_string(),
      armed: true,
    };
    let fut = factory();
    tokio::spawn(async move {
      let result = fut.await;
      settlement.settle(result);
    });
    rx
  }

  pub fn is_pending(&self, key: &str) -> bool {
    lock_or_recover(&self.inner, self.label).contains_key(key)
  }
}

/// Guarantees a started fetch settles exactly once, panics included.
struct Settlement<T> {
  label: &'static str,
  inner: Arc<Mutex<PendingMap<T>>>,
  key: String,
  armed: bool,
}

impl<T> Settlement<T> {
  fn settle(mut self, result: FetchResult<T>) {
    self.armed = false;
    settle_in(self.label, &self.inner, &self.key, result);
  }
}

impl<T> Drop for Settlement<T> {
  fn drop(&mut self) {
    if self.armed {
      settle_in(
        self.label,
        &self.inner,
        &self.key,
        Err(SyncError::network("fetch task terminated before completing")),
      );
    }
  }
}

fn settle_in<T>(
  label: &'static str,
  inner: &Mutex<PendingMap<T>>,
  key: &str,
  result: FetchResult<T>,
) {
  let pending = lock_or_recover(inner, label).remove(key);
  let Some(pending) = pending else {
    debug!(collection = label, key, "fetch already settled");
    return;
  };

  let elapsed = Utc::now() - pending.started_at;
  debug!(
    collection = label,
    key,
    ok = result.is_ok(),
    elapsed_ms = elapsed.num_milliseconds(),
    "fetch settled"
  );
  // Every waiter may have hung up already; that is not an error.
  let _ = pending.tx.send(result);
}

/// Wait for the settlement carried by `rx`.
pub(crate) async fn settled<T>(
  mut rx: broadcast::Receiver<FetchResult<T>>,
) -> FetchResult<T> {
  match rx.recv().await {
    Ok(result) => result,
    Err(_) => Err(SyncError::network("fetch task dropped before completing")),
  }
}

//! Optimistic mutations: apply locally, confirm remotely, roll back on
//! failure.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};

use tokio::sync::OwnedMutexGuard;
use tracing::debug;

use super::collection::Collection;
use super::lock::lock_or_recover;
use crate::error::SyncError;
use crate::model::Entity;

/// Per-key async locks serializing optimistic mutations.
///
/// Two mutations on the same key run strictly one after the other, remote
/// round trip included, so a rollback can never clobber a later mutation's
/// local apply. Mutations on different keys proceed independently.
pub(crate) struct MutationLocks {
  inner: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl MutationLocks {
  pub(crate) fn new() -> Self {
    Self {
      inner: Mutex::new(HashMap::new()),
    }
  }

  pub(crate) async fn lock_key(&self, key: &str) -> OwnedMutexGuard<()> {
    let lock = {
      let mut inner = lock_or_recover(&self.inner, "mutation locks");
      Arc::clone(
        inner
          .entry(key.to_string())
          .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(()))),
      )
    };
    lock.lock_owned().await
  }
}

/// Run one optimistic mutation against the items cached under `key`.
///
/// In order: take the per-key mutation lock, snapshot the cached items and
/// apply `local` to them in one step, await `remote`, then either reconcile
/// the cached items with the returned server row via `confirm` or restore
/// the snapshot unchanged. When nothing is cached under `key`, `local` and
/// `confirm` are skipped and only the server call runs.
///
/// A failure after a visible local change comes back as
/// [`SyncError::RolledBack`]; by then the rollback has already happened.
pub async fn apply<T, R, L, C, Fut>(
  collection: &Collection<T>,
  key: &str,
  local: L,
  remote: Fut,
  confirm: C,
) -> Result<R, SyncError>
where
  T: Entity,
  L: FnOnce(&mut Vec<T>),
  C: FnOnce(&mut Vec<T>, &R),
  Fut: Future<Output = Result<R, SyncError>>,
{
  let _serialized = collection.lock_key(key).await;

  let snapshot = collection
    .mutate_snapshotted(key, local)
    .map(|(before, _)| before);
  if snapshot.is_none() {
    debug!(
      collection = T::collection(),
      key, "key not cached, skipping local apply"
    );
  }

  match remote.await {
    Ok(row) => {
      if snapshot.is_some() {
        collection.mutate(key, |items| confirm(items, &row));
      }
      Ok(row)
    }
    Err(err) => match snapshot {
      Some(snapshot) => {
        debug!(
          collection = T::collection(),
          key,
          error = %err,
          "mutation failed, rolling back"
        );
        collection.restore(key, snapshot);
        Err(err.into_rolled_back())
      }
      None => Err(err),
    },
  }
}

#[cfg(test)]
mod tests {
  use std::sync::atomic::{AtomicBool, Ordering};
  use std::time::Duration as StdDuration;

  use chrono::{Duration, Utc};

  use super::*;
  use crate::model::Comment;

  fn comment(id: &str) -> Comment {
    Comment {
      id: id.to_string(),
      author: "u1".to_string(),
      body: "nice chapter".to_string(),
      posted_at: Utc::now(),
      reactions: Vec::new(),
    }
  }

  async fn seed(collection: &Collection<Comment>, items: Vec<Comment>) {
    collection
      .get_or_fetch("b1", move || async move { Ok(items) })
      .await
      .unwrap();
  }

  #[tokio::test]
  async fn test_confirm_replaces_temp_id_with_server_row() {
    let collection = Collection::<Comment>::new(Duration::minutes(5));
    seed(&collection, vec![comment("c1")]).await;

    let row = apply(
      &collection,
      "b1",
      |items| items.push(comment("local-1")),
      async { Ok(comment("c9")) },
      |items, row: &Comment| {
        if let Some(slot) = items.iter_mut().find(|c| c.id == "local-1") {
          *slot = row.clone();
        }
      },
    )
    .await
    .unwrap();

    assert_eq!(row.id, "c9");
    let items = collection.peek("b1").unwrap().items;
    assert_eq!(items.len(), 2);
    assert!(items.iter().any(|c| c.id == "c9"));
    assert!(!items.iter().any(|c| c.id == "local-1"));
  }

  #[tokio::test]
  async fn test_failure_restores_the_exact_snapshot() {
    let collection = Collection::<Comment>::new(Duration::minutes(5));
    seed(&collection, vec![comment("c1"), comment("c2")]).await;
    let before = collection.peek("b1").unwrap().items;

    let err = apply(
      &collection,
      "b1",
      |items| items.retain(|c| c.id != "c1"),
      async { Err::<(), _>(SyncError::network("500 from server")) },
      |_items, _row| {},
    )
    .await
    .unwrap_err();

    assert!(err.is_rollback());
    let after = collection.peek("b1").unwrap().items;
    assert_eq!(after.as_ref(), before.as_ref());
  }

  #[tokio::test]
  async fn test_uncached_key_runs_remote_only() {
    let collection = Collection::<Comment>::new(Duration::minutes(5));
    let applied = Arc::new(AtomicBool::new(false));

    let row = {
      let applied = Arc::clone(&applied);
      apply(
        &collection,
        "b1",
        move |_items| applied.store(true, Ordering::SeqCst),
        async { Ok(comment("c9")) },
        |_items, _row| {},
      )
      .await
      .unwrap()
    };

    assert_eq!(row.id, "c9");
    assert!(!applied.load(Ordering::SeqCst));
    assert!(collection.peek("b1").is_none());
  }

  #[tokio::test]
  async fn test_uncached_key_failure_is_not_a_rollback() {
    let collection = Collection::<Comment>::new(Duration::minutes(5));

    let err = apply(
      &collection,
      "b1",
      |_items| {},
      async { Err::<(), _>(SyncError::network("boom")) },
      |_items, _row| {},
    )
    .await
    .unwrap_err();

    assert!(!err.is_rollback());
  }

  #[tokio::test]
  async fn test_same_key_mutations_run_in_order() {
    let collection = Arc::new(Collection::<Comment>::new(Duration::minutes(5)));
    seed(&collection, Vec::new()).await;
    let order = Arc::new(Mutex::new(Vec::new()));

    let first = {
      let collection = Arc::clone(&collection);
      let order_local = Arc::clone(&order);
      let order_confirm = Arc::clone(&order);
      tokio::spawn(async move {
        apply(
          &collection,
          "b1",
          move |_items| order_local.lock().unwrap().push("first local"),
          async {
            tokio::time::sleep(StdDuration::from_millis(20)).await;
            Ok(())
          },
          move |_items, _row: &()| order_confirm.lock().unwrap().push("first confirm"),
        )
        .await
      })
    };
    // Let the first mutation take the key lock before the rival arrives.
    tokio::time::sleep(StdDuration::from_millis(5)).await;

    let second = {
      let collection = Arc::clone(&collection);
      let order_local = Arc::clone(&order);
      tokio::spawn(async move {
        apply(
          &collection,
          "b1",
          move |_items| order_local.lock().unwrap().push("second local"),
          async { Ok(()) },
          |_items, _row: &()| {},
        )
        .await
      })
    };

    first.await.unwrap().unwrap();
    second.await.unwrap().unwrap();
    assert_eq!(
      *order.lock().unwrap(),
      vec!["first local", "first confirm", "second local"]
    );
  }
}

use std::sync::Arc;

use tokio::sync::watch;

use super::entry::CollectionState;
use crate::error::SyncError;

/// A live view of one keyed collection.
///
/// Holds the current [`CollectionState`] at all times and wakes
/// [`changed`](Self::changed) whenever the store publishes a new one. Cheap
/// to create and drop; the underlying entry outlives every handle.
pub struct CollectionHandle<T> {
  rx: watch::Receiver<CollectionState<T>>,
}

impl<T: Clone> CollectionHandle<T> {
  pub(crate) fn new(rx: watch::Receiver<CollectionState<T>>) -> Self {
    Self { rx }
  }

  /// The state as of now.
  pub fn state(&self) -> CollectionState<T> {
    self.rx.borrow().clone()
  }

  pub fn items(&self) -> Option<Arc<Vec<T>>> {
    self.rx.borrow().items.clone()
  }

  pub fn is_loading(&self) -> bool {
    self.rx.borrow().loading
  }

  pub fn error(&self) -> Option<SyncError> {
    self.rx.borrow().error.clone()
  }

  /// Wait for the next published state. Returns `false` once the collection
  /// itself has been dropped and no further change can come.
  pub async fn changed(&mut self) -> bool {
    self.rx.changed().await.is_ok()
  }
}

impl<T> Clone for CollectionHandle<T> {
  fn clone(&self) -> Self {
    Self {
      rx: self.rx.clone(),
    }
  }
}

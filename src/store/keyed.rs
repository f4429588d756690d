//! In-memory keyed store, one ordered collection per resource key.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Utc;
use tokio::sync::watch;
use tracing::debug;

use super::entry::{CacheEntry, CollectionState};
use super::lock::lock_or_recover;
use crate::error::SyncError;

/// Per-key cache state plus the channel its subscribers listen on.
struct Slot<T> {
  entry: Option<CacheEntry<T>>,
  loading: bool,
  error: Option<SyncError>,
  tx: watch::Sender<CollectionState<T>>,
}

impl<T> Slot<T> {
  fn new() -> Self {
    let (tx, _rx) = watch::channel(CollectionState::default());
    Self {
      entry: None,
      loading: false,
      error: None,
      tx,
    }
  }

  fn publish(&self) {
    self.tx.send_replace(CollectionState {
      items: self.entry.as_ref().map(|e| Arc::clone(&e.items)),
      loading: self.loading,
      error: self.error.clone(),
    });
  }
}

/// Map from resource key to a cached, ordered collection.
///
/// This is the single source of truth every consumer reads: views subscribe
/// per key, optimistic mutations and the realtime reconciler write through
/// `mutate`, fetches write through `set`. All operations are synchronous and
/// never suspend; entries are destroyed only by explicit invalidation.
pub struct KeyedStore<T> {
  label: &'static str,
  slots: Mutex<HashMap<String, Slot<T>>>,
}

impl<T: Clone> KeyedStore<T> {
  pub fn new(label: &'static str) -> Self {
    Self {
      label,
      slots: Mutex::new(HashMap::new()),
    }
  }

  /// Current entry for `key`. Absence is not an error; it means "fetch".
  pub fn get(&self, key: &str) -> Option<CacheEntry<T>> {
    self.lock().get(key).and_then(|slot| slot.entry.clone())
  }

  /// Replace the collection wholesale and stamp it fresh.
  ///
  /// The stamp never moves backwards for a key, even if the wall clock does.
  /// Clears any loading flag or recorded error for the key.
  pub fn set(&self, key: &str, items: Vec<T>) -> CacheEntry<T> {
    self.set_arc(key, Arc::new(items))
  }

  fn set_arc(&self, key: &str, items: Arc<Vec<T>>) -> CacheEntry<T> {
    let mut slots = self.lock();
    let slot = slots.entry(key.to_string()).or_insert_with(Slot::new);
    Self::fill_slot(slot, items)
  }

  /// Stamp `items` fresh and store them on `slot`, clearing loading and error.
  fn fill_slot(slot: &mut Slot<T>, items: Arc<Vec<T>>) -> CacheEntry<T> {
    let mut refreshed_at = Utc::now();
    if let Some(prev) = &slot.entry {
      if prev.refreshed_at > refreshed_at {
        refreshed_at = prev.refreshed_at;
      }
    }

    let entry = CacheEntry {
      items,
      refreshed_at,
    };
    slot.entry = Some(entry.clone());
    slot.loading = false;
    slot.error = None;
    slot.publish();
    entry
  }

  /// Apply a pure transform to the items in place.
  ///
  /// Subscribers see the change immediately. The freshness stamp is left
  /// untouched: a local edit is not a server confirmation. Returns `None`
  /// when nothing is cached for the key.
  pub fn mutate(&self, key: &str, f: impl FnOnce(&mut Vec<T>)) -> Option<CacheEntry<T>> {
    self.mutate_snapshotted(key, f).map(|(_, entry)| entry)
  }

  /// Like [`mutate`](Self::mutate), also returning the items exactly as they
  /// were immediately before the transform ran.
  ///
  /// Snapshot and mutation happen under one lock, so the snapshot is the
  /// true pre-image even with concurrent writers on other tasks.
  pub fn mutate_snapshotted(
    &self,
    key: &str,
    f: impl FnOnce(&mut Vec<T>),
  ) -> Option<(Arc<Vec<T>>, CacheEntry<T>)> {
    let mut slots = self.lock();
    let slot = slots.get_mut(key)?;
    let entry = slot.entry.as_mut()?;

    let before = Arc::clone(&entry.items);
    f(Arc::make_mut(&mut entry.items));
    let after = entry.clone();
    slot.publish();
    Some((before, after))
  }

  /// Restore a pre-mutation snapshot after a failed optimistic mutation.
  ///
  /// Behaves like [`set`](Self::set) (wholesale replace, fresh stamp), except
  /// that a key invalidated while the mutation was in flight stays empty
  /// rather than being resurrected with pre-logout data. The presence check
  /// and the write happen under one lock so an invalidation cannot slip in
  /// between them.
  pub(crate) fn restore(&self, key: &str, snapshot: Arc<Vec<T>>) -> Option<CacheEntry<T>> {
    let mut slots = self.lock();
    match slots.get_mut(key) {
      Some(slot) if slot.entry.is_some() => Some(Self::fill_slot(slot, snapshot)),
      _ => {
        debug!(
          collection = self.label,
          key, "skipping rollback, entry was invalidated"
        );
        None
      }
    }
  }

  /// Raise the loading flag for a first load.
  ///
  /// Only keys without data flip to loading; a background refresh of an
  /// existing entry keeps serving the current items without flicker.
  pub fn mark_loading(&self, key: &str) {
    let mut slots = self.lock();
    let slot = slots.entry(key.to_string()).or_insert_with(Slot::new);
    if slot.entry.is_none() && !slot.loading {
      slot.loading = true;
      slot.publish();
    }
  }

  /// Record a failed first load so subscribers can surface it.
  ///
  /// Keys that gained data while the load was failing are left alone; cached
  /// items always win over an error for an older request.
  pub fn fail_load(&self, key: &str, error: SyncError) {
    let mut slots = self.lock();
    let slot = slots.entry(key.to_string()).or_insert_with(Slot::new);
    if slot.entry.is_some() {
      return;
    }
    slot.loading = false;
    slot.error = Some(error);
    slot.publish();
  }

  /// Drop the entry for `key`, keeping subscriptions alive on an empty state.
  pub fn invalidate(&self, key: &str) {
    let mut slots = self.lock();
    if let Some(slot) = slots.get_mut(key) {
      slot.entry = None;
      slot.loading = false;
      slot.error = None;
      slot.publish();
    }
  }

  /// Drop every entry (logout). Subscriptions survive and see empty state.
  pub fn invalidate_all(&self) {
    let mut slots = self.lock();
    let count = slots.len();
    for slot in slots.values_mut() {
      slot.entry = None;
      slot.loading = false;
      slot.error = None;
      slot.publish();
    }
    debug!(collection = self.label, keys = count, "invalidated all entries");
  }

  /// Subscribe to state changes for `key`, creating the slot if needed.
  ///
  /// The receiver immediately holds the current state; `changed()` wakes on
  /// every subsequent write through this store.
  pub fn subscribe(&self, key: &str) -> watch::Receiver<CollectionState<T>> {
    let mut slots = self.lock();
    let slot = slots.entry(key.to_string()).or_insert_with(Slot::new);
    slot.tx.subscribe()
  }

  pub fn contains(&self, key: &str) -> bool {
    self
      .lock()
      .get(key)
      .map(|slot| slot.entry.is_some())
      .unwrap_or(false)
  }

  fn lock(&self) -> MutexGuard<'_, HashMap<String, Slot<T>>> {
    lock_or_recover(&self.slots, self.label)
  }
}

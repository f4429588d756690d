use std::sync::Arc;

use chrono::Utc;

use crate::api::ApiClient;
use crate::error::SyncError;
use crate::model::{Shelf, ShelfEntry};
use crate::store::{optimistic, CacheRead, Collection, CollectionHandle};

/// A profile's shelves: cached reads plus optimistic shelving moves.
///
/// The server treats shelving as an upsert per (profile, book), so add and
/// move go through the same endpoint and the same local reconciliation.
#[derive(Clone)]
pub struct ShelvesService {
  api: ApiClient,
  collection: Arc<Collection<ShelfEntry>>,
}

impl ShelvesService {
  pub(crate) fn new(api: ApiClient, collection: Arc<Collection<ShelfEntry>>) -> Self {
    Self { api, collection }
  }

  /// The shelf of `profile_id`, served per the cache discipline.
  pub async fn for_profile(&self, profile_id: &str) -> Result<CacheRead<ShelfEntry>, SyncError> {
    let api = self.api.clone();
    let key = profile_id.to_string();
    self
      .collection
      .get_or_fetch(profile_id, move || async move {
        api.profile_shelf(&key).await.map_err(SyncError::network)
      })
      .await
  }

  /// Force a fetch for `profile_id` (pull-to-refresh).
  pub async fn refresh(&self, profile_id: &str) -> Result<CacheRead<ShelfEntry>, SyncError> {
    let api = self.api.clone();
    let key = profile_id.to_string();
    self
      .collection
      .refresh(profile_id, move || async move {
        api.profile_shelf(&key).await.map_err(SyncError::network)
      })
      .await
  }

  /// Subscribe to `profile_id`'s shelf, starting a load or refresh if needed.
  pub fn collection(&self, profile_id: &str) -> CollectionHandle<ShelfEntry> {
    let api = self.api.clone();
    let key = profile_id.to_string();
    self.collection.ensure_fresh(profile_id, move || async move {
      api.profile_shelf(&key).await.map_err(SyncError::network)
    });
    self.collection.subscribe(profile_id)
  }

  /// Shelve a book, visible on the shelf before the server confirms it.
  ///
  /// `title` and `author` come from the catalog view that offered the
  /// shelving action; the server row replaces them on confirmation.
  pub async fn add(
    &self,
    profile_id: &str,
    book_id: &str,
    title: &str,
    author: &str,
    shelf: Shelf,
  ) -> Result<ShelfEntry, SyncError> {
    let draft = ShelfEntry {
      book_id: book_id.to_string(),
      title: title.to_string(),
      author: author.to_string(),
      shelf,
      added_at: Utc::now(),
    };
    self.upsert(profile_id, book_id, shelf, Some(draft)).await
  }

  /// Move an already shelved book to another shelf.
  pub async fn move_to(
    &self,
    profile_id: &str,
    book_id: &str,
    shelf: Shelf,
  ) -> Result<ShelfEntry, SyncError> {
    self.upsert(profile_id, book_id, shelf, None).await
  }

  /// Take a book off the shelf, gone before the server confirms it.
  pub async fn remove(&self, profile_id: &str, book_id: &str) -> Result<(), SyncError> {
    let remote = {
      let api = self.api.clone();
      let profile_id = profile_id.to_string();
      let book_id = book_id.to_string();
      async move {
        api
          .remove_shelf_entry(&profile_id, &book_id)
          .await
          .map_err(SyncError::network)
      }
    };

    let book_id = book_id.to_string();
    optimistic::apply(
      &self.collection,
      profile_id,
      move |items| items.retain(|e| e.book_id != book_id),
      remote,
      |_items, _row: &()| {},
    )
    .await
  }

  async fn upsert(
    &self,
    profile_id: &str,
    book_id: &str,
    shelf: Shelf,
    draft: Option<ShelfEntry>,
  ) -> Result<ShelfEntry, SyncError> {
    let remote = {
      let api = self.api.clone();
      let profile_id = profile_id.to_string();
      let book_id = book_id.to_string();
      async move {
        api
          .upsert_shelf_entry(&profile_id, &book_id, shelf)
          .await
          .map_err(SyncError::network)
      }
    };

    let book_id = book_id.to_string();
    optimistic::apply(
      &self.collection,
      profile_id,
      move |items| match items.iter_mut().find(|e| e.book_id == book_id) {
        Some(entry) => entry.shelf = shelf,
        None => {
          if let Some(draft) = draft {
            items.push(draft);
          }
        }
      },
      remote,
      |items, row: &ShelfEntry| {
        if let Some(slot) = items.iter_mut().find(|e| e.book_id == row.book_id) {
          *slot = row.clone();
        }
      },
    )
    .await
  }
}

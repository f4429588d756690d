use std::sync::Arc;

use chrono::Utc;
use tracing::debug;
use uuid::Uuid;

use crate::api::ApiClient;
use crate::error::SyncError;
use crate::model::{reactions, Comment};
use crate::store::{optimistic, CacheRead, Collection, CollectionHandle};

/// Comments on a book's discussion feed: cached reads plus optimistic
/// posting, deletion, and reaction toggles.
#[derive(Clone)]
pub struct CommentsService {
  api: ApiClient,
  collection: Arc<Collection<Comment>>,
  session_user: String,
}

impl CommentsService {
  pub(crate) fn new(
    api: ApiClient,
    collection: Arc<Collection<Comment>>,
    session_user: String,
  ) -> Self {
    Self {
      api,
      collection,
      session_user,
    }
  }

  /// The feed for `book_id`, served per the cache discipline.
  pub async fn for_book(&self, book_id: &str) -> Result<CacheRead<Comment>, SyncError> {
    let api = self.api.clone();
    let key = book_id.to_string();
    self
      .collection
      .get_or_fetch(book_id, move || async move {
        api.book_comments(&key).await.map_err(SyncError::network)
      })
      .await
  }

  /// Force a fetch for `book_id` (pull-to-refresh).
  pub async fn refresh(&self, book_id: &str) -> Result<CacheRead<Comment>, SyncError> {
    let api = self.api.clone();
    let key = book_id.to_string();
    self
      .collection
      .refresh(book_id, move || async move {
        api.book_comments(&key).await.map_err(SyncError::network)
      })
      .await
  }

  /// Subscribe to `book_id`'s feed, starting a load or refresh if needed.
  pub fn collection(&self, book_id: &str) -> CollectionHandle<Comment> {
    let api = self.api.clone();
    let key = book_id.to_string();
    self.collection.ensure_fresh(book_id, move || async move {
      api.book_comments(&key).await.map_err(SyncError::network)
    });
    self.collection.subscribe(book_id)
  }

  /// Warm the cache for several books at once (opening a reading group).
  pub async fn prefetch(&self, book_ids: &[String]) {
    let fetches = book_ids.iter().map(|book_id| self.for_book(book_id));
    let results = futures::future::join_all(fetches).await;
    let failed = results.iter().filter(|r| r.is_err()).count();
    debug!(
      books = book_ids.len(),
      failed, "prefetched comment feeds"
    );
  }

  /// Post a comment, visible in the feed before the server confirms it.
  ///
  /// The comment appears under a temporary id with the session user as
  /// author; the server's row replaces it on confirmation.
  pub async fn post(&self, book_id: &str, body: &str) -> Result<Comment, SyncError> {
    let temp_id = format!("local-{}", Uuid::new_v4());
    let draft = Comment {
      id: temp_id.clone(),
      author: self.session_user.clone(),
      body: body.to_string(),
      posted_at: Utc::now(),
      reactions: Vec::new(),
    };

    let remote = {
      let api = self.api.clone();
      let book_id = book_id.to_string();
      let body = body.to_string();
      async move {
        api
          .post_comment(&book_id, &body)
          .await
          .map_err(SyncError::network)
      }
    };

    optimistic::apply(
      &self.collection,
      book_id,
      move |items| items.push(draft),
      remote,
      move |items, row: &Comment| {
        if let Some(slot) = items.iter_mut().find(|c| c.id == temp_id) {
          *slot = row.clone();
        }
      },
    )
    .await
  }

  /// Delete a comment, gone from the feed before the server confirms it.
  pub async fn delete(&self, book_id: &str, comment_id: &str) -> Result<(), SyncError> {
    let remote = {
      let api = self.api.clone();
      let comment_id = comment_id.to_string();
      async move {
        api
          .delete_comment(&comment_id)
          .await
          .map_err(SyncError::network)
      }
    };

    let comment_id = comment_id.to_string();
    optimistic::apply(
      &self.collection,
      book_id,
      move |items| items.retain(|c| c.id != comment_id),
      remote,
      |_items, _row: &()| {},
    )
    .await
  }

  /// Toggle the session user's reaction on a comment.
  ///
  /// The tally updates instantly; the server applies the same toggle against
  /// its own state, so there is nothing to reshape on confirmation.
  pub async fn toggle_reaction(
    &self,
    book_id: &str,
    comment_id: &str,
    emoji: &str,
  ) -> Result<(), SyncError> {
    let remote = {
      let api = self.api.clone();
      let comment_id = comment_id.to_string();
      let emoji = emoji.to_string();
      async move {
        api
          .toggle_comment_reaction(&comment_id, &emoji)
          .await
          .map_err(SyncError::network)
      }
    };

    let comment_id = comment_id.to_string();
    let emoji = emoji.to_string();
    let user = self.session_user.clone();
    optimistic::apply(
      &self.collection,
      book_id,
      move |items| reactions::toggle_on(items, &comment_id, &emoji, &user),
      remote,
      |_items, _row: &()| {},
    )
    .await
  }
}

use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use crate::api::ApiClient;
use crate::error::SyncError;
use crate::model::Review;
use crate::store::{optimistic, CacheRead, Collection, CollectionHandle};

/// Reviews of a book: cached reads plus optimistic posting and deletion.
#[derive(Clone)]
pub struct ReviewsService {
  api: ApiClient,
  collection: Arc<Collection<Review>>,
  session_user: String,
}

impl ReviewsService {
  pub(crate) fn new(
    api: ApiClient,
    collection: Arc<Collection<Review>>,
    session_user: String,
  ) -> Self {
    Self {
      api,
      collection,
      session_user,
    }
  }

  /// The reviews of `book_id`, served per the cache discipline.
  pub async fn for_book(&self, book_id: &str) -> Result<CacheRead<Review>, SyncError> {
    let api = self.api.clone();
    let key = book_id.to_string();
    self
      .collection
      .get_or_fetch(book_id, move || async move {
        api.book_reviews(&key).await.map_err(SyncError::network)
      })
      .await
  }

  /// Force a fetch for `book_id` (pull-to-refresh).
  pub async fn refresh(&self, book_id: &str) -> Result<CacheRead<Review>, SyncError> {
    let api = self.api.clone();
    let key = book_id.to_string();
    self
      .collection
      .refresh(book_id, move || async move {
        api.book_reviews(&key).await.map_err(SyncError::network)
      })
      .await
  }

  /// Subscribe to `book_id`'s reviews, starting a load or refresh if needed.
  pub fn collection(&self, book_id: &str) -> CollectionHandle<Review> {
    let api = self.api.clone();
    let key = book_id.to_string();
    self.collection.ensure_fresh(book_id, move || async move {
      api.book_reviews(&key).await.map_err(SyncError::network)
    });
    self.collection.subscribe(book_id)
  }

  /// Post a review, visible before the server confirms it.
  pub async fn post(&self, book_id: &str, rating: u8, body: &str) -> Result<Review, SyncError> {
    let temp_id = format!("local-{}", Uuid::new_v4());
    let draft = Review {
      id: temp_id.clone(),
      reviewer: self.session_user.clone(),
      rating,
      body: body.to_string(),
      posted_at: Utc::now(),
    };

    let remote = {
      let api = self.api.clone();
      let book_id = book_id.to_string();
      let body = body.to_string();
      async move {
        api
          .post_review(&book_id, rating, &body)
          .await
          .map_err(SyncError::network)
      }
    };

    optimistic::apply(
      &self.collection,
      book_id,
      move |items| items.push(draft),
      remote,
      move |items, row: &Review| {
        if let Some(slot) = items.iter_mut().find(|r| r.id == temp_id) {
          *slot = row.clone();
        }
      },
    )
    .await
  }

  /// Delete a review, gone before the server confirms it.
  pub async fn delete(&self, book_id: &str, review_id: &str) -> Result<(), SyncError> {
    let remote = {
      let api = self.api.clone();
      let review_id = review_id.to_string();
      async move {
        api
          .delete_review(&review_id)
          .await
          .map_err(SyncError::network)
      }
    };

    let review_id = review_id.to_string();
    optimistic::apply(
      &self.collection,
      book_id,
      move |items| items.retain(|r| r.id != review_id),
      remote,
      |_items, _row: &()| {},
    )
    .await
  }
}

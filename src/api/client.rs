use color_eyre::{eyre::eyre, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use url::Url;

use crate::api::types::{
  ApiComment, ApiConversation, ApiMessage, ApiPage, ApiReview, ApiShelfEntry,
};
use crate::config::Config;
use crate::model::{ChatMessage, Comment, ConversationSummary, Review, Shelf, ShelfEntry};

/// Folio REST API client wrapper
#[derive(Clone)]
pub struct ApiClient {
  http: reqwest::Client,
  base: Url,
  token: String,
}

impl ApiClient {
  pub fn new(config: &Config) -> Result<Self> {
    let token = Config::api_token()?;

    let mut base = config.api.url.trim_end_matches('/').to_string();
    base.push('/');
    let base =
      Url::parse(&base).map_err(|e| eyre!("Invalid API url {}: {}", config.api.url, e))?;

    let http = reqwest::Client::builder()
      .user_agent(concat!("folio-sync/", env!("CARGO_PKG_VERSION")))
      .build()
      .map_err(|e| eyre!("Failed to create HTTP client: {}", e))?;

    Ok(Self { http, base, token })
  }

  /// All comments on a book's discussion feed.
  pub async fn book_comments(&self, book_id: &str) -> Result<Vec<Comment>> {
    let rows: Vec<ApiComment> = self
      .fetch_all(&format!("books/{}/comments", book_id))
      .await
      .map_err(|e| eyre!("Failed to fetch comments for book {}: {}", book_id, e))?;
    Ok(rows.into_iter().map(Comment::from).collect())
  }

  /// All reviews of a book.
  pub async fn book_reviews(&self, book_id: &str) -> Result<Vec<Review>> {
    let rows: Vec<ApiReview> = self
      .fetch_all(&format!("books/{}/reviews", book_id))
      .await
      .map_err(|e| eyre!("Failed to fetch reviews for book {}: {}", book_id, e))?;
    Ok(rows.into_iter().map(Review::from).collect())
  }

  /// A profile's shelf, every book on it.
  pub async fn profile_shelf(&self, profile_id: &str) -> Result<Vec<ShelfEntry>> {
    let rows: Vec<ApiShelfEntry> = self
      .fetch_all(&format!("profiles/{}/shelf", profile_id))
      .await
      .map_err(|e| eyre!("Failed to fetch shelf for profile {}: {}", profile_id, e))?;
    Ok(rows.into_iter().map(ShelfEntry::from).collect())
  }

  /// The conversations a profile participates in.
  pub async fn profile_conversations(&self, profile_id: &str) -> Result<Vec<ConversationSummary>> {
    let rows: Vec<ApiConversation> = self
      .fetch_all(&format!("profiles/{}/conversations", profile_id))
      .await
      .map_err(|e| eyre!("Failed to fetch conversations for profile {}: {}", profile_id, e))?;
    Ok(rows.into_iter().map(ConversationSummary::from).collect())
  }

  /// A conversation's messages, oldest first.
  pub async fn conversation_messages(&self, conversation_id: &str) -> Result<Vec<ChatMessage>> {
    let rows: Vec<ApiMessage> = self
      .fetch_all(&format!("conversations/{}/messages", conversation_id))
      .await
      .map_err(|e| {
        eyre!(
          "Failed to fetch messages for conversation {}: {}",
          conversation_id,
          e
        )
      })?;
    Ok(rows.into_iter().map(ChatMessage::from).collect())
  }

  /// Post a comment; returns the server's authoritative row.
  pub async fn post_comment(&self, book_id: &str, body: &str) -> Result<Comment> {
    let url = self.endpoint(&format!("books/{}/comments", book_id))?;
    let row: ApiComment = self
      .post_json(url, &serde_json::json!({ "body": body }))
      .await
      .map_err(|e| eyre!("Failed to post comment on book {}: {}", book_id, e))?;
    Ok(row.into())
  }

  pub async fn delete_comment(&self, comment_id: &str) -> Result<()> {
    let url = self.endpoint(&format!("comments/{}", comment_id))?;
    self
      .delete(url)
      .await
      .map_err(|e| eyre!("Failed to delete comment {}: {}", comment_id, e))
  }

  /// Toggle the session user's reaction on a comment. The server resolves the
  /// toggle against its own state, so replaying it is safe.
  pub async fn toggle_comment_reaction(&self, comment_id: &str, emoji: &str) -> Result<()> {
    let url = self.endpoint(&format!("comments/{}/reactions", comment_id))?;
    self
      .post_no_content(url, &serde_json::json!({ "emoji": emoji }))
      .await
      .map_err(|e| eyre!("Failed to toggle reaction on comment {}: {}", comment_id, e))
  }

  /// Post a review; returns the server's authoritative row.
  pub async fn post_review(&self, book_id: &str, rating: u8, body: &str) -> Result<Review> {
    let url = self.endpoint(&format!("books/{}/reviews", book_id))?;
    let row: ApiReview = self
      .post_json(url, &serde_json::json!({ "rating": rating, "body": body }))
      .await
      .map_err(|e| eyre!("Failed to post review on book {}: {}", book_id, e))?;
    Ok(row.into())
  }

  pub async fn delete_review(&self, review_id: &str) -> Result<()> {
    let url = self.endpoint(&format!("reviews/{}", review_id))?;
    self
      .delete(url)
      .await
      .map_err(|e| eyre!("Failed to delete review {}: {}", review_id, e))
  }

  /// Put a book on a shelf, moving it if it is already on another one.
  pub async fn upsert_shelf_entry(
    &self,
    profile_id: &str,
    book_id: &str,
    shelf: Shelf,
  ) -> Result<ShelfEntry> {
    let url = self.endpoint(&format!("profiles/{}/shelf/{}", profile_id, book_id))?;
    let row: ApiShelfEntry = self
      .put_json(url, &serde_json::json!({ "shelf": shelf }))
      .await
      .map_err(|e| eyre!("Failed to shelve book {} for {}: {}", book_id, profile_id, e))?;
    Ok(row.into())
  }

  pub async fn remove_shelf_entry(&self, profile_id: &str, book_id: &str) -> Result<()> {
    let url = self.endpoint(&format!("profiles/{}/shelf/{}", profile_id, book_id))?;
    self
      .delete(url)
      .await
      .map_err(|e| eyre!("Failed to unshelve book {} for {}: {}", book_id, profile_id, e))
  }

  /// Send a chat message; returns the server's authoritative row.
  pub async fn send_message(&self, conversation_id: &str, body: &str) -> Result<ChatMessage> {
    let url = self.endpoint(&format!("conversations/{}/messages", conversation_id))?;
    let row: ApiMessage = self
      .post_json(url, &serde_json::json!({ "body": body }))
      .await
      .map_err(|e| {
        eyre!(
          "Failed to send message in conversation {}: {}",
          conversation_id,
          e
        )
      })?;
    Ok(row.into())
  }

  /// Toggle the session user's reaction on a chat message.
  pub async fn toggle_message_reaction(&self, message_id: &str, emoji: &str) -> Result<()> {
    let url = self.endpoint(&format!("messages/{}/reactions", message_id))?;
    self
      .post_no_content(url, &serde_json::json!({ "emoji": emoji }))
      .await
      .map_err(|e| eyre!("Failed to toggle reaction on message {}: {}", message_id, e))
  }

  pub async fn mark_conversation_read(&self, conversation_id: &str) -> Result<()> {
    let url = self.endpoint(&format!("conversations/{}/read", conversation_id))?;
    self
      .post_no_content(url, &serde_json::json!({}))
      .await
      .map_err(|e| eyre!("Failed to mark conversation {} read: {}", conversation_id, e))
  }

  /// Walk a cursor-paginated listing to the end.
  async fn fetch_all<T: DeserializeOwned>(&self, path: &str) -> Result<Vec<T>> {
    let mut rows = Vec::new();
    let mut cursor: Option<String> = None;

    loop {
      let mut url = self.endpoint(path)?;
      if let Some(cursor) = &cursor {
        url.query_pairs_mut().append_pair("cursor", cursor);
      }

      let page: ApiPage<T> = self.get_json(url).await?;
      rows.extend(page.items);

      match page.next_cursor {
        Some(next) => cursor = Some(next),
        None => break,
      }
    }

    Ok(rows)
  }

  fn endpoint(&self, path: &str) -> Result<Url> {
    self
      .base
      .join(path)
      .map_err(|e| eyre!("Invalid endpoint {}: {}", path, e))
  }

  async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T> {
    let response = self
      .http
      .get(url)
      .bearer_auth(&self.token)
      .send()
      .await?
      .error_for_status()?;
    Ok(response.json().await?)
  }

  async fn post_json<T, B>(&self, url: Url, body: &B) -> Result<T>
  where
    T: DeserializeOwned,
    B: Serialize + ?Sized,
  {
    let response = self
      .http
      .post(url)
      .bearer_auth(&self.token)
      .json(body)
      .send()
      .await?
      .error_for_status()?;
    Ok(response.json().await?)
  }

  async fn put_json<T, B>(&self, url: Url, body: &B) -> Result<T>
  where
    T: DeserializeOwned,
    B: Serialize + ?Sized,
  {
    let response = self
      .http
      .put(url)
      .bearer_auth(&self.token)
      .json(body)
      .send()
      .await?
      .error_for_status()?;
    Ok(response.json().await?)
  }

  async fn post_no_content<B: Serialize + ?Sized>(&self, url: Url, body: &B) -> Result<()> {
    self
      .http
      .post(url)
      .bearer_auth(&self.token)
      .json(body)
      .send()
      .await?
      .error_for_status()?;
    Ok(())
  }

  async fn delete(&self, url: Url) -> Result<()> {
    self
      .http
      .delete(url)
      .bearer_auth(&self.token)
      .send()
      .await?
      .error_for_status()?;
    Ok(())
  }
}

//! Serde-deserializable types matching Folio API responses.
//!
//! These types are separate from domain types to allow clean deserialization
//! while keeping domain types focused on application needs.

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::model::{
  ChatMessage, Comment, ConversationSummary, ReactionTally, Review, Shelf, ShelfEntry,
};

/// Cursor-paginated envelope every list endpoint responds with.
///
/// `items` defaults through `Vec::new` rather than `Default::default()` so
/// the derived impl does not demand `T: Default` of row types.
#[derive(Debug, Deserialize)]
pub struct ApiPage<T> {
  #[serde(default = "Vec::new")]
  pub items: Vec<T>,
  #[serde(default)]
  pub next_cursor: Option<String>,
}

// ============================================================================
// Nested field types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ApiReaction {
  pub emoji: String,
  #[serde(default)]
  pub users: Vec<String>,
}

impl From<ApiReaction> for ReactionTally {
  fn from(reaction: ApiReaction) -> Self {
    ReactionTally {
      emoji: reaction.emoji,
      users: reaction.users.into_iter().collect(),
    }
  }
}

fn into_tallies(reactions: Vec<ApiReaction>) -> Vec<ReactionTally> {
  reactions.into_iter().map(ReactionTally::from).collect()
}

// ============================================================================
// Entity rows
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ApiComment {
  pub id: String,
  pub author: String,
  #[serde(default)]
  pub body: String,
  pub posted_at: DateTime<Utc>,
  #[serde(default)]
  pub reactions: Vec<ApiReaction>,
}

impl From<ApiComment> for Comment {
  fn from(comment: ApiComment) -> Self {
    Comment {
      id: comment.id,
      author: comment.author,
      body: comment.body,
      posted_at: comment.posted_at,
      reactions: into_tallies(comment.reactions),
    }
  }
}

#[derive(Debug, Deserialize)]
pub struct ApiReview {
  pub id: String,
  pub reviewer: String,
  pub rating: u8,
  #[serde(default)]
  pub body: String,
  pub posted_at: DateTime<Utc>,
}

impl From<ApiReview> for Review {
  fn from(review: ApiReview) -> Self {
    Review {
      id: review.id,
      reviewer: review.reviewer,
      rating: review.rating,
      body: review.body,
      posted_at: review.posted_at,
    }
  }
}

#[derive(Debug, Deserialize)]
pub struct ApiShelfEntry {
  pub book_id: String,
  pub title: String,
  #[serde(default)]
  pub author: String,
  pub shelf: Shelf,
  pub added_at: DateTime<Utc>,
}

impl From<ApiShelfEntry> for ShelfEntry {
  fn from(entry: ApiShelfEntry) -> Self {
    ShelfEntry {
      book_id: entry.book_id,
      title: entry.title,
      author: entry.author,
      shelf: entry.shelf,
      added_at: entry.added_at,
    }
  }
}

#[derive(Debug, Deserialize)]
pub struct ApiConversation {
  pub id: String,
  pub title: String,
  #[serde(default)]
  pub unread: u32,
  pub last_activity: DateTime<Utc>,
}

impl From<ApiConversation> for ConversationSummary {
  fn from(conversation: ApiConversation) -> Self {
    ConversationSummary {
      id: conversation.id,
      title: conversation.title,
      unread: conversation.unread,
      last_activity: conversation.last_activity,
    }
  }
}

#[derive(Debug, Deserialize)]
pub struct ApiMessage {
  pub id: String,
  pub sender: String,
  #[serde(default)]
  pub body: String,
  pub sent_at: DateTime<Utc>,
  #[serde(default)]
  pub reactions: Vec<ApiReaction>,
}

impl From<ApiMessage> for ChatMessage {
  fn from(message: ApiMessage) -> Self {
    ChatMessage {
      id: message.id,
      sender: message.sender,
      body: message.body,
      sent_at: message.sent_at,
      reactions: into_tallies(message.reactions),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_comment_row_parses_and_dedupes_reaction_users() {
    let json = r#"{
      "id": "c1",
      "author": "u1",
      "body": "loved this chapter",
      "posted_at": "2026-03-01T09:30:00Z",
      "reactions": [{ "emoji": "❤️", "users": ["u2", "u3", "u2"] }]
    }"#;

    let comment: Comment = serde_json::from_str::<ApiComment>(json).unwrap().into();
    assert_eq!(comment.id, "c1");
    assert_eq!(comment.reactions.len(), 1);
    assert_eq!(comment.reactions[0].count(), 2);
    assert!(comment.reactions[0].reacted_by("u3"));
  }

  #[test]
  fn test_page_tolerates_missing_fields() {
    let page: ApiPage<ApiComment> = serde_json::from_str("{}").unwrap();
    assert!(page.items.is_empty());
    assert!(page.next_cursor.is_none());
  }

  #[test]
  fn test_page_carries_rows_and_cursor() {
    let json = r#"{
      "items": [{
        "id": "c1",
        "author": "u1",
        "posted_at": "2026-03-01T09:30:00Z"
      }],
      "next_cursor": "abc"
    }"#;

    let page: ApiPage<ApiComment> = serde_json::from_str(json).unwrap();
    assert_eq!(page.items.len(), 1);
    assert_eq!(page.items[0].id, "c1");
    assert_eq!(page.next_cursor.as_deref(), Some("abc"));
  }

  #[test]
  fn test_shelf_names_use_snake_case() {
    let json = r#"{
      "book_id": "b1",
      "title": "The Left Hand of Darkness",
      "author": "Ursula K. Le Guin",
      "shelf": "want_to_read",
      "added_at": "2026-02-11T18:00:00Z"
    }"#;

    let entry: ShelfEntry = serde_json::from_str::<ApiShelfEntry>(json).unwrap().into();
    assert_eq!(entry.shelf, Shelf::WantToRead);
  }
}

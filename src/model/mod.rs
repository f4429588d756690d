//! Domain types for Folio collections.

pub mod messages;
pub mod reactions;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use reactions::ReactionTally;

/// Trait for items held in a keyed collection.
///
/// Implementors provide a unique id within their collection and a collection
/// name used for log labels.
pub trait Entity: Clone + std::fmt::Debug + Send + Sync + 'static {
  /// Unique identifier for this item (server-assigned, or a temporary
  /// client-generated id while an optimistic insert is unconfirmed).
  fn id(&self) -> &str;

  /// Collection name for logging (e.g., "comments").
  fn collection() -> &'static str;
}

/// Trait for items that carry per-emoji reaction tallies.
///
/// Both the optimistic toggle path and the realtime reconciler mutate
/// reactions through this trait so the two stay consistent.
pub trait Reactable: Entity {
  fn reactions(&self) -> &[ReactionTally];
  fn reactions_mut(&mut self) -> &mut Vec<ReactionTally>;
}

/// A comment in a book's discussion feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
  pub id: String,
  pub author: String,
  pub body: String,
  pub posted_at: DateTime<Utc>,
  #[serde(default)]
  pub reactions: Vec<ReactionTally>,
}

/// A review of a book, rated 1-5.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Review {
  pub id: String,
  pub reviewer: String,
  pub rating: u8,
  pub body: String,
  pub posted_at: DateTime<Utc>,
}

/// Which shelf a book sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Shelf {
  Reading,
  Finished,
  WantToRead,
}

impl std::fmt::Display for Shelf {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    let name = match self {
      Shelf::Reading => "reading",
      Shelf::Finished => "finished",
      Shelf::WantToRead => "want to read",
    };
    f.write_str(name)
  }
}

/// A book on someone's shelf.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShelfEntry {
  pub book_id: String,
  pub title: String,
  pub author: String,
  pub shelf: Shelf,
  pub added_at: DateTime<Utc>,
}

/// A group conversation as listed in someone's inbox.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationSummary {
  pub id: String,
  pub title: String,
  pub unread: u32,
  pub last_activity: DateTime<Utc>,
}

/// A message inside a group conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
  pub id: String,
  pub sender: String,
  pub body: String,
  pub sent_at: DateTime<Utc>,
  #[serde(default)]
  pub reactions: Vec<ReactionTally>,
}

impl Entity for Comment {
  fn id(&self) -> &str {
    &self.id
  }

  fn collection() -> &'static str {
    "comments"
  }
}

impl Reactable for Comment {
  fn reactions(&self) -> &[ReactionTally] {
    &self.reactions
  }

  fn reactions_mut(&mut self) -> &mut Vec<ReactionTally> {
    &mut self.reactions
  }
}

impl Entity for Review {
  fn id(&self) -> &str {
    &self.id
  }

  fn collection() -> &'static str {
    "reviews"
  }
}

impl Entity for ShelfEntry {
  // A book appears at most once on a profile's shelf, so the book id is the
  // item id.
  fn id(&self) -> &str {
    &self.book_id
  }

  fn collection() -> &'static str {
    "shelves"
  }
}

impl Entity for ConversationSummary {
  fn id(&self) -> &str {
    &self.id
  }

  fn collection() -> &'static str {
    "conversations"
  }
}

impl Entity for ChatMessage {
  fn id(&self) -> &str {
    &self.id
  }

  fn collection() -> &'static str {
    "messages"
  }
}

impl Reactable for ChatMessage {
  fn reactions(&self) -> &[ReactionTally] {
    &self.reactions
  }

  fn reactions_mut(&mut self) -> &mut Vec<ReactionTally> {
    &mut self.reactions
  }
}

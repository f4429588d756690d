//! Merges pushed deltas into cached entries instead of refetching.
//!
//! One reconciler task drains the live feed sequentially, so events for a
//! key are applied in delivery order. Redelivered events are detected
//! against current cache state, not an id log: a reaction that is already
//! present, a message id already in the list, or an unread count already at
//! its target is dropped as a duplicate.

use std::sync::Arc;

use tracing::{debug, info};

use super::collection::Collection;
use crate::live::{LiveEvent, LiveEventKind, LiveFeed};
use crate::model::{messages, reactions, ChatMessage, Comment, ConversationSummary, Reactable};

/// What applying one live event did to the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
  /// The delta changed a cached entry.
  Merged,
  /// The cache already reflected this event; nothing changed.
  Duplicate,
  /// Nothing cached under the event's key; the next fetch covers it.
  NoEntry,
}

/// Applies realtime deltas to the collections they target.
pub struct Reconciler {
  comments: Arc<Collection<Comment>>,
  messages: Arc<Collection<ChatMessage>>,
  conversations: Arc<Collection<ConversationSummary>>,
}

impl Reconciler {
  pub fn new(
    comments: Arc<Collection<Comment>>,
    messages: Arc<Collection<ChatMessage>>,
    conversations: Arc<Collection<ConversationSummary>>,
  ) -> Self {
    Self {
      comments,
      messages,
      conversations,
    }
  }

  /// Drain `feed` until every publisher is gone.
  pub async fn run(self, mut feed: LiveFeed) {
    info!("realtime reconciler running");
    while let Some(event) = feed.next().await {
      self.apply(&event);
    }
    info!("live feed closed, reconciler stopping");
  }

  /// Merge one delta into the cache.
  pub fn apply(&self, event: &LiveEvent) -> Applied {
    let outcome = match &event.kind {
      LiveEventKind::CommentReactionAdded {
        book_id,
        comment_id,
        emoji,
        user,
      } => apply_reaction(&self.comments, book_id, comment_id, emoji, user, true),
      LiveEventKind::CommentReactionRemoved {
        book_id,
        comment_id,
        emoji,
        user,
      } => apply_reaction(&self.comments, book_id, comment_id, emoji, user, false),
      LiveEventKind::MessageReactionAdded {
        conversation_id,
        message_id,
        emoji,
        user,
      } => apply_reaction(&self.messages, conversation_id, message_id, emoji, user, true),
      LiveEventKind::MessageReactionRemoved {
        conversation_id,
        message_id,
        emoji,
        user,
      } => apply_reaction(&self.messages, conversation_id, message_id, emoji, user, false),
      LiveEventKind::MessagePosted {
        conversation_id,
        message,
      } => self.apply_message(conversation_id, message),
      LiveEventKind::UnreadChanged {
        profile_id,
        conversation_id,
        unread,
      } => self.apply_unread(profile_id, conversation_id, *unread),
    };

    match outcome {
      Applied::Merged => debug!(event_id = %event.event_id, "live event merged"),
      Applied::Duplicate => debug!(event_id = %event.event_id, "duplicate live event ignored"),
      Applied::NoEntry => debug!(event_id = %event.event_id, "live event for uncached key dropped"),
    }
    outcome
  }

  fn apply_message(&self, conversation_id: &str, message: &ChatMessage) -> Applied {
    let mut inserted = false;
    let entry = self.messages.mutate(conversation_id, |items| {
      // A send confirm can land the same server row concurrently; the id
      // check has to happen under the same lock as the insert.
      inserted = messages::insert_chronological(items, message);
    });

    match entry {
      None => Applied::NoEntry,
      Some(_) if inserted => Applied::Merged,
      Some(_) => Applied::Duplicate,
    }
  }

  fn apply_unread(&self, profile_id: &str, conversation_id: &str, unread: u32) -> Applied {
    let Some(entry) = self.conversations.peek(profile_id) else {
      return Applied::NoEntry;
    };
    let Some(convo) = entry.items.iter().find(|c| c.id == conversation_id) else {
      return Applied::NoEntry;
    };
    if convo.unread == unread {
      return Applied::Duplicate;
    }

    self.conversations.mutate(profile_id, |items| {
      if let Some(convo) = items.iter_mut().find(|c| c.id == conversation_id) {
        convo.unread = unread;
      }
    });
    Applied::Merged
  }
}

fn apply_reaction<T: Reactable>(
  collection: &Collection<T>,
  key: &str,
  item_id: &str,
  emoji: &str,
  user: &str,
  add: bool,
) -> Applied {
  let Some(entry) = collection.peek(key) else {
    return Applied::NoEntry;
  };
  let Some(item) = entry.items.iter().find(|i| i.id() == item_id) else {
    return Applied::NoEntry;
  };

  // The event is a duplicate when the cache already shows its end state.
  if reactions::has(item.reactions(), emoji, user) == add {
    return Applied::Duplicate;
  }

  collection.mutate(key, |items| {
    if add {
      reactions::add_on(items, item_id, emoji, user);
    } else {
      reactions::remove_on(items, item_id, emoji, user);
    }
  });
  Applied::Merged
}

#[cfg(test)]
mod tests {
  use chrono::{Duration, TimeZone, Utc};

  use super::*;
  use crate::model::{Entity, ReactionTally};

  fn comment(id: &str) -> Comment {
    Comment {
      id: id.to_string(),
      author: "u1".to_string(),
      body: "nice chapter".to_string(),
      posted_at: Utc::now(),
      reactions: Vec::new(),
    }
  }

  fn message(id: &str, minute: u32) -> ChatMessage {
    ChatMessage {
      id: id.to_string(),
      sender: "u1".to_string(),
      body: "hello".to_string(),
      sent_at: Utc.with_ymd_and_hms(2026, 3, 1, 9, minute, 0).unwrap(),
      reactions: Vec::new(),
    }
  }

  fn conversation(id: &str, unread: u32) -> ConversationSummary {
    ConversationSummary {
      id: id.to_string(),
      title: "book club".to_string(),
      unread,
      last_activity: Utc::now(),
    }
  }

  fn reconciler() -> Reconciler {
    Reconciler::new(
      Arc::new(Collection::new(Duration::minutes(5))),
      Arc::new(Collection::new(Duration::minutes(5))),
      Arc::new(Collection::new(Duration::minutes(5))),
    )
  }

  async fn seed<T: Entity>(collection: &Arc<Collection<T>>, key: &str, items: Vec<T>) {
    collection
      .get_or_fetch(key, move || async move { Ok(items) })
      .await
      .unwrap();
  }

  fn reaction_added(comment_id: &str) -> LiveEvent {
    LiveEvent::new(LiveEventKind::CommentReactionAdded {
      book_id: "b1".to_string(),
      comment_id: comment_id.to_string(),
      emoji: "❤️".to_string(),
      user: "u2".to_string(),
    })
  }

  #[tokio::test]
  async fn test_redelivered_reaction_changes_nothing() {
    let r = reconciler();
    seed(&r.comments, "b1", vec![comment("c1")]).await;

    assert_eq!(r.apply(&reaction_added("c1")), Applied::Merged);
    let after_first = r.comments.peek("b1").unwrap().items;

    assert_eq!(r.apply(&reaction_added("c1")), Applied::Duplicate);
    let after_second = r.comments.peek("b1").unwrap().items;

    assert_eq!(after_first.as_ref(), after_second.as_ref());
    assert_eq!(after_first[0].reactions[0].count(), 1);
  }

  #[tokio::test]
  async fn test_event_for_uncached_key_is_dropped() {
    let r = reconciler();
    assert_eq!(r.apply(&reaction_added("c1")), Applied::NoEntry);
    assert!(r.comments.peek("b1").is_none());
  }

  #[tokio::test]
  async fn test_event_for_unknown_item_is_dropped() {
    let r = reconciler();
    seed(&r.comments, "b1", vec![comment("c1")]).await;
    assert_eq!(r.apply(&reaction_added("ghost")), Applied::NoEntry);
  }

  #[tokio::test]
  async fn test_reaction_removal_clears_empty_tally() {
    let r = reconciler();
    let mut seeded = comment("c1");
    seeded.reactions.push(ReactionTally::seeded("❤️", "u2"));
    seed(&r.comments, "b1", vec![seeded]).await;

    let event = LiveEvent::new(LiveEventKind::CommentReactionRemoved {
      book_id: "b1".to_string(),
      comment_id: "c1".to_string(),
      emoji: "❤️".to_string(),
      user: "u2".to_string(),
    });
    assert_eq!(r.apply(&event), Applied::Merged);
    assert!(r.comments.peek("b1").unwrap().items[0].reactions.is_empty());

    // Removing a reaction that is already gone is a duplicate, not an error.
    assert_eq!(r.apply(&event), Applied::Duplicate);
  }

  #[tokio::test]
  async fn test_posted_message_lands_in_timestamp_order() {
    let r = reconciler();
    seed(&r.messages, "v1", vec![message("m1", 10), message("m3", 30)]).await;

    let event = LiveEvent::new(LiveEventKind::MessagePosted {
      conversation_id: "v1".to_string(),
      message: message("m2", 20),
    });
    assert_eq!(r.apply(&event), Applied::Merged);

    let ids: Vec<_> = r
      .messages
      .peek("v1")
      .unwrap()
      .items
      .iter()
      .map(|m| m.id.clone())
      .collect();
    assert_eq!(ids, vec!["m1", "m2", "m3"]);

    assert_eq!(r.apply(&event), Applied::Duplicate);
    assert_eq!(r.messages.peek("v1").unwrap().len(), 3);
  }

  #[tokio::test]
  async fn test_push_arriving_after_send_confirm_is_duplicate() {
    let r = reconciler();
    seed(&r.messages, "v1", vec![message("m1", 10)]).await;

    // The send confirm already landed the server row for this message.
    let confirmed = message("m2", 20);
    r.messages.mutate("v1", |items| {
      messages::insert_chronological(items, &confirmed);
    });

    let event = LiveEvent::new(LiveEventKind::MessagePosted {
      conversation_id: "v1".to_string(),
      message: message("m2", 20),
    });
    assert_eq!(r.apply(&event), Applied::Duplicate);

    let items = r.messages.peek("v1").unwrap().items;
    assert_eq!(items.len(), 2);
    assert_eq!(items.iter().filter(|m| m.id == "m2").count(), 1);
  }

  #[tokio::test]
  async fn test_unread_change_applies_once() {
    let r = reconciler();
    seed(&r.conversations, "p1", vec![conversation("v1", 2)]).await;

    let event = LiveEvent::new(LiveEventKind::UnreadChanged {
      profile_id: "p1".to_string(),
      conversation_id: "v1".to_string(),
      unread: 5,
    });
    assert_eq!(r.apply(&event), Applied::Merged);
    assert_eq!(r.conversations.peek("p1").unwrap().items[0].unread, 5);
    assert_eq!(r.apply(&event), Applied::Duplicate);
  }

  #[tokio::test]
  async fn test_run_drains_feed_until_closed() {
    let r = reconciler();
    seed(&r.conversations, "p1", vec![conversation("v1", 0)]).await;
    let conversations = Arc::clone(&r.conversations);

    let (publisher, feed) = LiveFeed::channel();
    let task = tokio::spawn(r.run(feed));

    publisher.publish(LiveEvent::new(LiveEventKind::UnreadChanged {
      profile_id: "p1".to_string(),
      conversation_id: "v1".to_string(),
      unread: 4,
    }));
    drop(publisher);

    task.await.unwrap();
    assert_eq!(conversations.peek("p1").unwrap().items[0].unread, 4);
  }
}

//! Deltas pushed over the realtime connection.
//!
//! The transport itself lives elsewhere; whatever receives frames turns them
//! into [`LiveEvent`]s and hands them to a [`LivePublisher`]. The paired
//! [`LiveFeed`] is drained by the reconciler, one event at a time, in the
//! order they were published.

use tokio::sync::mpsc;
use uuid::Uuid;

use crate::model::ChatMessage;

/// One pushed delta, tagged with a delivery id for log correlation.
#[derive(Debug, Clone)]
pub struct LiveEvent {
  pub event_id: Uuid,
  pub kind: LiveEventKind,
}

impl LiveEvent {
  pub fn new(kind: LiveEventKind) -> Self {
    Self {
      event_id: Uuid::new_v4(),
      kind,
    }
  }
}

/// What the server is telling us changed.
#[derive(Debug, Clone)]
pub enum LiveEventKind {
  CommentReactionAdded {
    book_id: String,
    comment_id: String,
    emoji: String,
    user: String,
  },
  CommentReactionRemoved {
    book_id: String,
    comment_id: String,
    emoji: String,
    user: String,
  },
  MessageReactionAdded {
    conversation_id: String,
    message_id: String,
    emoji: String,
    user: String,
  },
  MessageReactionRemoved {
    conversation_id: String,
    message_id: String,
    emoji: String,
    user: String,
  },
  MessagePosted {
    conversation_id: String,
    message: ChatMessage,
  },
  UnreadChanged {
    profile_id: String,
    conversation_id: String,
    unread: u32,
  },
}

/// Sending half of the live event channel. Clone freely.
#[derive(Debug, Clone)]
pub struct LivePublisher {
  tx: mpsc::UnboundedSender<LiveEvent>,
}

impl LivePublisher {
  pub fn publish(&self, event: LiveEvent) {
    // A closed feed means the reconciler stopped; events are droppable then.
    let _ = self.tx.send(event);
  }
}

/// Receiving half of the live event channel.
#[derive(Debug)]
pub struct LiveFeed {
  rx: mpsc::UnboundedReceiver<LiveEvent>,
}

impl LiveFeed {
  pub fn channel() -> (LivePublisher, LiveFeed) {
    let (tx, rx) = mpsc::unbounded_channel();
    (LivePublisher { tx }, LiveFeed { rx })
  }

  /// Next pushed event, `None` once every publisher is gone.
  pub async fn next(&mut self) -> Option<LiveEvent> {
    self.rx.recv().await
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[tokio::test]
  async fn test_events_arrive_in_publish_order() {
    let (publisher, mut feed) = LiveFeed::channel();

    for unread in [3, 0] {
      publisher.publish(LiveEvent::new(LiveEventKind::UnreadChanged {
        profile_id: "p1".to_string(),
        conversation_id: "v1".to_string(),
        unread,
      }));
    }
    drop(publisher);

    let mut seen = Vec::new();
    while let Some(event) = feed.next().await {
      match event.kind {
        LiveEventKind::UnreadChanged { unread, .. } => seen.push(unread),
        other => panic!("unexpected event {other:?}"),
      }
    }
    assert_eq!(seen, vec![3, 0]);
  }
}

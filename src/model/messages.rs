//! Chronological message-list ops shared by the optimistic send path and
//! the realtime reconciler.

use super::ChatMessage;

/// Insert `message` in `sent_at` order unless its id is already present.
///
/// Returns whether the list changed. Check and insert are a single step so
/// callers can run both under one cache lock: the send confirm and the
/// pushed copy of the same message both funnel through here, and whichever
/// lands second becomes a no-op.
pub fn insert_chronological(items: &mut Vec<ChatMessage>, message: &ChatMessage) -> bool {
  if items.iter().any(|m| m.id == message.id) {
    return false;
  }
  // Usually the tail; a late-delivered older message lands mid-list.
  let at = items.partition_point(|m| m.sent_at <= message.sent_at);
  items.insert(at, message.clone());
  true
}

//! Reaction tallies and the item-level ops shared by the optimistic mutation
//! path and the realtime reconciler.
//!
//! A tally keeps the full set of reacting users rather than a bare count:
//! per-user membership is what lets duplicate delivery of a pushed reaction
//! be detected exactly, and it makes the zero-count rule (a tally whose last
//! user leaves is removed, never kept at zero) fall out naturally.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::Reactable;

/// Per-emoji reaction bookkeeping on a comment or chat message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReactionTally {
  pub emoji: String,
  pub users: BTreeSet<String>,
}

impl ReactionTally {
  /// A fresh tally with a single reacting user.
  pub fn seeded(emoji: impl Into<String>, user: impl Into<String>) -> Self {
    let mut users = BTreeSet::new();
    users.insert(user.into());
    Self {
      emoji: emoji.into(),
      users,
    }
  }

  pub fn count(&self) -> usize {
    self.users.len()
  }

  pub fn reacted_by(&self, user: &str) -> bool {
    self.users.contains(user)
  }
}

/// True when `user` already reacted with `emoji`.
pub fn has(tallies: &[ReactionTally], emoji: &str, user: &str) -> bool {
  tallies
    .iter()
    .any(|t| t.emoji == emoji && t.reacted_by(user))
}

/// Record `user` reacting with `emoji`.
///
/// Returns false (and changes nothing) if the user already reacted, so
/// redelivered events cannot double-count.
pub fn add(tallies: &mut Vec<ReactionTally>, emoji: &str, user: &str) -> bool {
  match tallies.iter_mut().find(|t| t.emoji == emoji) {
    Some(tally) => tally.users.insert(user.to_string()),
    None => {
      tallies.push(ReactionTally::seeded(emoji, user));
      true
    }
  }
}

/// Remove `user`'s reaction with `emoji`.
///
/// A tally left without users is removed from the list entirely. Returns
/// false (and changes nothing) if the user had not reacted.
pub fn remove(tallies: &mut Vec<ReactionTally>, emoji: &str, user: &str) -> bool {
  let Some(idx) = tallies.iter().position(|t| t.emoji == emoji) else {
    return false;
  };
  let removed = tallies[idx].users.remove(user);
  if removed && tallies[idx].users.is_empty() {
    tallies.remove(idx);
  }
  removed
}

/// Flip `user`'s reaction with `emoji`: absent adds it, present removes it.
///
/// Returns true when the user is reacted after the toggle.
pub fn toggle(tallies: &mut Vec<ReactionTally>, emoji: &str, user: &str) -> bool {
  if has(tallies, emoji, user) {
    remove(tallies, emoji, user);
    false
  } else {
    add(tallies, emoji, user);
    true
  }
}

/// Toggle a reaction on the item with `item_id` inside a cached collection.
///
/// Unknown item ids are a no-op: the item may have been deleted between the
/// view rendering and the toggle landing.
pub fn toggle_on<T: Reactable>(items: &mut [T], item_id: &str, emoji: &str, user: &str) {
  if let Some(item) = items.iter_mut().find(|i| i.id() == item_id) {
    toggle(item.reactions_mut(), emoji, user);
  }
}

/// Record a pushed reaction on the item with `item_id`. Returns whether the
/// delta changed anything (false means it was already reflected).
pub fn add_on<T: Reactable>(items: &mut [T], item_id: &str, emoji: &str, user: &str) -> bool {
  match items.iter_mut().find(|i| i.id() == item_id) {
    Some(item) => add(item.reactions_mut(), emoji, user),
    None => false,
  }
}

/// Remove a pushed reaction from the item with `item_id`. Returns whether the
/// delta changed anything.
pub fn remove_on<T: Reactable>(items: &mut [T], item_id: &str, emoji: &str, user: &str) -> bool {
  match items.iter_mut().find(|i| i.id() == item_id) {
    Some(item) => remove(item.reactions_mut(), emoji, user),
    None => false,
  }
}

#[cfg(test)]
mod tests {
  use chrono::Utc;

  use super::*;
  use crate::model::Comment;

  fn comment(id: &str) -> Comment {
    Comment {
      id: id.to_string(),
      author: "ana".to_string(),
      body: "loved this chapter".to_string(),
      posted_at: Utc::now(),
      reactions: Vec::new(),
    }
  }

  #[test]
  fn test_toggle_adds_then_removes() {
    let mut tallies = Vec::new();

    assert!(toggle(&mut tallies, "👍", "ana"));
    assert_eq!(tallies.len(), 1);
    assert_eq!(tallies[0].count(), 1);
    assert!(tallies[0].reacted_by("ana"));

    // Toggling again removes the tally entirely, not leaving it at zero.
    assert!(!toggle(&mut tallies, "👍", "ana"));
    assert!(tallies.is_empty());
  }

  #[test]
  fn test_remove_keeps_tally_while_other_users_remain() {
    let mut tallies = Vec::new();
    add(&mut tallies, "❤️", "ana");
    add(&mut tallies, "❤️", "ben");

    assert!(remove(&mut tallies, "❤️", "ana"));
    assert_eq!(tallies.len(), 1);
    assert_eq!(tallies[0].count(), 1);
    assert!(!tallies[0].reacted_by("ana"));
    assert!(tallies[0].reacted_by("ben"));
  }

  #[test]
  fn test_add_is_idempotent() {
    let mut tallies = Vec::new();

    assert!(add(&mut tallies, "👍", "ana"));
    assert!(!add(&mut tallies, "👍", "ana"));
    assert_eq!(tallies[0].count(), 1);
  }

  #[test]
  fn test_remove_missing_reaction_is_noop() {
    let mut tallies = vec![ReactionTally::seeded("👍", "ana")];

    assert!(!remove(&mut tallies, "👍", "ben"));
    assert!(!remove(&mut tallies, "🎉", "ana"));
    assert_eq!(tallies.len(), 1);
  }

  #[test]
  fn test_toggle_on_unknown_item_is_noop() {
    let mut items = vec![comment("c1")];

    toggle_on(&mut items, "missing", "👍", "ana");
    assert!(items[0].reactions.is_empty());
  }

  #[test]
  fn test_add_on_reports_whether_delta_applied() {
    let mut items = vec![comment("c1")];

    assert!(add_on(&mut items, "c1", "👍", "ana"));
    assert!(!add_on(&mut items, "c1", "👍", "ana"));
    assert_eq!(items[0].reactions[0].count(), 1);
  }
}

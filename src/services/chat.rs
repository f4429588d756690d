use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use crate::api::ApiClient;
use crate::error::SyncError;
use crate::model::{messages, reactions, ChatMessage, ConversationSummary};
use crate::store::{optimistic, CacheRead, Collection, CollectionHandle};

/// Group chat: a profile's conversation list and each conversation's
/// messages, with optimistic sends, reaction toggles, and read marks.
#[derive(Clone)]
pub struct ChatService {
  api: ApiClient,
  conversations: Arc<Collection<ConversationSummary>>,
  messages: Arc<Collection<ChatMessage>>,
  session_user: String,
}

impl ChatService {
  pub(crate) fn new(
    api: ApiClient,
    conversations: Arc<Collection<ConversationSummary>>,
    messages: Arc<Collection<ChatMessage>>,
    session_user: String,
  ) -> Self {
    Self {
      api,
      conversations,
      messages,
      session_user,
    }
  }

  /// The conversations of `profile_id`, served per the cache discipline.
  pub async fn conversations(
    &self,
    profile_id: &str,
  ) -> Result<CacheRead<ConversationSummary>, SyncError> {
    let api = self.api.clone();
    let key = profile_id.to_string();
    self
      .conversations
      .get_or_fetch(profile_id, move || async move {
        api
          .profile_conversations(&key)
          .await
          .map_err(SyncError::network)
      })
      .await
  }

  /// The messages of `conversation_id`, oldest first.
  pub async fn messages(&self, conversation_id: &str) -> Result<CacheRead<ChatMessage>, SyncError> {
    let api = self.api.clone();
    let key = conversation_id.to_string();
    self
      .messages
      .get_or_fetch(conversation_id, move || async move {
        api
          .conversation_messages(&key)
          .await
          .map_err(SyncError::network)
      })
      .await
  }

  /// Subscribe to `profile_id`'s conversation list.
  pub fn watch_conversations(&self, profile_id: &str) -> CollectionHandle<ConversationSummary> {
    let api = self.api.clone();
    let key = profile_id.to_string();
    self
      .conversations
      .ensure_fresh(profile_id, move || async move {
        api
          .profile_conversations(&key)
          .await
          .map_err(SyncError::network)
      });
    self.conversations.subscribe(profile_id)
  }

  /// Subscribe to `conversation_id`'s messages.
  pub fn watch_messages(&self, conversation_id: &str) -> CollectionHandle<ChatMessage> {
    let api = self.api.clone();
    let key = conversation_id.to_string();
    self
      .messages
      .ensure_fresh(conversation_id, move || async move {
        api
          .conversation_messages(&key)
          .await
          .map_err(SyncError::network)
      });
    self.messages.subscribe(conversation_id)
  }

  /// Send a message, visible in the conversation before the server confirms
  /// it.
  ///
  /// The confirm step has to tolerate the pushed copy of the same message
  /// arriving first over the live feed: the temporary row is dropped and the
  /// server row inserted only if its id is not already present.
  pub async fn send(&self, conversation_id: &str, body: &str) -> Result<ChatMessage, SyncError> {
    let temp_id = format!("local-{}", Uuid::new_v4());
    let draft = ChatMessage {
      id: temp_id.clone(),
      sender: self.session_user.clone(),
      body: body.to_string(),
      sent_at: Utc::now(),
      reactions: Vec::new(),
    };

    let remote = {
      let api = self.api.clone();
      let conversation_id = conversation_id.to_string();
      let body = body.to_string();
      async move {
        api
          .send_message(&conversation_id, &body)
          .await
          .map_err(SyncError::network)
      }
    };

    optimistic::apply(
      &self.messages,
      conversation_id,
      move |items| items.push(draft),
      remote,
      move |items, row: &ChatMessage| {
        items.retain(|m| m.id != temp_id);
        messages::insert_chronological(items, row);
      },
    )
    .await
  }

  /// Toggle the session user's reaction on a message.
  pub async fn toggle_reaction(
    &self,
    conversation_id: &str,
    message_id: &str,
    emoji: &str,
  ) -> Result<(), SyncError> {
    let remote = {
      let api = self.api.clone();
      let message_id = message_id.to_string();
      let emoji = emoji.to_string();
      async move {
        api
          .toggle_message_reaction(&message_id, &emoji)
          .await
          .map_err(SyncError::network)
      }
    };

    let message_id = message_id.to_string();
    let emoji = emoji.to_string();
    let user = self.session_user.clone();
    optimistic::apply(
      &self.messages,
      conversation_id,
      move |items| reactions::toggle_on(items, &message_id, &emoji, &user),
      remote,
      |_items, _row: &()| {},
    )
    .await
  }

  /// Mark a conversation read, its unread badge cleared before the server
  /// confirms it.
  pub async fn mark_read(&self, profile_id: &str, conversation_id: &str) -> Result<(), SyncError> {
    let remote = {
      let api = self.api.clone();
      let conversation_id = conversation_id.to_string();
      async move {
        api
          .mark_conversation_read(&conversation_id)
          .await
          .map_err(SyncError::network)
      }
    };

    let conversation_id = conversation_id.to_string();
    optimistic::apply(
      &self.conversations,
      profile_id,
      move |items| {
        if let Some(convo) = items.iter_mut().find(|c| c.id == conversation_id) {
          convo.unread = 0;
        }
      },
      remote,
      |_items, _row: &()| {},
    )
    .await
  }
}

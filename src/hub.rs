//! The injected owner of every cached collection and service.

use std::sync::Arc;

use tracing::info;

use crate::api::ApiClient;
use crate::config::Config;
use crate::live::{LiveFeed, LivePublisher};
use crate::model::{ChatMessage, Comment, ConversationSummary, Review, ShelfEntry};
use crate::services::{ChatService, CommentsService, ReviewsService, ShelvesService};
use crate::store::{Collection, Reconciler};

/// Constructor-injected hub owning the cached collections, the services over
/// them, and the realtime reconciler.
///
/// There is no global state anywhere in the crate: everything that caches
/// hangs off a hub instance, tests build isolated hubs, and two hubs never
/// share an entry.
pub struct SyncHub {
  comments: Arc<Collection<Comment>>,
  reviews: Arc<Collection<Review>>,
  shelves: Arc<Collection<ShelfEntry>>,
  conversations: Arc<Collection<ConversationSummary>>,
  messages: Arc<Collection<ChatMessage>>,
  comments_service: CommentsService,
  reviews_service: ReviewsService,
  shelves_service: ShelvesService,
  chat_service: ChatService,
}

impl SyncHub {
  pub fn new(api: ApiClient, config: &Config) -> Self {
    let comments = Arc::new(Collection::new(config.cache.comments_ttl()));
    let reviews = Arc::new(Collection::new(config.cache.reviews_ttl()));
    let shelves = Arc::new(Collection::new(config.cache.shelves_ttl()));
    let conversations = Arc::new(Collection::new(config.cache.conversations_ttl()));
    let messages = Arc::new(Collection::new(config.cache.messages_ttl()));
    let session_user = config.profile.clone();

    Self {
      comments_service: CommentsService::new(
        api.clone(),
        Arc::clone(&comments),
        session_user.clone(),
      ),
      reviews_service: ReviewsService::new(
        api.clone(),
        Arc::clone(&reviews),
        session_user.clone(),
      ),
      shelves_service: ShelvesService::new(api.clone(), Arc::clone(&shelves)),
      chat_service: ChatService::new(
        api,
        Arc::clone(&conversations),
        Arc::clone(&messages),
        session_user,
      ),
      comments,
      reviews,
      shelves,
      conversations,
      messages,
    }
  }

  pub fn comments(&self) -> &CommentsService {
    &self.comments_service
  }

  pub fn reviews(&self) -> &ReviewsService {
    &self.reviews_service
  }

  pub fn shelves(&self) -> &ShelvesService {
    &self.shelves_service
  }

  pub fn chat(&self) -> &ChatService {
    &self.chat_service
  }

  /// Spawn the reconciler task and hand back the publisher the realtime
  /// transport feeds events into.
  pub fn start_reconciler(&self) -> LivePublisher {
    let (publisher, feed) = LiveFeed::channel();
    let reconciler = Reconciler::new(
      Arc::clone(&self.comments),
      Arc::clone(&self.messages),
      Arc::clone(&self.conversations),
    );
    tokio::spawn(reconciler.run(feed));
    publisher
  }

  /// Logout wipe: every cached collection emptied at once. Subscriptions
  /// stay alive and observe the empty state.
  pub fn invalidate_all(&self) {
    info!("invalidating every cached collection");
    self.comments.invalidate_all();
    self.reviews.invalidate_all();
    self.shelves.invalidate_all();
    self.conversations.invalidate_all();
    self.messages.invalidate_all();
  }
}

//! Error taxonomy for the sync layer.

use thiserror::Error;

/// Errors surfaced by cached reads and optimistic mutations.
///
/// The enum is `Clone` so a single failed fetch can be handed to every caller
/// that joined it. Transport details are flattened to a message at the async
/// boundary; callers that need the original error chain get it from the API
/// client before it crosses into the cache.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyncError {
  /// A fetch or mutation request failed on the network.
  #[error("network request failed: {message}")]
  Network { message: String },

  /// A mutation request failed and the local change was rolled back.
  ///
  /// The rollback and the failure are one linked outcome: by the time a
  /// caller sees this error, the visible items for the key have already been
  /// restored to the pre-mutation snapshot.
  #[error("mutation failed, local change rolled back: {message}")]
  RolledBack { message: String },
}

impl SyncError {
  /// Wrap a transport-level error as a network failure.
  pub fn network(err: impl std::fmt::Display) -> Self {
    Self::Network {
      message: err.to_string(),
    }
  }

  /// Re-tag a failure as rolled back, keeping the underlying message.
  pub(crate) fn into_rolled_back(self) -> Self {
    match self {
      Self::Network { message } | Self::RolledBack { message } => Self::RolledBack { message },
    }
  }

  /// True for errors produced by a rolled-back mutation.
  pub fn is_rollback(&self) -> bool {
    matches!(self, Self::RolledBack { .. })
  }
}

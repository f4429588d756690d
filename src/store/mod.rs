//! Keyed entity cache with request coalescing, staleness-driven refresh,
//! optimistic mutations, and realtime reconciliation.
//!
//! This is the mechanism behind every list the app shows:
//! - [`KeyedStore`] holds ordered collections per resource key and publishes
//!   state snapshots to subscribers
//! - [`PendingFetches`] guarantees at most one outstanding network fetch per
//!   key, however many views ask at once
//! - [`staleness`] decides when a cache hit warrants a silent background
//!   refresh (the read itself never blocks on it)
//! - [`optimistic`] applies local mutations ahead of server confirmation and
//!   rolls them back on failure
//! - [`Reconciler`] merges pushed deltas (reactions, messages, unread counts)
//!   into cached entries without refetching

mod collection;
mod entry;
mod handle;
mod keyed;
mod lock;
pub mod optimistic;
mod pending;
mod reconcile;
pub mod staleness;

pub use collection::Collection;
pub use entry::{CacheEntry, CacheRead, CacheSource, CollectionState};
pub use handle::CollectionHandle;
pub use keyed::KeyedStore;
pub use pending::{FetchResult, PendingFetches};
pub use reconcile::{Applied, Reconciler};

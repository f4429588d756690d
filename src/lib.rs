//! folio-sync - the client-side data layer of Folio
//!
//! Everything between "a view asks for data" and "bytes on the wire":
//!
//! - `store` - keyed entity cache with request coalescing, staleness-driven
//!   background refresh, optimistic mutations, and realtime reconciliation
//! - `model` - domain types and the shared reaction ops
//! - `api` - thin reqwest client for the Folio REST API
//! - `services` - per-feature facades views actually call
//! - `live` - the pushed-event seam between a transport and the reconciler
//! - `hub` - the injected owner wiring all of the above together
//! - `config` - YAML configuration and token lookup

pub mod api;
pub mod config;
pub mod error;
pub mod hub;
pub mod live;
pub mod model;
pub mod services;
pub mod store;

pub use config::Config;
pub use error::SyncError;
pub use hub::SyncHub;

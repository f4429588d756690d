//! Thin REST client for the Folio service.

mod client;
pub(crate) mod types;

pub use client::ApiClient;

// src/api/mod.rs

//! Catalog API access.
//!
//! The capability trait, the HTTP client behind it, sliding-window rate
//! limiting, retrying page fetches, and sequential pagination.

pub mod client;
pub mod fetch;
pub mod rate_limit;
pub mod stream;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{CollectionValue, PageQuery};

// Re-export for convenience
pub use client::DiscogsClient;
pub use fetch::PageFetcher;
pub use rate_limit::RateLimiter;
pub use stream::{CollectionStream, CollectionTotals};

/// Capability needed from the remote catalog.
///
/// `get_page` returns the raw JSON payload; decoding happens in the
/// fetcher at record granularity so one malformed entry cannot poison a
/// whole page. Tests substitute scripted implementations.
#[async_trait]
pub trait CatalogApi: Send + Sync {
    /// Fetch one page of a user's collection.
    async fn get_page(&self, query: &PageQuery) -> Result<serde_json::Value>;

    /// Fetch the estimated monetary value of a user's collection.
    async fn get_value(&self, username: &str) -> Result<CollectionValue>;
}

// src/fetch/mod.rs
// =============================================================================
// Page fetching.
//
// Submodules:
// - http:       the reqwest-backed fetcher used in production
// - rate_limit: per-domain request spacing shared across workers
//
// The walker only depends on the PageFetcher trait, so tests can serve
// canned HTML without a network.
// =============================================================================

mod http;
mod rate_limit;

pub use http::HttpFetcher;
pub use rate_limit::{DomainRateLimiter, RATE_WINDOW};

use async_trait::async_trait;

use crate::error::FetchError;

/// A successfully fetched page.
#[derive(Debug, Clone)]
pub struct FetchedPage {
    /// URL that was requested
    pub url: String,
    /// URL after redirects
    pub final_url: String,
    pub status: u16,
    pub content: String,
    pub content_size: usize,
}

/// Anything that can turn a URL into page content.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<FetchedPage, FetchError>;
}

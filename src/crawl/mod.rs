// src/crawl/mod.rs
// =============================================================================
// This module handles crawling a single domain.
//
// Features:
// - Breadth-first crawling starting from https://{domain}/
// - Stays on the domain (internal links only)
// - Depth and page-count limits
// - Polite crawling with a delay between page visits
// - Collects the distinct external domains the pages link to
// =============================================================================

mod frontier;
mod walker;

pub use frontier::CrawlFrontier;
pub use walker::{CrawlResult, DomainWalker};

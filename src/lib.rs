//! Domain-level link crawler and ranking engine.
//!
//! Domains are crawled breadth-first; every distinct domain a crawl links to
//! gets one vote in a persistent rank store, and the highest ranked
//! unprocessed domains are crawled next.

pub mod cli;
pub mod config;
pub mod crawl;
pub mod error;
pub mod fetch;
pub mod links;
pub mod report;
pub mod scheduler;
pub mod store;

pub use config::CrawlerConfig;
pub use crawl::{CrawlResult, DomainWalker};
pub use error::{FetchError, StoreError};
pub use fetch::{HttpFetcher, PageFetcher};
pub use scheduler::Scheduler;
pub use store::{RankStore, SqliteRankStore};

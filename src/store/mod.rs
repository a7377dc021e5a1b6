// src/store/mod.rs
// =============================================================================
// The rank store: one durable record per domain ever seen.
//
// All rank changes go through increment_or_create / mark_processed (or
// apply_crawl_result, which runs both in one transaction). Nobody computes
// a rank in memory and writes it back.
// =============================================================================

mod sqlite;

pub use sqlite::SqliteRankStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::crawl::CrawlResult;
use crate::error::StoreError;

/// Initial rank of a domain supplied as a crawl seed
pub const SEED_RANK: i64 = 0;
/// Initial rank of a domain first seen as a link target (its first vote)
pub const DISCOVERED_RANK: i64 = 1;

/// One row of the rank table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct DomainRecord {
    pub domain: String,
    /// Number of distinct source domains seen linking here
    pub rank: i64,
    pub processed: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RankStats {
    pub total_domains: i64,
    pub processed_count: i64,
    pub pending_count: i64,
}

#[async_trait]
pub trait RankStore: Send + Sync {
    /// Adds one to the rank of `domain`, or inserts it unprocessed with
    /// `default_rank`. Returns the rank after the write.
    async fn increment_or_create(&self, domain: &str, default_rank: i64) -> Result<i64, StoreError>;

    /// Flags `domain` as crawled; creates it (rank 0) if it is unknown.
    async fn mark_processed(&self, domain: &str) -> Result<(), StoreError>;

    /// Marks the source processed and votes once for every external domain,
    /// all in a single transaction.
    async fn apply_crawl_result(&self, result: &CrawlResult) -> Result<(), StoreError>;

    /// Up to `limit` unprocessed domains, highest rank first, then by name.
    async fn next_unprocessed(&self, limit: usize) -> Result<Vec<String>, StoreError>;

    async fn get(&self, domain: &str) -> Result<Option<DomainRecord>, StoreError>;

    /// Highest ranked domains, processed or not.
    async fn top(&self, n: usize) -> Result<Vec<DomainRecord>, StoreError>;

    async fn stats(&self) -> Result<RankStats, StoreError>;

    /// Best guess at what is being crawled right now: the most recently
    /// touched unprocessed domain.
    async fn currently_processing(&self) -> Result<Option<DomainRecord>, StoreError>;

    /// Processed domains, most recently updated first.
    async fn recent_processed(&self, n: usize) -> Result<Vec<DomainRecord>, StoreError>;
}

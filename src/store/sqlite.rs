// src/store/sqlite.rs
// =============================================================================
// SQLite implementation of the rank store.
//
// One table, domain_ranks, keyed by the normalized domain. Every write is a
// single upsert statement (or a short transaction of them), so concurrent
// workers never lose an increment. Busy/locked errors are retried per
// operation.
// =============================================================================

use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use std::future::Future;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use super::{DomainRecord, RankStats, RankStore, DISCOVERED_RANK};
use crate::crawl::CrawlResult;
use crate::error::StoreError;

const MAX_WRITE_ATTEMPTS: u32 = 5;
const WRITE_RETRY_DELAY: Duration = Duration::from_millis(50);

const RECORD_COLUMNS: &str = "domain, rank, processed, created_at, updated_at";

pub struct SqliteRankStore {
    pool: SqlitePool,
}

impl SqliteRankStore {
    /// Opens (creating if needed) a file-backed store.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        let store = Self { pool };
        store.run_migrations().await?;
        Ok(store)
    }

    /// Ephemeral store for tests. A single connection keeps the database alive.
    pub async fn in_memory() -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        let store = Self { pool };
        store.run_migrations().await?;
        Ok(store)
    }

    async fn run_migrations(&self) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS domain_ranks (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                domain TEXT NOT NULL UNIQUE,
                rank INTEGER NOT NULL DEFAULT 0 CHECK (rank >= 0),
                processed BOOLEAN NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_domain_ranks_rank ON domain_ranks(rank);
            CREATE INDEX IF NOT EXISTS idx_domain_ranks_processed ON domain_ranks(processed);
            CREATE INDEX IF NOT EXISTS idx_domain_ranks_rank_processed
                ON domain_ranks(rank DESC, processed);
            "#,
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    // Runs one write, retrying it alone on busy/locked errors
    async fn with_retry<T, F, Fut>(&self, operation: &'static str, mut write: F) -> Result<T, StoreError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, sqlx::Error>>,
    {
        let mut attempt = 1;
        loop {
            match write().await.map_err(StoreError::from) {
                Err(e) if e.is_transient() && attempt < MAX_WRITE_ATTEMPTS => {
                    tracing::warn!(operation, attempt, error = %e, "store write conflict, retrying");
                    tokio::time::sleep(WRITE_RETRY_DELAY * attempt).await;
                    attempt += 1;
                }
                other => return other,
            }
        }
    }
}

fn require_domain(domain: &str) -> Result<(), StoreError> {
    if domain.trim().is_empty() {
        return Err(StoreError::InvalidDomain(domain.to_string()));
    }
    Ok(())
}

async fn increment_on(
    conn: &mut SqliteConnection,
    domain: &str,
    default_rank: i64,
) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar::<_, i64>(
        r#"
        INSERT INTO domain_ranks (domain, rank, processed, created_at, updated_at)
        VALUES (?1, ?2, 0, ?3, ?3)
        ON CONFLICT(domain) DO UPDATE SET
            rank = domain_ranks.rank + 1,
            updated_at = excluded.updated_at
        RETURNING rank
        "#,
    )
    .bind(domain)
    .bind(default_rank)
    .bind(Utc::now())
    .fetch_one(conn)
    .await
}

async fn mark_processed_on(conn: &mut SqliteConnection, domain: &str) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO domain_ranks (domain, rank, processed, created_at, updated_at)
        VALUES (?1, 0, 1, ?2, ?2)
        ON CONFLICT(domain) DO UPDATE SET
            processed = 1,
            updated_at = excluded.updated_at
        "#,
    )
    .bind(domain)
    .bind(Utc::now())
    .execute(conn)
    .await?;
    Ok(())
}

#[async_trait]
impl RankStore for SqliteRankStore {
    async fn increment_or_create(&self, domain: &str, default_rank: i64) -> Result<i64, StoreError> {
        require_domain(domain)?;
        let pool = &self.pool;
        self.with_retry("increment_or_create", move || async move {
            let mut conn = pool.acquire().await?;
            increment_on(&mut conn, domain, default_rank).await
        })
        .await
    }

    async fn mark_processed(&self, domain: &str) -> Result<(), StoreError> {
        require_domain(domain)?;
        let pool = &self.pool;
        self.with_retry("mark_processed", move || async move {
            let mut conn = pool.acquire().await?;
            mark_processed_on(&mut conn, domain).await
        })
        .await
    }

    async fn apply_crawl_result(&self, result: &CrawlResult) -> Result<(), StoreError> {
        let source = result.source_domain.as_str();
        require_domain(source)?;
        let pool = &self.pool;
        let external = &result.external_domains;

        self.with_retry("apply_crawl_result", move || async move {
            let mut tx = pool.begin().await?;
            mark_processed_on(&mut tx, source).await?;
            for domain in external.iter() {
                if domain.is_empty() || domain == source {
                    continue;
                }
                increment_on(&mut tx, domain, DISCOVERED_RANK).await?;
            }
            tx.commit().await
        })
        .await?;

        tracing::debug!(
            domain = source,
            votes = result.external_domains.len(),
            "crawl result applied"
        );
        Ok(())
    }

    async fn next_unprocessed(&self, limit: usize) -> Result<Vec<String>, StoreError> {
        let domains = sqlx::query_scalar::<_, String>(
            r#"
            SELECT domain FROM domain_ranks
            WHERE processed = 0
            ORDER BY rank DESC, domain ASC
            LIMIT ?1
            "#,
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;
        Ok(domains)
    }

    async fn get(&self, domain: &str) -> Result<Option<DomainRecord>, StoreError> {
        let record = sqlx::query_as::<_, DomainRecord>(&format!(
            "SELECT {} FROM domain_ranks WHERE domain = ?1",
            RECORD_COLUMNS
        ))
        .bind(domain)
        .fetch_optional(&self.pool)
        .await?;
        Ok(record)
    }

    async fn top(&self, n: usize) -> Result<Vec<DomainRecord>, StoreError> {
        let records = sqlx::query_as::<_, DomainRecord>(&format!(
            "SELECT {} FROM domain_ranks ORDER BY rank DESC, processed ASC, domain ASC LIMIT ?1",
            RECORD_COLUMNS
        ))
        .bind(n as i64)
        .fetch_all(&self.pool)
        .await?;
        Ok(records)
    }

    async fn stats(&self) -> Result<RankStats, StoreError> {
        let (total, processed): (i64, i64) = sqlx::query_as(
            "SELECT COUNT(*), COALESCE(SUM(processed), 0) FROM domain_ranks",
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(RankStats {
            total_domains: total,
            processed_count: processed,
            pending_count: total - processed,
        })
    }

    async fn currently_processing(&self) -> Result<Option<DomainRecord>, StoreError> {
        let record = sqlx::query_as::<_, DomainRecord>(&format!(
            "SELECT {} FROM domain_ranks WHERE processed = 0 \
             ORDER BY updated_at DESC, rank DESC LIMIT 1",
            RECORD_COLUMNS
        ))
        .fetch_optional(&self.pool)
        .await?;
        Ok(record)
    }

    async fn recent_processed(&self, n: usize) -> Result<Vec<DomainRecord>, StoreError> {
        let records = sqlx::query_as::<_, DomainRecord>(&format!(
            "SELECT {} FROM domain_ranks WHERE processed = 1 ORDER BY updated_at DESC LIMIT ?1",
            RECORD_COLUMNS
        ))
        .bind(n as i64)
        .fetch_all(&self.pool)
        .await?;
        Ok(records)
    }
}

// src/error.rs
// =============================================================================
// Typed errors for the crawler library.
//
// FetchError describes why a single page could not be fetched. The walker
// treats every variant the same way (the page contributes nothing), but the
// fetcher uses is_transient() to decide whether to retry, and the logs keep
// the variants apart.
//
// StoreError wraps the database driver. Transient busy/locked conditions are
// retried by the store itself, one operation at a time.
// =============================================================================

use thiserror::Error;

/// Why a page fetch failed.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The URL could not be parsed or is not http/https
    #[error("invalid URL: {url}")]
    InvalidUrl { url: String },

    /// The URL points at localhost or a private address range
    #[error("blocked host: {host}")]
    BlockedHost { host: String },

    /// The request did not complete within the configured timeout
    #[error("request timed out: {url}")]
    Timeout { url: String },

    /// The server answered with a non-success status code
    #[error("HTTP {status} for {url}")]
    Status { url: String, status: u16 },

    /// The body (announced or downloaded so far) exceeds the size cap
    #[error("content too large: {size} bytes (limit {limit})")]
    TooLarge { size: u64, limit: u64 },

    /// Redirect chain longer than the configured limit
    #[error("too many redirects: {url}")]
    TooManyRedirects { url: String },

    /// Connection reset, DNS failure, TLS failure and friends
    #[error("network error for {url}: {message}")]
    Network { url: String, message: String },
}

impl FetchError {
    /// Only timeouts and network failures are worth another attempt.
    pub fn is_transient(&self) -> bool {
        matches!(self, FetchError::Timeout { .. } | FetchError::Network { .. })
    }
}

/// Rank store failures.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("invalid domain: {0:?}")]
    InvalidDomain(String),
}

// SQLite result codes for BUSY, LOCKED and their extended forms.
const SQLITE_TRANSIENT_CODES: &[&str] = &["5", "6", "261", "262", "517"];

impl StoreError {
    /// True for write conflicts that clear up on their own.
    pub fn is_transient(&self) -> bool {
        match self {
            StoreError::Database(sqlx::Error::PoolTimedOut) => true,
            StoreError::Database(sqlx::Error::Database(db)) => db
                .code()
                .map(|code| SQLITE_TRANSIENT_CODES.contains(&&*code))
                .unwrap_or(false),
            _ => false,
        }
    }
}

// src/config.rs
// =============================================================================
// Runtime configuration for the crawler.
//
// The CLI builds a CrawlerConfig from its flags; tests build the pieces
// directly with the with_* helpers.
// =============================================================================

use serde::Serialize;
use std::time::Duration;

/// User-Agent sent with every request
pub const USER_AGENT: &str = "Mozilla/5.0 (compatible; domain-rank/0.1)";

/// HTTP fetch behaviour.
#[derive(Debug, Clone, Serialize)]
pub struct FetchConfig {
    pub timeout: Duration,
    /// Total attempts for transient failures (1 = no retry)
    pub max_retries: u32,
    pub retry_delay: Duration,
    pub max_content_size: u64,
    /// Minimum spacing between two requests to the same domain
    pub min_domain_spacing: Duration,
    pub max_redirects: usize,
    /// Refuse localhost and private address ranges
    pub block_private_hosts: bool,
    pub user_agent: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            max_retries: 3,
            retry_delay: Duration::from_secs(1),
            max_content_size: 10 * 1024 * 1024,
            min_domain_spacing: Duration::from_secs(1),
            max_redirects: 5,
            block_private_hosts: true,
            user_agent: USER_AGENT.to_string(),
        }
    }
}

impl FetchConfig {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries.max(1);
        self
    }

    pub fn with_retry_delay(mut self, retry_delay: Duration) -> Self {
        self.retry_delay = retry_delay;
        self
    }

    pub fn with_max_content_size(mut self, bytes: u64) -> Self {
        self.max_content_size = bytes;
        self
    }

    pub fn with_min_domain_spacing(mut self, spacing: Duration) -> Self {
        self.min_domain_spacing = spacing;
        self
    }

    pub fn allow_private_hosts(mut self) -> Self {
        self.block_private_hosts = false;
        self
    }
}

/// Limits for one domain crawl.
#[derive(Debug, Clone, Serialize)]
pub struct WalkConfig {
    /// Number of BFS levels, 1 = root page only
    pub max_depth: usize,
    pub max_pages: usize,
    /// Flat pause after every page visit
    pub page_delay: Duration,
}

impl Default for WalkConfig {
    fn default() -> Self {
        Self {
            max_depth: 3,
            max_pages: 20,
            page_delay: Duration::from_millis(100),
        }
    }
}

impl WalkConfig {
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn with_max_pages(mut self, max_pages: usize) -> Self {
        self.max_pages = max_pages;
        self
    }

    pub fn with_page_delay(mut self, page_delay: Duration) -> Self {
        self.page_delay = page_delay;
        self
    }
}

/// How batches are dispatched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    Parallel,
    Sequential,
}

#[derive(Debug, Clone, Serialize)]
pub struct SchedulerConfig {
    pub workers: usize,
    pub mode: RunMode,
    /// Sleep when there is nothing to crawl
    pub idle_backoff: Duration,
    /// Pause between two non-empty batches
    pub batch_pause: Duration,
    /// Size of the top-domains summary logged after each batch (0 = off)
    pub report_top: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            mode: RunMode::Parallel,
            idle_backoff: Duration::from_secs(5),
            batch_pause: Duration::from_millis(500),
            report_top: 10,
        }
    }
}

impl SchedulerConfig {
    /// Sequential mode always runs a single worker.
    pub fn sequential() -> Self {
        Self {
            workers: 1,
            mode: RunMode::Sequential,
            ..Self::default()
        }
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn with_idle_backoff(mut self, idle_backoff: Duration) -> Self {
        self.idle_backoff = idle_backoff;
        self
    }

    pub fn with_batch_pause(mut self, batch_pause: Duration) -> Self {
        self.batch_pause = batch_pause;
        self
    }

    pub fn with_report_top(mut self, report_top: usize) -> Self {
        self.report_top = report_top;
        self
    }

    /// Domains requested per FETCH_BATCH.
    pub fn batch_size(&self) -> usize {
        match self.mode {
            RunMode::Parallel => self.workers.max(1),
            RunMode::Sequential => 1,
        }
    }
}

/// Everything the `crawl` subcommand needs.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CrawlerConfig {
    pub fetch: FetchConfig,
    pub walk: WalkConfig,
    pub scheduler: SchedulerConfig,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = CrawlerConfig::default();
        assert_eq!(config.walk.max_depth, 3);
        assert_eq!(config.walk.page_delay, Duration::from_millis(100));
        assert_eq!(config.scheduler.workers, 4);
        assert_eq!(config.fetch.max_content_size, 10_485_760);
        assert!(config.fetch.block_private_hosts);
    }

    #[test]
    fn test_sequential_batch_size_is_one() {
        let config = SchedulerConfig::sequential().with_workers(8);
        assert_eq!(config.batch_size(), 1);
        assert_eq!(SchedulerConfig::default().with_workers(0).batch_size(), 1);
        assert_eq!(SchedulerConfig::default().batch_size(), 4);
    }
}

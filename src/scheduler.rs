// src/scheduler.rs
// =============================================================================
// The crawl loop.
//
// Each batch goes through the same four steps:
//
//   FETCH_BATCH   -> ask the store for up to N unprocessed domains
//   DISPATCH      -> one walker per domain (parallel) or one at a time
//   COLLECT       -> wait for every walker; a crashed one counts as "no links"
//   APPLY_RESULTS -> mark each source processed and vote for its links,
//                    one result at a time
//
// run() repeats batches until the shutdown token fires, sleeping for
// idle_backoff whenever there is nothing to crawl. A batch that has started
// always finishes before the loop checks the token again.
// =============================================================================

use futures::future::join_all;
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::config::{RunMode, SchedulerConfig};
use crate::crawl::{CrawlResult, DomainWalker};
use crate::error::StoreError;
use crate::fetch::PageFetcher;
use crate::links::normalize_domain;
use crate::store::{RankStore, SEED_RANK};

/// What a single batch did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchOutcome {
    /// Domains crawled and applied
    pub processed: usize,
    /// Total external-domain votes cast
    pub votes: usize,
    /// Results that could not be written to the store
    pub failed_applies: usize,
}

impl BatchOutcome {
    pub fn is_idle(&self) -> bool {
        self.processed == 0 && self.failed_applies == 0
    }
}

pub struct Scheduler<S, F> {
    store: Arc<S>,
    walker: Arc<DomainWalker<F>>,
    config: SchedulerConfig,
    // Held for a whole batch so two callers never get the same domains
    dispatch_lock: Mutex<()>,
}

impl<S, F> Scheduler<S, F>
where
    S: RankStore + 'static,
    F: PageFetcher + 'static,
{
    pub fn new(store: Arc<S>, walker: Arc<DomainWalker<F>>, config: SchedulerConfig) -> Self {
        Self {
            store,
            walker,
            config,
            dispatch_lock: Mutex::new(()),
        }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Adds a seed domain (rank 0, unprocessed) unless it is already known.
    ///
    /// Returns the normalized domain, or None if the input has no domain.
    pub async fn seed(&self, input: &str) -> Result<Option<String>, StoreError> {
        let domain = normalize_domain(input);
        if domain.is_empty() {
            tracing::warn!(input, "seed is not a valid domain, ignoring");
            return Ok(None);
        }

        if self.store.get(&domain).await?.is_none() {
            self.store.increment_or_create(&domain, SEED_RANK).await?;
            tracing::info!(domain = %domain, "added seed domain");
        } else {
            tracing::info!(domain = %domain, "seed domain already known");
        }
        Ok(Some(domain))
    }

    /// Runs one FETCH_BATCH -> DISPATCH -> COLLECT -> APPLY_RESULTS cycle.
    pub async fn run_batch(&self) -> Result<BatchOutcome, StoreError> {
        // Domains only leave the unprocessed set once their results are
        // applied, so the lock covers the whole cycle
        let _guard = self.dispatch_lock.lock().await;

        let domains = self.store.next_unprocessed(self.config.batch_size()).await?;
        if domains.is_empty() {
            return Ok(BatchOutcome::default());
        }
        tracing::info!(count = domains.len(), ?domains, "dispatching batch");

        let results = match self.config.mode {
            RunMode::Parallel => self.crawl_parallel(domains).await,
            RunMode::Sequential => self.crawl_sequential(domains).await,
        };

        Ok(self.apply_results(results).await)
    }

    // One tokio task per domain; the batch size bounds the in-flight crawls
    async fn crawl_parallel(&self, domains: Vec<String>) -> Vec<CrawlResult> {
        let handles: Vec<_> = domains
            .iter()
            .map(|domain| {
                let walker = self.walker.clone();
                let domain = domain.clone();
                tokio::spawn(async move { walker.walk(&domain).await })
            })
            .collect();

        join_all(handles)
            .await
            .into_iter()
            .zip(domains)
            .map(|(joined, domain)| match joined {
                Ok(result) => result,
                Err(e) => {
                    tracing::error!(domain = %domain, error = %e, "domain crawl failed");
                    CrawlResult::empty(&domain)
                }
            })
            .collect()
    }

    async fn crawl_sequential(&self, domains: Vec<String>) -> Vec<CrawlResult> {
        let mut results = Vec::with_capacity(domains.len());
        for domain in domains {
            let crawl = AssertUnwindSafe(self.walker.walk(&domain)).catch_unwind().await;
            results.push(match crawl {
                Ok(result) => result,
                Err(_) => {
                    tracing::error!(domain = %domain, "domain crawl panicked");
                    CrawlResult::empty(&domain)
                }
            });
        }
        results
    }

    // Results are applied one after another, each in its own transaction
    async fn apply_results(&self, results: Vec<CrawlResult>) -> BatchOutcome {
        let mut outcome = BatchOutcome::default();
        for result in results {
            match self.store.apply_crawl_result(&result).await {
                Ok(()) => {
                    outcome.processed += 1;
                    outcome.votes += result.external_domains.len();
                }
                Err(e) => {
                    outcome.failed_applies += 1;
                    tracing::error!(
                        domain = %result.source_domain,
                        error = %e,
                        "failed to apply crawl result"
                    );
                }
            }
        }

        tracing::info!(
            processed = outcome.processed,
            votes = outcome.votes,
            failed = outcome.failed_applies,
            "batch complete"
        );
        outcome
    }

    /// Runs batches until the shutdown token is cancelled.
    pub async fn run(&self, shutdown: CancellationToken) {
        tracing::info!(mode = ?self.config.mode, workers = self.config.batch_size(), "crawler started");
        let mut iteration: u64 = 0;

        while !shutdown.is_cancelled() {
            iteration += 1;
            tracing::debug!(iteration, "starting batch");

            let pause = match self.run_batch().await {
                Ok(outcome) => {
                    if outcome.processed > 0 {
                        self.log_summary().await;
                    }
                    self.pause_after(&outcome)
                }
                Err(e) => {
                    tracing::error!(error = %e, "batch failed");
                    self.config.idle_backoff
                }
            };

            if !sleep_or_shutdown(pause, &shutdown).await {
                break;
            }
        }

        tracing::info!(iterations = iteration, "crawler stopped");
    }

    // Batches that moved nothing (empty queue, or every write failed) back off
    fn pause_after(&self, outcome: &BatchOutcome) -> Duration {
        if outcome.processed > 0 {
            return self.config.batch_pause;
        }
        if outcome.is_idle() {
            tracing::info!(
                backoff_secs = self.config.idle_backoff.as_secs_f64(),
                "no domains to process, waiting"
            );
        } else {
            tracing::warn!(
                failed = outcome.failed_applies,
                backoff_secs = self.config.idle_backoff.as_secs_f64(),
                "no crawl result could be stored, backing off"
            );
        }
        self.config.idle_backoff
    }

    /// Runs batches until the store has no unprocessed domains left.
    ///
    /// Returns the number of domains processed.
    pub async fn run_until_idle(&self, shutdown: CancellationToken) -> Result<usize, StoreError> {
        let mut total = 0;
        while !shutdown.is_cancelled() {
            let outcome = self.run_batch().await?;
            // Stop when nothing moved, including batches whose writes all failed
            if outcome.processed == 0 {
                break;
            }
            total += outcome.processed;
            self.log_summary().await;
        }
        Ok(total)
    }

    async fn log_summary(&self) {
        if self.config.report_top == 0 {
            return;
        }
        match (self.store.top(self.config.report_top).await, self.store.stats().await) {
            (Ok(top), Ok(stats)) => {
                for (position, record) in top.iter().enumerate() {
                    tracing::info!(
                        position = position + 1,
                        domain = %record.domain,
                        rank = record.rank,
                        processed = record.processed,
                        "top domain"
                    );
                }
                tracing::info!(
                    total = stats.total_domains,
                    processed = stats.processed_count,
                    pending = stats.pending_count,
                    "rank store summary"
                );
            }
            (Err(e), _) | (_, Err(e)) => {
                tracing::warn!(error = %e, "could not load rank summary");
            }
        }
    }
}

// false if shutdown fired while waiting
async fn sleep_or_shutdown(duration: Duration, shutdown: &CancellationToken) -> bool {
    tokio::select! {
        _ = shutdown.cancelled() => false,
        _ = tokio::time::sleep(duration) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WalkConfig;
    use crate::fetch::testing::StaticSite;
    use crate::store::SqliteRankStore;

    fn walker(site: StaticSite) -> Arc<DomainWalker<StaticSite>> {
        let config = WalkConfig::default().with_page_delay(Duration::ZERO);
        Arc::new(DomainWalker::new(Arc::new(site), config))
    }

    async fn scheduler(
        site: StaticSite,
        config: SchedulerConfig,
    ) -> Scheduler<SqliteRankStore, StaticSite> {
        let store = Arc::new(SqliteRankStore::in_memory().await.unwrap());
        Scheduler::new(store, walker(site), config.with_report_top(0))
    }

    async fn record(
        scheduler: &Scheduler<SqliteRankStore, StaticSite>,
        domain: &str,
    ) -> crate::store::DomainRecord {
        scheduler.store().get(domain).await.unwrap().unwrap()
    }

    #[tokio::test]
    async fn test_end_to_end_single_cycle() {
        let site = StaticSite::new().page(
            "https://a.com/",
            r#"
                <a href="https://b.com/1">b</a>
                <a href="https://b.com/2">b</a>
                <a href="https://www.b.com/3">b</a>
                <a href="https://c.com/">c</a>
            "#,
        );
        let scheduler = scheduler(site, SchedulerConfig::sequential()).await;

        assert_eq!(scheduler.seed("https://www.a.com/").await.unwrap().as_deref(), Some("a.com"));
        let outcome = scheduler.run_batch().await.unwrap();
        assert_eq!(outcome.processed, 1);
        assert_eq!(outcome.votes, 2);

        assert!(record(&scheduler, "a.com").await.processed);
        let b = record(&scheduler, "b.com").await;
        let c = record(&scheduler, "c.com").await;
        assert_eq!((b.rank, b.processed), (1, false));
        assert_eq!((c.rank, c.processed), (1, false));
    }

    #[tokio::test]
    async fn test_seed_does_not_bump_known_domain() {
        let scheduler = scheduler(StaticSite::new(), SchedulerConfig::default()).await;
        scheduler.store().increment_or_create("a.com", 1).await.unwrap();

        scheduler.seed("a.com").await.unwrap();
        assert_eq!(record(&scheduler, "a.com").await.rank, 1);

        scheduler.seed("fresh.com").await.unwrap();
        assert_eq!(record(&scheduler, "fresh.com").await.rank, 0);

        assert_eq!(scheduler.seed("not a url").await.unwrap(), None);
        assert_eq!(scheduler.seed("mailto:x@example.com").await.unwrap(), None);
        assert!(scheduler.store().get("example.com").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_parallel_batch_counts_each_source_once() {
        let mut site = StaticSite::new();
        for source in ["s1.com", "s2.com", "s3.com", "s4.com"] {
            site = site.page(
                &format!("https://{}/", source),
                r#"<a href="https://x.com/a">x</a><a href="https://x.com/b">x</a>"#,
            );
        }
        let scheduler = scheduler(site, SchedulerConfig::default().with_workers(4)).await;
        for source in ["s1.com", "s2.com", "s3.com", "s4.com"] {
            scheduler.seed(source).await.unwrap();
        }

        let outcome = scheduler.run_batch().await.unwrap();
        assert_eq!(outcome.processed, 4);
        assert_eq!(record(&scheduler, "x.com").await.rank, 4);
    }

    #[tokio::test]
    async fn test_sequential_mode_takes_one_domain_per_batch() {
        let scheduler = scheduler(StaticSite::new(), SchedulerConfig::sequential()).await;
        scheduler.seed("a.com").await.unwrap();
        scheduler.seed("b.com").await.unwrap();

        assert_eq!(scheduler.run_batch().await.unwrap().processed, 1);
        assert_eq!(scheduler.run_batch().await.unwrap().processed, 1);
        assert!(scheduler.run_batch().await.unwrap().is_idle());
    }

    #[tokio::test]
    async fn test_unreachable_domain_is_still_processed() {
        let scheduler = scheduler(StaticSite::new(), SchedulerConfig::default()).await;
        scheduler.seed("down.com").await.unwrap();

        let outcome = scheduler.run_batch().await.unwrap();
        assert_eq!(outcome.processed, 1);
        assert_eq!(outcome.votes, 0);
        assert!(record(&scheduler, "down.com").await.processed);
    }

    #[tokio::test]
    async fn test_crashed_crawl_is_absorbed() {
        for config in [SchedulerConfig::default(), SchedulerConfig::sequential()] {
            let scheduler = scheduler(
                StaticSite::new()
                    .panic_on("https://bad.com/")
                    .page("https://good.com/", r#"<a href="https://z.com/">z</a>"#),
                config,
            )
            .await;
            scheduler.seed("bad.com").await.unwrap();
            scheduler.seed("good.com").await.unwrap();

            let processed = scheduler.run_until_idle(CancellationToken::new()).await.unwrap();
            assert_eq!(processed, 3);
            assert!(record(&scheduler, "bad.com").await.processed);
            assert_eq!(record(&scheduler, "z.com").await.rank, 1);
        }
    }

    #[tokio::test]
    async fn test_crawl_spreads_through_discovered_domains() {
        let site = StaticSite::new()
            .page("https://a.com/", r#"<a href="https://b.com/">b</a>"#)
            .page("https://b.com/", r#"<a href="https://c.com/">c</a><a href="https://a.com/">a</a>"#)
            .page("https://c.com/", r#"<a href="https://a.com/">a</a>"#);
        let scheduler = scheduler(site, SchedulerConfig::sequential()).await;
        scheduler.seed("a.com").await.unwrap();

        let processed = scheduler.run_until_idle(CancellationToken::new()).await.unwrap();
        assert_eq!(processed, 3);
        assert_eq!(record(&scheduler, "a.com").await.rank, 2);
        assert_eq!(record(&scheduler, "b.com").await.rank, 1);
        assert_eq!(record(&scheduler, "c.com").await.rank, 1);

        let stats = scheduler.store().stats().await.unwrap();
        assert_eq!(stats.pending_count, 0);
    }

    #[tokio::test]
    async fn test_failed_writes_back_off_like_an_empty_queue() {
        let config = SchedulerConfig::default()
            .with_idle_backoff(Duration::from_secs(30))
            .with_batch_pause(Duration::from_millis(200));
        let scheduler = scheduler(StaticSite::new(), config).await;

        let all_failed = BatchOutcome {
            processed: 0,
            votes: 0,
            failed_applies: 4,
        };
        let progress = BatchOutcome {
            processed: 3,
            votes: 5,
            failed_applies: 1,
        };

        assert_eq!(scheduler.pause_after(&all_failed), Duration::from_secs(30));
        assert_eq!(scheduler.pause_after(&BatchOutcome::default()), Duration::from_secs(30));
        assert_eq!(scheduler.pause_after(&progress), Duration::from_millis(200));
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown() {
        let config = SchedulerConfig::default().with_idle_backoff(Duration::from_secs(3600));
        let scheduler = Arc::new(scheduler(StaticSite::new(), config).await);
        let shutdown = CancellationToken::new();

        let handle = {
            let scheduler = scheduler.clone();
            let shutdown = shutdown.clone();
            tokio::spawn(async move { scheduler.run(shutdown).await })
        };

        tokio::time::sleep(Duration::from_millis(50)).await;
        shutdown.cancel();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("scheduler did not stop")
            .unwrap();
    }
}

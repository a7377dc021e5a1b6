// src/fetch/rate_limit.rs
// =============================================================================
// Per-domain request spacing shared by every worker in the process.
//
// For each domain we keep the timestamps of the requests made in the last
// 60 seconds. Before a request, the caller reserves the next free slot:
// max(now, latest + min_spacing). The reservation is written while the map
// entry is locked, so two workers hitting the same domain at the same time
// get consecutive slots instead of both reading the same "latest".
//
// The caller then sleeps (outside the lock) until its slot.
//
// Once per window the whole map is swept, and domains with no request in
// the last 60 seconds are dropped, so a long crawl does not keep one entry
// for every domain it ever visited.
// =============================================================================

use dashmap::DashMap;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tokio::time::Instant;

/// How far back request timestamps are kept
pub const RATE_WINDOW: Duration = Duration::from_secs(60);

#[derive(Debug)]
pub struct DomainRateLimiter {
    min_spacing: Duration,
    requests: DashMap<String, Vec<Instant>>,
    last_sweep: Mutex<Instant>,
}

impl DomainRateLimiter {
    pub fn new(min_spacing: Duration) -> Self {
        Self {
            min_spacing,
            requests: DashMap::new(),
            last_sweep: Mutex::new(Instant::now()),
        }
    }

    /// Waits until a request to `domain` is allowed, then records it.
    pub async fn acquire(&self, domain: &str) {
        let slot = self.reserve(domain, Instant::now());
        if slot > Instant::now() {
            tracing::debug!(
                domain,
                wait_ms = (slot - Instant::now()).as_millis() as u64,
                "rate limiting"
            );
            tokio::time::sleep_until(slot).await;
        }
    }

    /// Prunes the domain's window and books the next slot at or after `now`.
    fn reserve(&self, domain: &str, now: Instant) -> Instant {
        // Must run before the entry below is held: retain locks every shard
        self.sweep(now);

        let mut entry = self.requests.entry(domain.to_string()).or_default();
        entry.retain(|at| now.saturating_duration_since(*at) < RATE_WINDOW);

        let slot = match entry.iter().max() {
            Some(latest) => (*latest + self.min_spacing).max(now),
            None => now,
        };
        entry.push(slot);
        slot
    }

    // Drops every domain whose requests are all older than the window
    fn sweep(&self, now: Instant) {
        {
            let mut last = self.last_sweep.lock().unwrap_or_else(PoisonError::into_inner);
            if now.saturating_duration_since(*last) < RATE_WINDOW {
                return;
            }
            *last = now;
        }

        self.requests.retain(|_, times| {
            times.retain(|at| now.saturating_duration_since(*at) < RATE_WINDOW);
            !times.is_empty()
        });
        tracing::debug!(domains = self.requests.len(), "rate limiter swept");
    }

    /// Number of domains with requests in the current window.
    pub fn tracked_domains(&self) -> usize {
        self.requests.len()
    }

    /// Requests recorded for `domain` in the current window.
    pub fn recent_requests(&self, domain: &str) -> usize {
        self.requests.get(domain).map(|e| e.len()).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn test_first_request_is_immediate() {
        let limiter = DomainRateLimiter::new(Duration::from_secs(1));
        let start = Instant::now();
        limiter.acquire("example.com").await;
        assert_eq!(Instant::now() - start, Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_request_waits_for_spacing() {
        let limiter = DomainRateLimiter::new(Duration::from_secs(1));
        let start = Instant::now();
        limiter.acquire("example.com").await;
        limiter.acquire("example.com").await;
        assert!(Instant::now() - start >= Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_domains_are_independent() {
        let limiter = DomainRateLimiter::new(Duration::from_secs(1));
        let start = Instant::now();
        limiter.acquire("a.com").await;
        limiter.acquire("b.com").await;
        assert_eq!(Instant::now() - start, Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_callers_get_distinct_slots() {
        let limiter = Arc::new(DomainRateLimiter::new(Duration::from_secs(1)));
        let start = Instant::now();

        let handles: Vec<_> = (0..3)
            .map(|_| {
                let limiter = limiter.clone();
                tokio::spawn(async move { limiter.acquire("example.com").await })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap();
        }

        // Three requests need two full spacings
        assert!(Instant::now() - start >= Duration::from_secs(2));
        assert_eq!(limiter.recent_requests("example.com"), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_old_requests_are_pruned() {
        let limiter = DomainRateLimiter::new(Duration::from_secs(1));
        limiter.acquire("example.com").await;
        tokio::time::advance(RATE_WINDOW + Duration::from_secs(1)).await;
        limiter.acquire("example.com").await;
        assert_eq!(limiter.recent_requests("example.com"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_domains_are_forgotten() {
        let limiter = DomainRateLimiter::new(Duration::from_secs(1));
        for i in 0..500 {
            limiter.acquire(&format!("site{}.com", i)).await;
        }
        assert_eq!(limiter.tracked_domains(), 500);

        tokio::time::advance(RATE_WINDOW * 2).await;
        limiter.acquire("fresh.com").await;

        assert_eq!(limiter.tracked_domains(), 1);
        assert_eq!(limiter.recent_requests("site0.com"), 0);
        assert_eq!(limiter.recent_requests("fresh.com"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweep_keeps_active_domains() {
        let limiter = DomainRateLimiter::new(Duration::from_secs(1));
        limiter.acquire("old.com").await;
        tokio::time::advance(RATE_WINDOW - Duration::from_secs(5)).await;
        limiter.acquire("recent.com").await;
        tokio::time::advance(Duration::from_secs(10)).await;
        limiter.acquire("new.com").await;

        assert_eq!(limiter.recent_requests("old.com"), 0);
        assert_eq!(limiter.recent_requests("recent.com"), 1);
        assert_eq!(limiter.tracked_domains(), 2);
    }
}

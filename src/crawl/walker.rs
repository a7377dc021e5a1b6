// src/crawl/walker.rs
// =============================================================================
// This module crawls one domain breadth-first and collects the other
// domains it links to.
//
// How it works:
// 1. Start with https://{domain}/ in the frontier
// 2. For each depth level (up to max_depth), take every queued URL
// 3. Fetch each page, classify its links
// 4. External links -> their domain goes into a set (one vote per crawl,
//    no matter how many pages or anchors mention it)
// 5. Internal links -> queued for the next level, if there is one
// 6. Stop when the levels run out, the frontier is empty or max_pages
//    pages have been visited
//
// Failed pages are skipped. Retrying is the fetcher's job, not ours, so a
// crawl always finishes in bounded time.
// =============================================================================

use std::collections::BTreeSet;
use std::sync::Arc;

use super::frontier::CrawlFrontier;
use crate::config::WalkConfig;
use crate::fetch::PageFetcher;
use crate::links::{classify_links, normalize_domain, root_url};

/// Outcome of crawling one domain.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CrawlResult {
    pub source_domain: String,
    /// Distinct domains linked from any visited page, never the source itself
    pub external_domains: BTreeSet<String>,
    pub pages_crawled: usize,
    pub pages_failed: usize,
}

impl CrawlResult {
    /// A result with no outbound domains, used when a crawl fails outright.
    pub fn empty(source_domain: &str) -> Self {
        Self {
            source_domain: source_domain.to_string(),
            ..Self::default()
        }
    }
}

pub struct DomainWalker<F> {
    fetcher: Arc<F>,
    config: WalkConfig,
}

impl<F: PageFetcher> DomainWalker<F> {
    pub fn new(fetcher: Arc<F>, config: WalkConfig) -> Self {
        Self { fetcher, config }
    }

    /// Crawls `domain` and returns the distinct external domains found.
    ///
    /// Never fails: an unreachable domain simply yields an empty set.
    pub async fn walk(&self, domain: &str) -> CrawlResult {
        let mut result = CrawlResult::empty(domain);
        let self_domain = normalize_domain(domain);

        let Some(root) = root_url(&self_domain) else {
            tracing::warn!(domain, "cannot build a root URL, skipping crawl");
            return result;
        };

        tracing::info!(domain, "starting domain crawl");

        let max_depth = self.config.max_depth;
        let max_pages = self.config.max_pages;
        let mut frontier = CrawlFrontier::new(root.to_string());

        for depth in 0..max_depth {
            if frontier.is_empty() || result.pages_crawled >= max_pages {
                break;
            }

            let level = frontier.take_level();
            let follow_internal = depth + 1 < max_depth;
            tracing::info!(
                domain,
                depth = depth + 1,
                max_depth,
                urls = level.len(),
                "crawling level"
            );

            for url in level {
                if result.pages_crawled >= max_pages {
                    break;
                }
                if !frontier.mark_visited(&url) {
                    continue;
                }
                result.pages_crawled += 1;

                match self.fetcher.fetch(&url).await {
                    Ok(page) => {
                        let links = classify_links(&page.content, &page.url);

                        let mut new_domains = 0;
                        for link in &links.external {
                            let linked = normalize_domain(link);
                            if !linked.is_empty()
                                && linked != self_domain
                                && result.external_domains.insert(linked)
                            {
                                new_domains += 1;
                            }
                        }

                        let mut queued = 0;
                        if follow_internal {
                            for link in links.internal {
                                if frontier.push(link) {
                                    queued += 1;
                                }
                            }
                        }

                        tracing::debug!(
                            url = %url,
                            new_domains,
                            queued,
                            anchors = links.stats.total(),
                            social = links.stats.social,
                            "page crawled"
                        );
                    }
                    Err(e) => {
                        result.pages_failed += 1;
                        tracing::warn!(url = %url, error = %e, "failed to fetch page");
                    }
                }

                // Polite crawling: flat pause after every page
                if !self.config.page_delay.is_zero() {
                    tokio::time::sleep(self.config.page_delay).await;
                }
            }
        }

        tracing::info!(
            domain,
            pages = result.pages_crawled,
            failed = result.pages_failed,
            visited = frontier.visited_count(),
            external_domains = result.external_domains.len(),
            "domain crawl complete"
        );

        result
    }
}

// src/crawl/frontier.rs
// =============================================================================
// Per-crawl bookkeeping of which URLs are queued and which were fetched.
//
// The frontier is consumed one BFS level at a time: take_level() hands out
// everything queued so far, and links found while visiting that level are
// queued for the next one. A URL is "queued" from the moment it is pushed
// until it is visited, so it is never queued twice and never queued after
// being visited.
// =============================================================================

use std::collections::{HashSet, VecDeque};

#[derive(Debug, Default)]
pub struct CrawlFrontier {
    to_visit: VecDeque<String>,
    queued: HashSet<String>,
    visited: HashSet<String>,
}

impl CrawlFrontier {
    pub fn new(root: String) -> Self {
        let mut frontier = Self::default();
        frontier.push(root);
        frontier
    }

    /// Queues `url` unless it was already visited or queued.
    pub fn push(&mut self, url: String) -> bool {
        if self.visited.contains(&url) || self.queued.contains(&url) {
            return false;
        }
        self.queued.insert(url.clone());
        self.to_visit.push_back(url);
        true
    }

    /// Removes and returns the URLs of the current level, in queue order.
    pub fn take_level(&mut self) -> Vec<String> {
        self.to_visit.drain(..).collect()
    }

    /// Marks `url` as fetched. Returns false if it already was.
    pub fn mark_visited(&mut self, url: &str) -> bool {
        self.queued.remove(url);
        self.visited.insert(url.to_string())
    }

    pub fn is_visited(&self, url: &str) -> bool {
        self.visited.contains(url)
    }

    pub fn is_empty(&self) -> bool {
        self.to_visit.is_empty()
    }

    pub fn visited_count(&self) -> usize {
        self.visited.len()
    }
}

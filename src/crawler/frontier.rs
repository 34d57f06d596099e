//! Crawl frontier
//!
//! This module handles:
//! - FIFO ordering of pending (url, depth) items
//! - Dedup across everything ever enqueued and everything visited
//! - Normalizing every candidate before it is admitted

use crate::url::UrlFilter;
use std::collections::{HashSet, VecDeque};

/// A URL waiting to be fetched, with its link distance from the seeds
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueItem {
    /// Normalized URL, the dedup key
    pub url: String,

    /// Number of link hops from a seed (seeds are depth 0)
    pub depth: u32,
}

/// FIFO work queue with enqueue- and visit-time dedup
///
/// A normalized URL enters the pending queue at most once for the lifetime of
/// the frontier. Rejections are silent; callers never see an error.
pub struct Frontier {
    filter: UrlFilter,
    pending: VecDeque<QueueItem>,
    enqueued: HashSet<String>,
    visited: HashSet<String>,
}

impl Frontier {
    /// Creates an empty frontier that normalizes through `filter`
    pub fn new(filter: UrlFilter) -> Self {
        Self {
            filter,
            pending: VecDeque::new(),
            enqueued: HashSet::new(),
            visited: HashSet::new(),
        }
    }

    /// Adds a URL at the given depth
    ///
    /// # Returns
    ///
    /// `true` if the URL was admitted, `false` if it failed normalization or
    /// was already enqueued or visited
    pub fn enqueue(&mut self, url: &str, depth: u32) -> bool {
        let Some(key) = self.filter.accept(url) else {
            return false;
        };

        if self.enqueued.contains(&key) || self.visited.contains(&key) {
            return false;
        }

        self.enqueued.insert(key.clone());
        self.pending.push_back(QueueItem { url: key, depth });
        true
    }

    /// Removes the oldest pending item and marks it visited
    pub fn dequeue(&mut self) -> Option<QueueItem> {
        let item = self.pending.pop_front()?;
        self.visited.insert(item.url.clone());
        Some(item)
    }

    pub fn has_next(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Number of pending items
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Checks whether a URL (after normalization) has been dequeued
    pub fn has_visited(&self, url: &str) -> bool {
        match self.filter.accept(url) {
            Some(key) => self.visited.contains(&key),
            None => false,
        }
    }

    /// The filter used to normalize candidates
    pub fn filter(&self) -> &UrlFilter {
        &self.filter
    }
}

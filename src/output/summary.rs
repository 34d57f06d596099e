//! Run summary of a single crawl

use crate::state::DropReason;
use std::collections::HashMap;
use std::time::Duration;

/// What one crawl run did
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunSummary {
    /// Items taken off the frontier
    pub dequeued: u64,

    /// Records newly written to the corpus
    pub stored: u64,

    /// Items dropped, by reason
    pub dropped: HashMap<DropReason, u64>,

    /// Render invocations used from the budget
    pub renders_used: u32,

    /// Screenshot invocations used from the budget
    pub screenshots_used: u32,

    /// Items abandoned on an internal error
    pub errors: u64,

    /// Links admitted to the frontier
    pub links_enqueued: u64,

    /// Wall-clock duration of the run
    pub elapsed: Duration,
}

impl RunSummary {
    pub fn record_drop(&mut self, reason: DropReason) {
        *self.dropped.entry(reason).or_insert(0) += 1;
    }

    pub fn record_error(&mut self) {
        self.errors += 1;
    }

    /// Drops for one reason
    pub fn drops(&self, reason: DropReason) -> u64 {
        self.dropped.get(&reason).copied().unwrap_or(0)
    }

    pub fn total_dropped(&self) -> u64 {
        self.dropped.values().sum()
    }

    /// Logs the summary at info level
    pub fn log(&self) {
        tracing::info!(
            "Crawl finished: {} stored, {} dropped of {} dequeued in {:.1}s",
            self.stored,
            self.total_dropped(),
            self.dequeued,
            self.elapsed.as_secs_f64()
        );
        tracing::info!(
            "Escalation used: {} renders, {} screenshots; {} links enqueued",
            self.renders_used,
            self.screenshots_used,
            self.links_enqueued
        );
        if self.errors > 0 {
            tracing::warn!("{} items abandoned on errors", self.errors);
        }
        for reason in DropReason::all() {
            let count = self.drops(reason);
            if count > 0 {
                tracing::info!("  dropped ({}): {}", reason, count);
            }
        }
    }
}

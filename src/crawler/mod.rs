//! Crawler module for page fetching and processing
//!
//! This module contains the core crawling logic, including:
//! - HTTP fetching with identity rotation and retry logic
//! - The FIFO frontier with visited tracking
//! - HTML content and link extraction
//! - The classifier that decides when a page needs rendering
//! - Overall crawl coordination

mod classifier;
mod coordinator;
pub(crate) mod extractor;
mod fetcher;
mod frontier;

pub use classifier::needs_dynamic_rendering;
pub use coordinator::{
    politeness_delay, run_crawl, Coordinator, MIN_PDF_TEXT_CHARS, MIN_TEXT_CHARS,
};
pub use extractor::{collapse_whitespace, extract, ExtractedContent};
pub use fetcher::{
    backoff_delay, build_http_client, identity_pool, pick_identity, ContentKind, FetchError,
    FetchedBody, FetchedResource, Fetcher, Identity, RetryPolicy, Sleeper, TokioSleeper,
};
pub use frontier::{Frontier, QueueItem};

pub use crate::output::RunSummary;

//! Storage module for persisting the crawl corpus
//!
//! This module handles everything that outlives a crawl run:
//! - The append-only JSONL corpus with its in-memory dedup index
//! - The page record format written to it
//! - Best-effort publishing of records and chunks to a remote document store

mod corpus;
mod remote;
mod traits;

pub use corpus::CorpusStore;
pub use remote::{chunk_key, RestPublisher};
pub use traits::{ChunkSink, DocumentPublisher, PublishError, StorageError, StorageResult};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Where the text of a record came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PageSource {
    /// Static HTML from the plain fetch
    Fetch,
    /// HTML produced by the render capability
    #[serde(alias = "puppeteer")]
    Rendered,
    /// Text recovered from a PDF or image document
    Crawl,
}

impl PageSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fetch => "fetch",
            Self::Rendered => "rendered",
            Self::Crawl => "crawl",
        }
    }
}

impl fmt::Display for PageSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A persisted corpus entry, one JSON object per line
///
/// Records are immutable once created; the store never updates an existing URL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageRecord {
    /// Normalized (possibly canonical) URL, the dedup key
    pub url: String,
    pub title: String,
    pub text: String,
    /// Raw markup the text was extracted from, when the source was HTML
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub html: Option<String>,
    pub discovered_at: DateTime<Utc>,
    pub source: PageSource,
}

impl PageRecord {
    /// Builds a record stamped with the current time
    ///
    /// An empty title falls back to the URL.
    pub fn new(
        url: impl Into<String>,
        title: impl Into<String>,
        text: impl Into<String>,
        html: Option<String>,
        source: PageSource,
    ) -> Self {
        let url = url.into();
        let title = title.into();
        let title = if title.trim().is_empty() {
            url.clone()
        } else {
            title
        };

        Self {
            url,
            title,
            text: text.into(),
            html: html.filter(|h| !h.is_empty()),
            discovered_at: Utc::now(),
            source,
        }
    }
}

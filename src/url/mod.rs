//! URL handling module for Site-Corpus
//!
//! This module provides URL normalization and allow-list filtering. The same
//! normalized string is the dedup key for the frontier and the corpus store.

mod domain;
mod normalize;

use crate::UrlError;

// Re-export main functions
pub use domain::{extract_domain, host_matches_suffix};
pub use normalize::{normalize_url, EXCLUDED_EXTENSIONS};

/// Allow-list filter bound to the configured domain suffixes
#[derive(Debug, Clone)]
pub struct UrlFilter {
    allowed_domains: Vec<String>,
}

impl UrlFilter {
    /// Creates a filter for the given allowed domain suffixes
    pub fn new(allowed_domains: Vec<String>) -> Self {
        let allowed_domains = allowed_domains
            .into_iter()
            .map(|d| d.trim().trim_start_matches('.').to_ascii_lowercase())
            .filter(|d| !d.is_empty())
            .collect();
        Self { allowed_domains }
    }

    /// Normalizes a URL into its canonical key, or rejects it
    pub fn normalize(&self, url: &str) -> Result<String, UrlError> {
        normalize_url(url, &self.allowed_domains).map(String::from)
    }

    /// Normalizes a URL, discarding the rejection reason
    pub fn accept(&self, url: &str) -> Option<String> {
        match self.normalize(url) {
            Ok(normalized) => Some(normalized),
            Err(e) => {
                tracing::trace!("Filtered {}: {}", url, e);
                None
            }
        }
    }

    /// Returns the configured domain suffixes
    pub fn allowed_domains(&self) -> &[String] {
        &self.allowed_domains
    }
}

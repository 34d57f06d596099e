//! Retrieval chunking of corpus pages
//!
//! Pages are split into reading-order blocks, then grouped into chunks of
//! roughly 900-1600 characters labeled with the section they belong to.
//! An external segmentation service (typically a language model) may propose
//! the grouping; its output is cleaned and clamped before use. Without a
//! service, or when it fails or proposes nothing, a deterministic segmenter
//! groups paragraphs under the most recent heading.

mod blocks;
mod service;

pub use blocks::{cap_blocks, html_to_blocks, text_to_blocks, Block};
pub use service::HttpChunkingService;

use crate::config::ChunkingConfig;
use crate::crawler::collapse_whitespace;
use crate::storage::PageRecord;
use crate::ConfigError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Preferred lower bound of chunk length
pub const TARGET_MIN_CHARS: usize = 900;
/// Deterministic segmentation flushes before exceeding this
pub const TARGET_MAX_CHARS: usize = 1600;
/// Hard ceiling on any chunk's content
pub const ABS_MAX_CHARS: usize = 2200;
/// Chunks shorter than this are merged or dropped
pub const SHORT_CHUNK_CHARS: usize = 300;
/// Total block text offered to a segmentation service
pub const SERVICE_INPUT_CAP: usize = 45_000;

/// The page fields chunking needs
#[derive(Debug, Clone)]
pub struct RawPage {
    pub url: String,
    pub title: String,
    pub html: Option<String>,
    pub text: Option<String>,
}

impl From<&PageRecord> for RawPage {
    fn from(record: &PageRecord) -> Self {
        Self {
            url: record.url.clone(),
            title: record.title.clone(),
            html: record.html.clone(),
            text: Some(record.text.clone()),
        }
    }
}

/// A retrieval chunk
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Chunk {
    pub url: String,
    pub title: String,
    pub section: String,
    pub anchor: Option<String>,
    pub content: String,
}

/// A chunk as proposed by a segmentation service, before cleanup
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProposedChunk {
    #[serde(default)]
    pub section: Option<String>,
    #[serde(default)]
    pub anchor: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
}

#[derive(Debug, Error)]
pub enum ChunkError {
    #[error("Segmentation service failed: {0}")]
    Service(String),

    #[error("Unparseable segmentation response")]
    InvalidResponse,
}

/// External segmenter of page blocks
#[async_trait]
pub trait ChunkingService: Send + Sync {
    /// Proposes chunks for the given blocks of `page`
    async fn segment(&self, page: &RawPage, blocks: &[Block])
        -> Result<Vec<ProposedChunk>, ChunkError>;
}

#[derive(Deserialize)]
struct ProposedChunks {
    chunks: Vec<ProposedChunk>,
}

/// Parses a `{"chunks": [...]}` response, tolerating text around the JSON object
pub fn parse_service_response(raw: &str) -> Result<Vec<ProposedChunk>, ChunkError> {
    if let Ok(parsed) = serde_json::from_str::<ProposedChunks>(raw) {
        return Ok(parsed.chunks);
    }

    let (Some(start), Some(end)) = (raw.find('{'), raw.rfind('}')) else {
        return Err(ChunkError::InvalidResponse);
    };
    if end <= start {
        return Err(ChunkError::InvalidResponse);
    }

    serde_json::from_str::<ProposedChunks>(&raw[start..=end])
        .map(|parsed| parsed.chunks)
        .map_err(|_| ChunkError::InvalidResponse)
}

fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Cleans service output into chunks
///
/// Entries without content are dropped, content is whitespace-collapsed and
/// clamped, a missing section defaults to the page title, and short chunks
/// are folded into the previous chunk when their sections overlap.
pub fn post_process(page: &RawPage, proposed: Vec<ProposedChunk>) -> Vec<Chunk> {
    let mut merged: Vec<Chunk> = Vec::new();

    for candidate in proposed {
        let content = truncate_chars(
            &collapse_whitespace(candidate.content.as_deref().unwrap_or("")),
            ABS_MAX_CHARS,
        );
        if content.is_empty() {
            continue;
        }

        let section = candidate
            .section
            .as_deref()
            .map(collapse_whitespace)
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| page.title.clone());
        let anchor = candidate
            .anchor
            .as_deref()
            .map(collapse_whitespace)
            .filter(|a| !a.is_empty());

        if let Some(previous) = merged.last_mut() {
            let related = previous.section == section
                || previous.section.contains(&section)
                || section.contains(&previous.section);
            if char_len(&content) < SHORT_CHUNK_CHARS && related {
                let joined = format!("{} {}", previous.content, content);
                previous.content = truncate_chars(&joined, ABS_MAX_CHARS);
                continue;
            }
        }

        merged.push(Chunk {
            url: page.url.clone(),
            title: page.title.clone(),
            section,
            anchor,
            content,
        });
    }

    merged
}

/// Groups paragraphs under the latest heading
///
/// A chunk is flushed at each heading and whenever the next paragraph would
/// push it past [`TARGET_MAX_CHARS`]. Chunks under [`SHORT_CHUNK_CHARS`] are
/// dropped.
pub fn chunk_deterministic(page: &RawPage, blocks: &[Block]) -> Vec<Chunk> {
    let mut chunks = Vec::new();
    let mut section = page.title.clone();
    let mut anchor: Option<String> = None;
    let mut buffer = String::new();

    let mut flush = |buffer: &mut String, section: &str, anchor: &Option<String>| {
        let content = collapse_whitespace(buffer);
        if char_len(&content) >= SHORT_CHUNK_CHARS {
            chunks.push(Chunk {
                url: page.url.clone(),
                title: page.title.clone(),
                section: section.to_string(),
                anchor: anchor.clone(),
                content,
            });
        }
        buffer.clear();
    };

    for block in blocks {
        match block {
            Block::Heading { text, anchor: id } => {
                if !buffer.is_empty() {
                    flush(&mut buffer, &section, &anchor);
                }
                section = text.clone();
                anchor = id.clone();
            }
            Block::Paragraph { text } => {
                let projected = if buffer.is_empty() {
                    char_len(text)
                } else {
                    char_len(&buffer) + 1 + char_len(text)
                };

                if projected > TARGET_MAX_CHARS {
                    flush(&mut buffer, &section, &anchor);
                    buffer.push_str(text);
                } else {
                    if !buffer.is_empty() {
                        buffer.push(' ');
                    }
                    buffer.push_str(text);
                }
            }
        }
    }

    if !buffer.is_empty() {
        flush(&mut buffer, &section, &anchor);
    }

    chunks
}

/// Chunks pages with an optional segmentation service
#[derive(Default)]
pub struct Chunker {
    service: Option<Box<dyn ChunkingService>>,
}

impl Chunker {
    /// Deterministic chunking only
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_service(service: Box<dyn ChunkingService>) -> Self {
        Self {
            service: Some(service),
        }
    }

    /// Builds a chunker backed by the configured segmentation service, if any
    ///
    /// A configured token variable that is unset or empty is an error.
    pub fn from_config(config: &ChunkingConfig) -> Result<Self, ConfigError> {
        let Some(service_url) = &config.service_url else {
            return Ok(Self::new());
        };
        let endpoint = Url::parse(service_url)
            .map_err(|e| ConfigError::InvalidUrl(format!("chunking service-url: {}", e)))?;

        let token = match &config.service_key_env {
            Some(var) => Some(
                std::env::var(var)
                    .ok()
                    .filter(|k| !k.is_empty())
                    .ok_or_else(|| ConfigError::MissingEnv(var.clone()))?,
            ),
            None => None,
        };

        let timeout = Duration::from_secs(config.timeout_secs);
        let service = HttpChunkingService::new(endpoint, token, timeout)
            .map_err(|e| ConfigError::Validation(format!("chunking service client: {}", e)))?;
        tracing::info!("Chunking with segmentation service at {}", service_url);

        Ok(Self::with_service(Box::new(service)))
    }

    /// Splits one page into chunks
    pub async fn chunk_page(&self, page: &RawPage) -> Vec<Chunk> {
        let blocks = match (&page.html, &page.text) {
            (Some(html), _) => html_to_blocks(html),
            (None, Some(text)) => text_to_blocks(text),
            (None, None) => Vec::new(),
        };

        if let Some(service) = &self.service {
            let offered = cap_blocks(&blocks, SERVICE_INPUT_CAP);
            match service.segment(page, offered).await {
                Ok(proposed) => {
                    let chunks = post_process(page, proposed);
                    if !chunks.is_empty() {
                        return chunks;
                    }
                    tracing::debug!("Service proposed no usable chunks for {}", page.url);
                }
                Err(e) => tracing::debug!("Falling back to deterministic chunking for {}: {}", page.url, e),
            }
        }

        chunk_deterministic(page, &blocks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page() -> RawPage {
        RawPage {
            url: "https://example.edu/fees".to_string(),
            title: "Fees".to_string(),
            html: None,
            text: None,
        }
    }

    fn para(len: usize) -> Block {
        Block::Paragraph {
            text: "x".repeat(len),
        }
    }

    fn heading(text: &str) -> Block {
        Block::Heading {
            text: text.to_string(),
            anchor: Some(text.to_lowercase()),
        }
    }

    fn proposed(section: Option<&str>, content: &str) -> ProposedChunk {
        ProposedChunk {
            section: section.map(String::from),
            anchor: None,
            content: Some(content.to_string()),
        }
    }

    struct ScriptedService {
        response: Result<Vec<ProposedChunk>, ()>,
    }

    #[async_trait]
    impl ChunkingService for ScriptedService {
        async fn segment(
            &self,
            _page: &RawPage,
            _blocks: &[Block],
        ) -> Result<Vec<ProposedChunk>, ChunkError> {
            self.response
                .clone()
                .map_err(|_| ChunkError::Service("unavailable".to_string()))
        }
    }

    #[test]
    fn test_deterministic_sections_follow_headings() {
        let blocks = vec![
            para(400),
            heading("Tuition"),
            para(350),
            heading("Housing"),
            para(100),
        ];
        let chunks = chunk_deterministic(&page(), &blocks);

        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].section, "Fees");
        assert_eq!(chunks[0].anchor, None);
        assert_eq!(chunks[1].section, "Tuition");
        assert_eq!(chunks[1].anchor, Some("tuition".to_string()));
    }

    #[test]
    fn test_deterministic_flushes_at_target_max() {
        let blocks = vec![para(1000), para(700), para(500)];
        let chunks = chunk_deterministic(&page(), &blocks);

        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].content.len(), 1000);
        assert_eq!(chunks[1].content.len(), 1201);
    }

    #[test]
    fn test_deterministic_drops_short_tail() {
        let blocks = vec![para(1500), para(200)];
        let chunks = chunk_deterministic(&page(), &blocks);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].content.len(), 1500);
    }

    #[test]
    fn test_post_process_defaults_and_clamps() {
        let long = "y".repeat(3000);
        let chunks = post_process(
            &page(),
            vec![
                proposed(None, &long),
                proposed(Some("  Other  "), "  "),
                ProposedChunk::default(),
            ],
        );

        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].section, "Fees");
        assert_eq!(chunks[0].content.chars().count(), ABS_MAX_CHARS);
    }

    #[test]
    fn test_post_process_merges_short_related_chunks() {
        let body = "z".repeat(500);
        let chunks = post_process(
            &page(),
            vec![
                proposed(Some("Tuition Rates"), &body),
                proposed(Some("Tuition"), "short addendum"),
                proposed(Some("Housing"), "short but unrelated"),
            ],
        );

        assert_eq!(chunks.len(), 2);
        assert!(chunks[0].content.ends_with(" short addendum"));
        assert_eq!(chunks[1].section, "Housing");
    }

    #[test]
    fn test_parse_service_response() {
        let raw = r#"Here you go: {"chunks": [{"section": "A", "anchor": null, "content": "text"}]} done"#;
        let chunks = parse_service_response(raw).unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].section.as_deref(), Some("A"));

        assert!(parse_service_response("no json here").is_err());
        assert!(parse_service_response("} {").is_err());
    }

    #[tokio::test]
    async fn test_chunker_prefers_service() {
        let chunker = Chunker::with_service(Box::new(ScriptedService {
            response: Ok(vec![proposed(Some("Intro"), "service chunk")]),
        }));
        let mut p = page();
        p.text = Some("line one\nline two".to_string());

        let chunks = chunker.chunk_page(&p).await;
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].section, "Intro");
    }

    #[test]
    fn test_chunker_from_config_requires_token_env() {
        let mut config = ChunkingConfig::default();
        assert!(Chunker::from_config(&config).unwrap().service.is_none());

        config.service_url = Some("https://segment.example.edu/chunks".to_string());
        assert!(Chunker::from_config(&config).unwrap().service.is_some());

        config.service_key_env = Some("SITE_CORPUS_TEST_SEGMENT_KEY_UNSET".to_string());
        assert!(matches!(
            Chunker::from_config(&config),
            Err(ConfigError::MissingEnv(_))
        ));
    }

    #[tokio::test]
    async fn test_chunker_falls_back_when_service_fails() {
        let chunker = Chunker::with_service(Box::new(ScriptedService { response: Err(()) }));
        let mut p = page();
        p.text = Some("w".repeat(400));

        let chunks = chunker.chunk_page(&p).await;
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].section, "Fees");
    }

    #[tokio::test]
    async fn test_chunker_falls_back_when_service_proposes_nothing() {
        let chunker = Chunker::with_service(Box::new(ScriptedService {
            response: Ok(Vec::new()),
        }));
        let mut p = page();
        p.html = Some(format!("<h2 id=\"r\">Rates</h2><p>{}</p>", "v".repeat(320)));

        let chunks = chunker.chunk_page(&p).await;
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].section, "Rates");
        assert_eq!(chunks[0].anchor, Some("r".to_string()));
    }
}

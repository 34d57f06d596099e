//! HTTP segmentation service
//!
//! The page title, URL and reading-order blocks are POSTed as JSON; the
//! response body is expected to contain a `{"chunks": [...]}` object, possibly
//! wrapped in other text.

use super::{parse_service_response, Block, ChunkError, ChunkingService, ProposedChunk, RawPage};
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;
use url::Url;

#[derive(Debug, Serialize)]
struct SegmentRequest<'a> {
    url: &'a str,
    title: &'a str,
    blocks: Vec<BlockPayload<'a>>,
}

#[derive(Debug, Serialize)]
struct BlockPayload<'a> {
    kind: &'static str,
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    anchor: Option<&'a str>,
}

impl<'a> From<&'a Block> for BlockPayload<'a> {
    fn from(block: &'a Block) -> Self {
        match block {
            Block::Heading { text, anchor } => Self {
                kind: "heading",
                text,
                anchor: anchor.as_deref(),
            },
            Block::Paragraph { text } => Self {
                kind: "para",
                text,
                anchor: None,
            },
        }
    }
}

/// Segmentation service reached over HTTP
pub struct HttpChunkingService {
    client: Client,
    endpoint: Url,
    token: Option<String>,
}

impl HttpChunkingService {
    /// Creates a client for `endpoint`, optionally authenticated with a bearer token
    pub fn new(
        endpoint: Url,
        token: Option<String>,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            client,
            endpoint,
            token,
        })
    }
}

#[async_trait]
impl ChunkingService for HttpChunkingService {
    async fn segment(
        &self,
        page: &RawPage,
        blocks: &[Block],
    ) -> Result<Vec<ProposedChunk>, ChunkError> {
        let request = SegmentRequest {
            url: &page.url,
            title: &page.title,
            blocks: blocks.iter().map(BlockPayload::from).collect(),
        };

        let mut builder = self.client.post(self.endpoint.clone()).json(&request);
        if let Some(token) = &self.token {
            builder = builder.bearer_auth(token);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| ChunkError::Service(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(ChunkError::Service(format!("HTTP {}", status.as_u16())));
        }

        let body = response
            .text()
            .await
            .map_err(|e| ChunkError::Service(e.to_string()))?;
        parse_service_response(&body)
    }
}

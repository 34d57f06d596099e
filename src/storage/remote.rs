//! PostgREST-style remote document store
//!
//! Records are upserted into a table keyed by `url`. Only the retrieval fields
//! are sent; raw HTML stays in the local corpus. Chunks go to their own table
//! keyed by `chunk_key`, one JSON array per batch.

use crate::chunk::Chunk;
use crate::config::RemoteStoreConfig;
use crate::storage::traits::{ChunkSink, DocumentPublisher, PublishError};
use crate::storage::{PageRecord, PageSource};
use crate::ConfigError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::time::Duration;
use url::Url;

/// Row shape sent to the remote table
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RemoteDocument<'a> {
    url: &'a str,
    title: &'a str,
    text: &'a str,
    discovered_at: &'a DateTime<Utc>,
    source: PageSource,
}

impl<'a> From<&'a PageRecord> for RemoteDocument<'a> {
    fn from(record: &'a PageRecord) -> Self {
        Self {
            url: &record.url,
            title: &record.title,
            text: &record.text,
            discovered_at: &record.discovered_at,
            source: record.source,
        }
    }
}

/// Row shape sent to the chunk table
#[derive(Debug, Serialize)]
struct ChunkRow<'a> {
    chunk_key: String,
    url: &'a str,
    title: &'a str,
    section: &'a str,
    anchor: Option<&'a str>,
    content: &'a str,
}

impl<'a> From<&'a Chunk> for ChunkRow<'a> {
    fn from(chunk: &'a Chunk) -> Self {
        Self {
            chunk_key: chunk_key(chunk),
            url: &chunk.url,
            title: &chunk.title,
            section: &chunk.section,
            anchor: chunk.anchor.as_deref(),
            content: &chunk.content,
        }
    }
}

/// Stable upsert key of a chunk: SHA-256 of its URL, section and content
pub fn chunk_key(chunk: &Chunk) -> String {
    let mut hasher = Sha256::new();
    hasher.update(chunk.url.as_bytes());
    hasher.update([0]);
    hasher.update(chunk.section.as_bytes());
    hasher.update([0]);
    hasher.update(chunk.content.as_bytes());
    hex::encode(hasher.finalize())
}

/// Publishes records to `{base}/rest/v1/{table}` with merge-on-conflict
pub struct RestPublisher {
    client: Client,
    endpoint: Url,
    service_key: String,
}

impl RestPublisher {
    /// Creates a publisher for the given service base URL and table
    pub fn new(base_url: &str, table: &str, service_key: String) -> Result<Self, PublishError> {
        let endpoint = format!("{}/rest/v1/{}", base_url.trim_end_matches('/'), table);
        let endpoint = Url::parse(&endpoint).map_err(|e| PublishError::Endpoint(e.to_string()))?;

        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            client,
            endpoint,
            service_key,
        })
    }

    /// Builds a publisher from configuration, reading the key from the environment
    ///
    /// A missing key is a configuration error: the process must not start a
    /// crawl that silently skips the remote copy it was configured to make.
    pub fn from_config(config: &RemoteStoreConfig) -> Result<Self, ConfigError> {
        Self::for_table(config, &config.table)
    }

    /// Builds a publisher for the configured chunk table
    pub fn chunks_from_config(config: &RemoteStoreConfig) -> Result<Self, ConfigError> {
        Self::for_table(config, &config.chunk_table)
    }

    fn for_table(config: &RemoteStoreConfig, table: &str) -> Result<Self, ConfigError> {
        let key = std::env::var(&config.service_key_env)
            .ok()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| ConfigError::MissingEnv(config.service_key_env.clone()))?;

        Self::new(&config.url, table, key)
            .map_err(|e| ConfigError::InvalidUrl(format!("remote-store: {}", e)))
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// POSTs `body` as an upsert resolved on the `on_conflict` column
    async fn upsert<T: Serialize + ?Sized>(
        &self,
        on_conflict: &str,
        body: &T,
    ) -> Result<(), PublishError> {
        let response = self
            .client
            .post(self.endpoint.clone())
            .query(&[("on_conflict", on_conflict)])
            .header("apikey", &self.service_key)
            .bearer_auth(&self.service_key)
            .header("Prefer", "resolution=merge-duplicates,return=minimal")
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PublishError::Status {
                status: status.as_u16(),
                body,
            });
        }

        Ok(())
    }
}

#[async_trait]
impl DocumentPublisher for RestPublisher {
    async fn publish(&self, record: &PageRecord) -> Result<(), PublishError> {
        self.upsert("url", &RemoteDocument::from(record)).await?;
        tracing::debug!("Published {} to remote store", record.url);
        Ok(())
    }
}

#[async_trait]
impl ChunkSink for RestPublisher {
    async fn upsert_chunks(&self, chunks: &[Chunk]) -> Result<(), PublishError> {
        if chunks.is_empty() {
            return Ok(());
        }
        let rows: Vec<ChunkRow<'_>> = chunks.iter().map(ChunkRow::from).collect();
        self.upsert("chunk_key", &rows).await?;
        tracing::debug!("Upserted {} chunks to {}", rows.len(), self.endpoint);
        Ok(())
    }
}

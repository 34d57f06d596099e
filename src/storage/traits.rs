//! Storage traits and error types
//!
//! This module defines the error types of the storage layer and the traits
//! used to mirror records and retrieval chunks into a remote document store.

use crate::chunk::Chunk;
use crate::storage::PageRecord;
use async_trait::async_trait;
use thiserror::Error;

/// Errors that can occur during corpus operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors from the remote document store
///
/// These are logged by the corpus store and never propagated.
#[derive(Debug, Error)]
pub enum PublishError {
    #[error("Remote store request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Remote store returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Invalid remote store endpoint: {0}")]
    Endpoint(String),
}

/// A remote sink that receives a copy of every newly stored record
///
/// Implementations upsert by URL, so publishing the same record twice is
/// harmless.
#[async_trait]
pub trait DocumentPublisher: Send + Sync {
    /// Upserts the record keyed by its URL
    async fn publish(&self, record: &PageRecord) -> Result<(), PublishError>;
}

/// A remote sink for retrieval chunks
///
/// Chunks are upserted by a key derived from their URL, section and content,
/// so re-exporting an unchanged corpus does not duplicate rows.
#[async_trait]
pub trait ChunkSink: Send + Sync {
    /// Upserts one batch of chunks
    async fn upsert_chunks(&self, chunks: &[Chunk]) -> Result<(), PublishError>;
}

//! Output module for crawl summaries and corpus reports
//!
//! This module handles:
//! - The summary of a crawl run
//! - Statistics over an existing corpus file
//! - Exporting the corpus as retrieval chunks

mod chunks;
pub mod stats;
mod summary;

pub use chunks::{export_chunks, ChunkExport, CHUNK_BATCH_SIZE};
pub use stats::{load_statistics, print_statistics, CorpusStatistics};
pub use summary::RunSummary;

//! Chunk export of a corpus
//!
//! Reads every record of a corpus, splits it with a [`Chunker`] and writes one
//! chunk per JSONL line. With a [`ChunkSink`] the chunks are also upserted
//! remotely in batches of [`CHUNK_BATCH_SIZE`].

use crate::chunk::{Chunk, Chunker, RawPage};
use crate::storage::{ChunkSink, PageRecord, StorageResult};
use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

/// Rows per remote upsert
pub const CHUNK_BATCH_SIZE: usize = 100;

/// Counts from a chunk export
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChunkExport {
    pub records: u64,
    pub chunks: u64,
    pub skipped_lines: u64,
    /// Chunks accepted by the sink
    pub published: u64,
    /// Batches the sink rejected
    pub failed_batches: u64,
}

impl ChunkExport {
    async fn flush(&mut self, sink: &dyn ChunkSink, pending: &mut Vec<Chunk>) {
        if pending.is_empty() {
            return;
        }
        match sink.upsert_chunks(pending).await {
            Ok(()) => self.published += pending.len() as u64,
            Err(e) => {
                self.failed_batches += 1;
                tracing::error!("Failed to upsert {} chunks: {}", pending.len(), e);
            }
        }
        pending.clear();
    }
}

/// Chunks every record of `corpus_path` into `out_path`
///
/// Malformed corpus lines are skipped. The output file is replaced. A failed
/// remote batch is logged and counted, and the export continues.
pub async fn export_chunks(
    corpus_path: &Path,
    out_path: &Path,
    chunker: &Chunker,
    sink: Option<&dyn ChunkSink>,
) -> StorageResult<ChunkExport> {
    let reader = BufReader::new(File::open(corpus_path)?);
    if let Some(parent) = out_path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let mut writer = BufWriter::new(File::create(out_path)?);
    let mut export = ChunkExport::default();
    let mut pending: Vec<Chunk> = Vec::new();

    for (line_no, line) in reader.split(b'\n').enumerate() {
        let line = line?;
        if line.iter().all(|b| b.is_ascii_whitespace()) {
            continue;
        }

        let record: PageRecord = match serde_json::from_slice(&line) {
            Ok(record) => record,
            Err(e) => {
                tracing::warn!("Skipping bad corpus line {}: {}", line_no + 1, e);
                export.skipped_lines += 1;
                continue;
            }
        };

        let chunks = chunker.chunk_page(&RawPage::from(&record)).await;
        for chunk in &chunks {
            serde_json::to_writer(&mut writer, chunk)?;
            writer.write_all(b"\n")?;
        }

        export.records += 1;
        export.chunks += chunks.len() as u64;

        if let Some(sink) = sink {
            pending.extend(chunks);
            if pending.len() >= CHUNK_BATCH_SIZE {
                export.flush(sink, &mut pending).await;
            }
        }
    }

    writer.flush()?;
    if let Some(sink) = sink {
        export.flush(sink, &mut pending).await;
        tracing::info!(
            "Upserted {} chunks ({} failed batches)",
            export.published,
            export.failed_batches
        );
    }
    tracing::info!(
        "Wrote {} chunks from {} records to {}",
        export.chunks,
        export.records,
        out_path.display()
    );
    Ok(export)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{PageSource, PublishError};
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Records batch sizes, failing the batches whose index is listed
    #[derive(Default)]
    struct RecordingSink {
        batches: Mutex<Vec<usize>>,
        fail_on: Vec<usize>,
    }

    #[async_trait]
    impl ChunkSink for RecordingSink {
        async fn upsert_chunks(&self, chunks: &[Chunk]) -> Result<(), PublishError> {
            let mut batches = self.batches.lock().unwrap();
            let index = batches.len();
            batches.push(chunks.len());
            if self.fail_on.contains(&index) {
                return Err(PublishError::Status {
                    status: 500,
                    body: "down".to_string(),
                });
            }
            Ok(())
        }
    }

    /// Writes `count` records that each chunk into exactly one chunk
    fn write_corpus(path: &Path, count: usize) {
        let mut content = String::new();
        for i in 0..count {
            let record = PageRecord::new(
                format!("https://example.edu/p{}", i),
                "Page",
                "t".repeat(400),
                None,
                PageSource::Fetch,
            );
            content.push_str(&serde_json::to_string(&record).unwrap());
            content.push('\n');
        }
        fs::write(path, content).unwrap();
    }

    #[tokio::test]
    async fn test_export_writes_chunk_lines() {
        let dir = tempfile::tempdir().unwrap();
        let corpus = dir.path().join("corpus.jsonl");
        let out = dir.path().join("out/chunks.jsonl");

        let record = PageRecord::new(
            "https://example.edu/fees",
            "Fees",
            "t".repeat(500),
            Some(format!("<h2 id=\"t\">Tuition</h2><p>{}</p>", "t".repeat(500))),
            PageSource::Fetch,
        );
        let mut content = serde_json::to_string(&record).unwrap();
        content.push_str("\nnot json\n");
        fs::write(&corpus, content).unwrap();

        let export = export_chunks(&corpus, &out, &Chunker::new(), None)
            .await
            .unwrap();
        assert_eq!(
            export,
            ChunkExport {
                records: 1,
                chunks: 1,
                skipped_lines: 1,
                published: 0,
                failed_batches: 0,
            }
        );

        let written = fs::read_to_string(&out).unwrap();
        let chunk: serde_json::Value = serde_json::from_str(written.trim()).unwrap();
        assert_eq!(chunk["section"], "Tuition");
        assert_eq!(chunk["anchor"], "t");
        assert_eq!(chunk["url"], "https://example.edu/fees");
    }

    #[tokio::test]
    async fn test_sink_receives_batches_of_one_hundred() {
        let dir = tempfile::tempdir().unwrap();
        let corpus = dir.path().join("corpus.jsonl");
        let out = dir.path().join("chunks.jsonl");
        write_corpus(&corpus, 250);

        let sink = RecordingSink::default();
        let export = export_chunks(&corpus, &out, &Chunker::new(), Some(&sink))
            .await
            .unwrap();

        assert_eq!(export.chunks, 250);
        assert_eq!(export.published, 250);
        assert_eq!(*sink.batches.lock().unwrap(), vec![100, 100, 50]);
        assert_eq!(fs::read_to_string(&out).unwrap().lines().count(), 250);
    }

    #[tokio::test]
    async fn test_failed_batch_does_not_stop_export() {
        let dir = tempfile::tempdir().unwrap();
        let corpus = dir.path().join("corpus.jsonl");
        let out = dir.path().join("chunks.jsonl");
        write_corpus(&corpus, 150);

        let sink = RecordingSink {
            fail_on: vec![0],
            ..Default::default()
        };
        let export = export_chunks(&corpus, &out, &Chunker::new(), Some(&sink))
            .await
            .unwrap();

        assert_eq!(export.records, 150);
        assert_eq!(export.published, 50);
        assert_eq!(export.failed_batches, 1);
    }
}

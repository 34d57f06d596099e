//! Append-only JSONL corpus with dedup-on-write
//!
//! The corpus file is the durable log; the in-memory URL set is rebuilt from it
//! on open with a full scan. Every append writes the line first and only then
//! records the URL, so a failed write never marks a page as known. A torn last
//! line left by an interrupted write is terminated before the next append.
//!
//! The startup scan is linear in the corpus size. That is fine for the
//! single-site corpora this crawler produces but would need an index for
//! corpora in the millions of lines.

use crate::storage::traits::{DocumentPublisher, StorageResult};
use crate::storage::PageRecord;
use serde::Deserialize;
use std::collections::HashSet;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

/// The only field needed to rebuild the dedup index
#[derive(Deserialize)]
struct IndexedLine {
    url: String,
}

/// Durable corpus of page records
pub struct CorpusStore {
    path: PathBuf,
    known: HashSet<String>,
    skipped_lines: usize,
    /// The file does not end in a newline
    torn_tail: bool,
    publisher: Option<Box<dyn DocumentPublisher>>,
}

impl CorpusStore {
    /// Opens (or prepares) the corpus at `path` and loads its URL index
    ///
    /// Parent directories are created. Lines that are not JSON objects with a
    /// string `url` are skipped and counted.
    ///
    /// # Returns
    ///
    /// * `Ok(CorpusStore)` - Store ready for appends
    /// * `Err(StorageError)` - The directory could not be created or the file read
    pub fn open(path: &Path) -> StorageResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let mut store = Self {
            path: path.to_path_buf(),
            known: HashSet::new(),
            skipped_lines: 0,
            torn_tail: false,
            publisher: None,
        };

        if path.exists() {
            store.rehydrate()?;
        }

        tracing::info!(
            "Corpus {} holds {} pages ({} malformed lines skipped)",
            store.path.display(),
            store.known.len(),
            store.skipped_lines
        );

        Ok(store)
    }

    /// Attaches a remote document store that mirrors new records
    pub fn with_publisher(mut self, publisher: Box<dyn DocumentPublisher>) -> Self {
        self.publisher = Some(publisher);
        self
    }

    fn rehydrate(&mut self) -> StorageResult<()> {
        let mut reader = BufReader::new(File::open(&self.path)?);
        let mut line = Vec::new();
        let mut line_no = 0;

        loop {
            line.clear();
            if reader.read_until(b'\n', &mut line)? == 0 {
                break;
            }
            line_no += 1;

            self.torn_tail = line.last() != Some(&b'\n');
            if line.iter().all(|b| b.is_ascii_whitespace()) {
                continue;
            }

            match serde_json::from_slice::<IndexedLine>(&line) {
                Ok(entry) => {
                    self.known.insert(entry.url);
                }
                Err(e) => {
                    self.skipped_lines += 1;
                    tracing::debug!("Skipping malformed corpus line {}: {}", line_no, e);
                }
            }
        }

        if self.torn_tail {
            tracing::warn!(
                "Corpus {} ends in an incomplete line; it will be terminated before the next append",
                self.path.display()
            );
        }

        Ok(())
    }

    /// Checks whether a page with this URL is already in the corpus
    pub fn has_page(&self, url: &str) -> bool {
        self.known.contains(url)
    }

    /// Appends a record unless its URL is already known
    ///
    /// # Returns
    ///
    /// * `Ok(true)` - The record was written
    /// * `Ok(false)` - The URL was already present; nothing changed
    /// * `Err(StorageError)` - Serializing or writing the line failed
    pub async fn append_page(&mut self, record: PageRecord) -> StorageResult<bool> {
        if self.known.contains(&record.url) {
            tracing::debug!("Corpus already has {}, not appending", record.url);
            return Ok(false);
        }

        let mut line = String::new();
        if self.torn_tail {
            line.push('\n');
        }
        line.push_str(&serde_json::to_string(&record)?);
        line.push('\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(line.as_bytes())?;
        file.flush()?;

        self.torn_tail = false;
        self.known.insert(record.url.clone());

        if let Some(publisher) = &self.publisher {
            if let Err(e) = publisher.publish(&record).await {
                tracing::warn!("Remote publish failed for {}: {}", record.url, e);
            }
        }

        Ok(true)
    }

    /// Number of distinct URLs in the corpus
    pub fn len(&self) -> usize {
        self.known.len()
    }

    pub fn is_empty(&self) -> bool {
        self.known.is_empty()
    }

    /// Lines ignored while loading the corpus
    pub fn skipped_lines(&self) -> usize {
        self.skipped_lines
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

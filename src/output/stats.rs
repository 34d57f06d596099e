//! Statistics generation from the corpus file
//!
//! This module provides functionality for scanning a JSONL corpus and
//! displaying what it contains.

use crate::storage::{PageRecord, PageSource, StorageResult};
use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use url::Url;

/// Corpus statistics summary
#[derive(Debug, Clone, Default)]
pub struct CorpusStatistics {
    /// Number of well-formed records
    pub total_records: u64,

    /// Count of records by source
    pub records_by_source: HashMap<PageSource, u64>,

    /// Lines that could not be read as a record
    pub malformed_lines: u64,

    /// Records whose URL appeared on an earlier line
    pub duplicate_urls: u64,

    /// Records that kept their raw HTML
    pub with_html: u64,

    /// Mean text length in characters
    pub mean_text_chars: f64,

    /// Distinct hosts across all records
    pub unique_hosts: u64,
}

/// Scans a corpus file and computes its statistics
///
/// A missing file yields empty statistics.
///
/// # Arguments
///
/// * `path` - Path to the JSONL corpus
///
/// # Returns
///
/// * `Ok(CorpusStatistics)` - Successfully scanned the corpus
/// * `Err(StorageError)` - The file exists but could not be read
pub fn load_statistics(path: &Path) -> StorageResult<CorpusStatistics> {
    let mut stats = CorpusStatistics::default();
    if !path.exists() {
        return Ok(stats);
    }

    let reader = BufReader::new(File::open(path)?);
    let mut urls = HashSet::new();
    let mut hosts = HashSet::new();
    let mut total_chars: u64 = 0;

    for line in reader.split(b'\n') {
        let line = line?;
        if line.iter().all(|b| b.is_ascii_whitespace()) {
            continue;
        }

        let record: PageRecord = match serde_json::from_slice(&line) {
            Ok(record) => record,
            Err(_) => {
                stats.malformed_lines += 1;
                continue;
            }
        };

        stats.total_records += 1;
        *stats.records_by_source.entry(record.source).or_insert(0) += 1;
        total_chars += record.text.chars().count() as u64;
        if record.html.is_some() {
            stats.with_html += 1;
        }
        if let Some(host) = Url::parse(&record.url)
            .ok()
            .and_then(|u| u.host_str().map(String::from))
        {
            hosts.insert(host);
        }
        if !urls.insert(record.url) {
            stats.duplicate_urls += 1;
        }
    }

    stats.unique_hosts = hosts.len() as u64;
    if stats.total_records > 0 {
        stats.mean_text_chars = total_chars as f64 / stats.total_records as f64;
    }

    Ok(stats)
}

/// Prints statistics to stdout in a formatted manner
pub fn print_statistics(stats: &CorpusStatistics) {
    println!("=== Corpus Statistics ===\n");

    println!("Overview:");
    println!("  Records: {}", stats.total_records);
    println!("  Unique hosts: {}", stats.unique_hosts);
    println!("  Mean text length: {:.0} chars", stats.mean_text_chars);
    println!("  Records with HTML: {}", stats.with_html);
    println!();

    println!("Records by Source:");
    let mut source_counts: Vec<_> = stats.records_by_source.iter().collect();
    source_counts.sort_by(|a, b| b.1.cmp(a.1));

    for (source, count) in source_counts {
        let percentage = if stats.total_records > 0 {
            (*count as f64 / stats.total_records as f64) * 100.0
        } else {
            0.0
        };
        println!("  {}: {} ({:.1}%)", source, count, percentage);
    }
    println!();

    if stats.malformed_lines > 0 || stats.duplicate_urls > 0 {
        println!("Problems:");
        println!("  Malformed lines: {}", stats.malformed_lines);
        println!("  Duplicate URLs: {}", stats.duplicate_urls);
    }
}

//! Site-Corpus main entry point
//!
//! This is the command-line interface for the Site-Corpus crawler.

use anyhow::Context;
use clap::Parser;
use site_corpus::chunk::Chunker;
use site_corpus::config::{load_config_with_hash, Config};
use site_corpus::crawler::run_crawl;
use site_corpus::output::{export_chunks, load_statistics, print_statistics};
use site_corpus::storage::{ChunkSink, RestPublisher};
use site_corpus::url::UrlFilter;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// Site-Corpus: A polite single-domain corpus crawler
///
/// Site-Corpus crawls one allow-listed domain under a page and depth budget,
/// escalating to rendering and OCR when pages carry too little text, and
/// writes a deduplicated JSONL corpus.
#[derive(Parser, Debug)]
#[command(name = "site-corpus")]
#[command(version)]
#[command(about = "A polite single-domain corpus crawler", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Validate config and show what would be crawled without actually crawling
    #[arg(long, conflicts_with_all = ["stats", "chunk"])]
    dry_run: bool,

    /// Show statistics of the corpus file and exit
    #[arg(long, conflicts_with_all = ["dry_run", "chunk"])]
    stats: bool,

    /// Split the corpus into retrieval chunks written to OUT and exit
    #[arg(long, value_name = "OUT", conflicts_with_all = ["dry_run", "stats"])]
    chunk: Option<PathBuf>,

    /// With --chunk, also upsert the chunks into the remote store's chunk table
    #[arg(long, requires = "chunk")]
    publish: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // The config decides whether debug logging is on, so it is read first
    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("Failed to load configuration from {}", cli.config.display()))?;

    setup_logging(cli.verbose, cli.quiet, config.crawler.debug);
    tracing::info!(
        "Configuration loaded from {} (hash: {})",
        cli.config.display(),
        config_hash
    );

    if cli.dry_run {
        handle_dry_run(&config);
    } else if cli.stats {
        handle_stats(&config)?;
    } else if let Some(out) = &cli.chunk {
        handle_chunk(&config, out, cli.publish).await?;
    } else {
        handle_crawl(config).await?;
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool, debug: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 if debug => EnvFilter::new("site_corpus=debug,info"),
            0 => EnvFilter::new("site_corpus=info,warn"),
            1 => EnvFilter::new("site_corpus=debug,info"),
            2 => EnvFilter::new("site_corpus=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Handles the --dry-run mode: shows the validated config and the seed list
fn handle_dry_run(config: &Config) {
    println!("=== Site-Corpus Dry Run ===\n");

    println!("Crawler Configuration:");
    println!("  Max pages: {}", config.crawler.max_pages);
    println!("  Max depth: {}", config.crawler.max_depth);
    println!("  Crawl delay: {}ms", config.crawler.crawl_delay_ms);
    println!("  Respect robots.txt: {}", config.crawler.respect_robots_txt);
    println!(
        "  Allowed domains: {}",
        config.crawler.allowed_domains.join(", ")
    );

    println!("\nUser Agent:");
    println!("  {}", config.user_agent.user_agent());

    println!("\nEscalation:");
    println!("  Render budget: {}", config.escalation.render_budget);
    println!("  Screenshot budget: {}", config.escalation.screenshot_budget);
    println!("  OCR selector: {}", config.escalation.ocr_selector);
    println!(
        "  PDF OCR page limit: {}",
        config.escalation.pdf_ocr_page_limit
    );

    println!("\nOutput:");
    println!("  Corpus: {}", config.output.corpus_path);
    if let Some(remote) = &config.remote_store {
        println!(
            "  Remote store: {} (tables {}, {})",
            remote.url, remote.table, remote.chunk_table
        );
    }
    if let Some(service_url) = &config.chunking.service_url {
        println!("  Chunking service: {}", service_url);
    }

    let filter = UrlFilter::new(config.crawler.allowed_domains.clone());
    println!("\nSeeds ({}):", config.crawler.seeds.len());
    for seed in &config.crawler.seeds {
        match filter.normalize(seed) {
            Ok(normalized) => println!("  - {}", normalized),
            Err(e) => println!("  - {} (rejected: {})", seed, e),
        }
    }

    println!("\n✓ Configuration is valid");
}

/// Handles the --stats mode: shows statistics of the corpus file
fn handle_stats(config: &Config) -> anyhow::Result<()> {
    println!("Corpus: {}\n", config.output.corpus_path);

    let stats = load_statistics(Path::new(&config.output.corpus_path))
        .context("Failed to read the corpus")?;
    print_statistics(&stats);

    Ok(())
}

/// Handles the --chunk mode: writes retrieval chunks for every record
async fn handle_chunk(config: &Config, out: &Path, publish: bool) -> anyhow::Result<()> {
    let chunker = Chunker::from_config(&config.chunking)?;

    let publisher = if publish {
        let remote = config
            .remote_store
            .as_ref()
            .context("--publish needs a [remote-store] section")?;
        Some(RestPublisher::chunks_from_config(remote)?)
    } else {
        None
    };
    let sink = publisher.as_ref().map(|p| p as &dyn ChunkSink);

    let corpus = Path::new(&config.output.corpus_path);
    let export = export_chunks(corpus, out, &chunker, sink)
        .await
        .with_context(|| format!("Failed to chunk {}", corpus.display()))?;

    println!(
        "✓ Wrote {} chunks from {} records to {}",
        export.chunks,
        export.records,
        out.display()
    );
    if export.skipped_lines > 0 {
        println!("  Skipped {} unreadable lines", export.skipped_lines);
    }
    if let Some(publisher) = &publisher {
        println!(
            "  Upserted {} chunks to {}",
            export.published,
            publisher.endpoint()
        );
        if export.failed_batches > 0 {
            anyhow::bail!("{} chunk batches failed to upsert", export.failed_batches);
        }
    }

    Ok(())
}

/// Handles the main crawl operation
async fn handle_crawl(config: Config) -> anyhow::Result<()> {
    tracing::info!(
        "Crawling {} with {} seeds",
        config.crawler.allowed_domains.join(", "),
        config.crawler.seeds.len()
    );

    match run_crawl(config).await {
        Ok(summary) => {
            tracing::info!("Crawl completed: {} pages stored", summary.stored);
            Ok(())
        }
        Err(e) => {
            tracing::error!("Crawl failed: {}", e);
            Err(e.into())
        }
    }
}

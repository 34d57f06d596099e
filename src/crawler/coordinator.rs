//! Crawler coordinator - main crawl orchestration logic
//!
//! This module contains the main crawl loop, which:
//! - Seeds the frontier, skipping pages already in the corpus
//! - Walks every dequeued item through fetch, extraction and escalation
//! - Gates text by length and appends records to the corpus
//! - Follows links within the depth budget
//! - Waits out the politeness delay after every item

use crate::config::Config;
use crate::crawler::classifier::needs_dynamic_rendering;
use crate::crawler::extractor::{extract, ExtractedContent};
use crate::crawler::fetcher::{
    ContentKind, FetchedResource, Fetcher, RetryPolicy, Sleeper, TokioSleeper,
};
use crate::crawler::frontier::{Frontier, QueueItem};
use crate::escalation::Escalation;
use crate::output::RunSummary;
use crate::robots::RobotsCache;
use crate::state::{DropReason, ItemState};
use crate::storage::{CorpusStore, PageRecord, PageSource, RestPublisher};
use crate::url::UrlFilter;
use crate::CrawlError;
use rand::Rng;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use url::Url;

/// Minimum text length for PDF records
pub const MIN_PDF_TEXT_CHARS: usize = 30;

/// Minimum text length for every other record
pub const MIN_TEXT_CHARS: usize = 120;

/// Screenshot OCR text shorter than this is discarded
const MIN_OCR_CHARS: usize = 50;

/// Upper bound of the random part of the politeness delay
const POLITENESS_JITTER_MS: u64 = 500;

/// How an item left the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Stored,
    Dropped(DropReason),
}

/// Tracks one item through the state machine
struct ItemProgress<'a> {
    url: &'a str,
    state: ItemState,
}

impl<'a> ItemProgress<'a> {
    fn new(url: &'a str) -> Self {
        tracing::trace!("{}: {}", url, ItemState::Dequeued);
        Self {
            url,
            state: ItemState::Dequeued,
        }
    }

    fn advance(&mut self, next: ItemState) -> Result<(), CrawlError> {
        if !self.state.can_transition_to(next) {
            return Err(CrawlError::InvalidTransition {
                from: self.state,
                to: next,
            });
        }
        tracing::trace!("{}: {} -> {}", self.url, self.state, next);
        self.state = next;
        Ok(())
    }

    fn drop_with(&mut self, reason: DropReason) -> Result<Outcome, CrawlError> {
        self.advance(ItemState::Dropped)?;
        tracing::debug!("Dropped {} ({})", self.url, reason);
        Ok(Outcome::Dropped(reason))
    }
}

/// Text and metadata gathered for an item before the length gate
struct Candidate {
    title: String,
    text: String,
    html: Option<String>,
    links: Vec<String>,
    source: PageSource,
    min_chars: usize,
}

/// Main crawler coordinator structure
pub struct Coordinator {
    config: Config,
    frontier: Frontier,
    fetcher: Fetcher,
    store: CorpusStore,
    escalation: Escalation,
    sleeper: Arc<dyn Sleeper>,
    robots: Option<RobotsCache>,
    summary: RunSummary,
}

impl Coordinator {
    /// Creates a coordinator with the default engine bindings
    ///
    /// # Arguments
    ///
    /// * `config` - The validated crawler configuration
    ///
    /// # Returns
    ///
    /// * `Ok(Coordinator)` - Corpus loaded and client built
    /// * `Err(CrawlError)` - The corpus could not be opened, or the remote
    ///   store is misconfigured
    pub fn new(config: Config) -> Result<Self, CrawlError> {
        let escalation = Escalation::from_config(&config.escalation);
        Self::with_capabilities(config, escalation, Arc::new(TokioSleeper))
    }

    /// Creates a coordinator with explicit escalation engines and timer
    pub fn with_capabilities(
        config: Config,
        escalation: Escalation,
        sleeper: Arc<dyn Sleeper>,
    ) -> Result<Self, CrawlError> {
        Self::with_retry_policy(config, escalation, sleeper, RetryPolicy::default())
    }

    /// Creates a coordinator with explicit engines, timer and retry knobs
    pub fn with_retry_policy(
        config: Config,
        escalation: Escalation,
        sleeper: Arc<dyn Sleeper>,
        policy: RetryPolicy,
    ) -> Result<Self, CrawlError> {
        let mut store = CorpusStore::open(Path::new(&config.output.corpus_path))?;
        tracing::info!(
            "Loaded {} stored pages from {}",
            store.len(),
            store.path().display()
        );

        if let Some(remote) = &config.remote_store {
            let publisher = RestPublisher::from_config(remote)?;
            tracing::info!("Publishing new records to {}", publisher.endpoint());
            store = store.with_publisher(Box::new(publisher));
        }

        let user_agent = config.user_agent.user_agent();
        let fetcher = Fetcher::new(&user_agent, policy, Arc::clone(&sleeper))?;

        let robots = if config.crawler.respect_robots_txt {
            Some(RobotsCache::new(
                fetcher.client().clone(),
                &config.user_agent.crawler_name,
                &user_agent,
            ))
        } else {
            None
        };

        let frontier = Frontier::new(UrlFilter::new(config.crawler.allowed_domains.clone()));

        Ok(Self {
            config,
            frontier,
            fetcher,
            store,
            escalation,
            sleeper,
            robots,
            summary: RunSummary::default(),
        })
    }

    /// The corpus this coordinator writes to
    pub fn store(&self) -> &CorpusStore {
        &self.store
    }

    fn filter(&self) -> &UrlFilter {
        self.frontier.filter()
    }

    /// Pushes the configured seeds at depth 0
    ///
    /// Seeds that are already stored are not crawled again.
    fn seed_frontier(&mut self) -> usize {
        let mut seeded = 0;
        for seed in self.config.crawler.seeds.clone() {
            let Some(url) = self.filter().accept(&seed) else {
                tracing::warn!("Skipping seed {}: rejected by the URL filter", seed);
                continue;
            };
            if self.store.has_page(&url) {
                tracing::info!("Seed {} is already stored, skipping", url);
                continue;
            }
            if self.frontier.enqueue(&url, 0) {
                seeded += 1;
            }
        }
        seeded
    }

    /// Runs the main crawl loop
    ///
    /// The loop ends when the frontier is empty or `max-pages` records have
    /// been stored in this run. The renderer is closed before returning.
    pub async fn run(&mut self) -> Result<RunSummary, CrawlError> {
        let start = Instant::now();
        self.summary = RunSummary::default();

        let seeded = self.seed_frontier();
        tracing::info!(
            "Starting crawl with {} seeds (max {} pages, depth {})",
            seeded,
            self.config.crawler.max_pages,
            self.config.crawler.max_depth
        );

        let max_pages = u64::from(self.config.crawler.max_pages);
        while self.summary.stored < max_pages {
            let Some(item) = self.frontier.dequeue() else {
                tracing::info!("Frontier is empty, crawl complete");
                break;
            };
            self.summary.dequeued += 1;
            tracing::debug!("Processing {} (depth {})", item.url, item.depth);

            let result = self.process_item(&item).await;
            tally(&mut self.summary, &item.url, max_pages, result);

            let delay = self.item_delay(&item.url).await;
            tracing::trace!("{}: {} ({:?})", item.url, ItemState::Delayed, delay);
            self.sleeper.sleep(delay).await;
        }

        self.escalation.renderer.close().await;

        self.summary.elapsed = start.elapsed();
        self.summary.log();
        Ok(self.summary.clone())
    }

    /// Processes a single frontier item up to its outcome
    async fn process_item(&mut self, item: &QueueItem) -> Result<Outcome, CrawlError> {
        let mut progress = ItemProgress::new(&item.url);

        if let Some(robots) = self.robots.as_mut() {
            if !robots.is_allowed(&item.url).await {
                return progress.drop_with(DropReason::RobotsDenied);
            }
        }

        let resource = match self.fetcher.fetch(&item.url).await {
            Ok(resource) => resource,
            Err(e) => {
                tracing::debug!("Fetch of {} failed: {}", item.url, e);
                return progress.drop_with(DropReason::FetchFailed);
            }
        };

        let Some(mut page_url) = self.filter().accept(&resource.final_url) else {
            tracing::debug!(
                "{} redirected outside the crawl scope to {}",
                item.url,
                resource.final_url
            );
            return progress.drop_with(DropReason::FetchFailed);
        };
        progress.advance(ItemState::Fetched)?;

        if self.store.has_page(&page_url) {
            return progress.drop_with(DropReason::AlreadyStored);
        }

        let candidate = match resource.kind() {
            ContentKind::Html => {
                let Some(candidate) = self
                    .process_html(&resource, &mut page_url, &mut progress)
                    .await?
                else {
                    return progress.drop_with(DropReason::AlreadyStored);
                };
                candidate
            }
            ContentKind::Pdf => {
                let bytes = resource.bytes().unwrap_or_default();
                let text = self.escalation.documents.extract_text(bytes).await;
                progress.advance(ItemState::Recognized)?;
                Candidate {
                    title: String::new(),
                    text,
                    html: None,
                    links: Vec::new(),
                    source: PageSource::Crawl,
                    min_chars: MIN_PDF_TEXT_CHARS,
                }
            }
            ContentKind::Image => {
                let bytes = resource.bytes().unwrap_or_default();
                let text = self.escalation.recognizer.recognize(bytes).await;
                progress.advance(ItemState::Recognized)?;
                Candidate {
                    title: String::new(),
                    text,
                    html: None,
                    links: Vec::new(),
                    source: PageSource::Crawl,
                    min_chars: MIN_TEXT_CHARS,
                }
            }
            ContentKind::Other => {
                tracing::debug!(
                    "Unsupported content type '{}' at {}",
                    resource.content_type,
                    page_url
                );
                return progress.drop_with(DropReason::UnsupportedContent);
            }
        };

        let text_chars = candidate.text.chars().count();
        if text_chars < candidate.min_chars {
            tracing::debug!(
                "{} has {} chars of text, below the minimum of {}",
                page_url,
                text_chars,
                candidate.min_chars
            );
            return progress.drop_with(DropReason::TextTooShort);
        }
        progress.advance(ItemState::Validated)?;

        let record = PageRecord::new(
            page_url.as_str(),
            candidate.title,
            candidate.text,
            candidate.html,
            candidate.source,
        );
        match self.store.append_page(record).await {
            Ok(true) => progress.advance(ItemState::Stored)?,
            Ok(false) => return progress.drop_with(DropReason::AlreadyStored),
            Err(e) => {
                tracing::error!("Failed to append {} to the corpus: {}", page_url, e);
                return progress.drop_with(DropReason::StoreFailed);
            }
        }

        let enqueued = self.enqueue_links(&candidate.links, item.depth);
        self.summary.links_enqueued += enqueued as u64;
        progress.advance(ItemState::LinksEnqueued)?;

        Ok(Outcome::Stored)
    }

    /// Extracts an HTML page and escalates it when the markup is too sparse
    ///
    /// `page_url` is replaced by the canonical URL when the page declares an
    /// allowed one. Returns `None` when that canonical URL is already stored.
    async fn process_html(
        &mut self,
        resource: &FetchedResource,
        page_url: &mut String,
        progress: &mut ItemProgress<'_>,
    ) -> Result<Option<Candidate>, CrawlError> {
        let html = resource.html().unwrap_or_default();
        let base = Url::parse(page_url.as_str()).map_err(|e| {
            crate::UrlError::Parse(format!("{}: {}", page_url, e))
        })?;

        let ExtractedContent {
            mut title,
            mut text,
            mut links,
            canonical_url,
        } = extract(html, &base);
        progress.advance(ItemState::Parsed)?;

        if let Some(canonical) = canonical_url.and_then(|c| self.filter().accept(&c)) {
            if canonical != *page_url {
                tracing::debug!("{} declares canonical {}", page_url, canonical);
                *page_url = canonical;
                if self.store.has_page(page_url) {
                    return Ok(None);
                }
            }
        }

        let mut stored_html = html.to_string();
        let mut source = PageSource::Fetch;
        let escalation = &self.config.escalation;

        if needs_dynamic_rendering(html, &text) {
            if self.summary.renders_used < escalation.render_budget {
                self.summary.renders_used += 1;
                tracing::debug!(
                    "Rendering {} ({}/{})",
                    resource.final_url,
                    self.summary.renders_used,
                    escalation.render_budget
                );
                if let Some(rendered) = self.escalation.renderer.render(&resource.final_url).await {
                    let content = extract(&rendered, &base);
                    if !content.title.is_empty() {
                        title = content.title;
                    }
                    if !content.text.is_empty() {
                        text = content.text;
                    }
                    if !content.links.is_empty() {
                        links = content.links;
                    }
                    stored_html = rendered;
                    source = PageSource::Rendered;
                    progress.advance(ItemState::Rendered)?;
                }
            } else {
                tracing::debug!("Render budget exhausted, keeping static HTML of {}", page_url);
            }
        }

        if text.chars().count() < escalation.sparse_text_floor
            && self.summary.screenshots_used < escalation.screenshot_budget
        {
            self.summary.screenshots_used += 1;
            tracing::debug!(
                "Screenshotting '{}' on {} ({}/{})",
                escalation.ocr_selector,
                resource.final_url,
                self.summary.screenshots_used,
                escalation.screenshot_budget
            );
            if let Some(image) = self
                .escalation
                .renderer
                .screenshot(&resource.final_url, &escalation.ocr_selector)
                .await
            {
                let recognized = self.escalation.recognizer.recognize(&image).await;
                if recognized.chars().count() > MIN_OCR_CHARS {
                    if text.is_empty() {
                        text = recognized;
                    } else {
                        text = format!("{}\n{}", text, recognized);
                    }
                    progress.advance(ItemState::Recognized)?;
                }
            }
        }

        Ok(Some(Candidate {
            title,
            text,
            html: Some(stored_html),
            links,
            source,
            min_chars: MIN_TEXT_CHARS,
        }))
    }

    /// Enqueues outbound links one level deeper, if the depth budget allows
    fn enqueue_links(&mut self, links: &[String], depth: u32) -> usize {
        let next_depth = depth + 1;
        if next_depth > self.config.crawler.max_depth {
            return 0;
        }

        let mut enqueued = 0;
        for link in links {
            let Some(url) = self.filter().accept(link) else {
                continue;
            };
            if self.store.has_page(&url) {
                continue;
            }
            if self.frontier.enqueue(&url, next_depth) {
                enqueued += 1;
            }
        }
        enqueued
    }

    /// Politeness delay after an item, raised to the robots crawl-delay
    async fn item_delay(&mut self, url: &str) -> Duration {
        let delay = politeness_delay(self.config.crawler.crawl_delay_ms);
        match self.robots.as_mut() {
            Some(robots) => match robots.crawl_delay(url).await {
                Some(robots_delay) => delay.max(robots_delay),
                None => delay,
            },
            None => delay,
        }
    }
}

/// Counts the result of one item in the run summary
fn tally(
    summary: &mut RunSummary,
    url: &str,
    max_pages: u64,
    result: Result<Outcome, CrawlError>,
) {
    match result {
        Ok(Outcome::Stored) => {
            summary.stored += 1;
            tracing::info!("Stored {}/{}: {}", summary.stored, max_pages, url);
        }
        Ok(Outcome::Dropped(reason)) => summary.record_drop(reason),
        Err(e) => {
            summary.record_error();
            tracing::error!("Error processing {}: {}", url, e);
        }
    }
}

/// Base delay plus up to 500 ms of jitter
pub fn politeness_delay(base_ms: u64) -> Duration {
    let jitter = rand::thread_rng().gen_range(0..POLITENESS_JITTER_MS);
    Duration::from_millis(base_ms + jitter)
}

/// Runs a complete crawl with the default engine bindings
///
/// # Arguments
///
/// * `config` - The validated crawler configuration
///
/// # Returns
///
/// * `Ok(RunSummary)` - The crawl ran to completion
/// * `Err(CrawlError)` - Setup failed before crawling began
pub async fn run_crawl(config: Config) -> Result<RunSummary, CrawlError> {
    let mut coordinator = Coordinator::new(config)?;
    coordinator.run().await
}

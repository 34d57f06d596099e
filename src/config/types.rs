use serde::Deserialize;

/// Main configuration structure for Site-Corpus
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub crawler: CrawlerConfig,
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    pub output: OutputConfig,
    #[serde(default)]
    pub escalation: EscalationConfig,
    #[serde(rename = "remote-store", default)]
    pub remote_store: Option<RemoteStoreConfig>,
    #[serde(default)]
    pub chunking: ChunkingConfig,
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// URLs the crawl starts from (depth 0)
    pub seeds: Vec<String>,

    /// Host suffixes that are allowed to be crawled (e.g. "example.edu")
    #[serde(rename = "allowed-domains")]
    pub allowed_domains: Vec<String>,

    /// Maximum number of pages stored per run
    #[serde(rename = "max-pages")]
    pub max_pages: u32,

    /// Maximum link-following depth from the seeds
    #[serde(rename = "max-depth")]
    pub max_depth: u32,

    /// Base politeness delay between items (milliseconds)
    #[serde(rename = "crawl-delay-ms")]
    pub crawl_delay_ms: u64,

    /// Enables debug-level logging for the crawler
    #[serde(default)]
    pub debug: bool,

    /// Honor robots.txt allow rules and crawl-delay
    #[serde(rename = "respect-robots-txt", default)]
    pub respect_robots_txt: bool,
}

/// Crawler identity used for the transparent entry of the user agent pool
#[derive(Debug, Clone, Deserialize)]
pub struct UserAgentConfig {
    /// Name of the crawler
    #[serde(rename = "crawler-name")]
    pub crawler_name: String,

    /// Version of the crawler
    #[serde(rename = "crawler-version")]
    pub crawler_version: String,

    /// URL with information about the crawler
    #[serde(rename = "contact-url")]
    pub contact_url: String,
}

impl UserAgentConfig {
    /// Formats the crawler identity: `Name/Version (+ContactURL)`
    pub fn user_agent(&self) -> String {
        format!(
            "{}/{} (+{})",
            self.crawler_name, self.crawler_version, self.contact_url
        )
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Path to the JSONL corpus file
    #[serde(rename = "corpus-path")]
    pub corpus_path: String,
}

/// Limits and knobs for the render/OCR/PDF escalation ladder
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EscalationConfig {
    /// Maximum number of pages rendered per run
    #[serde(rename = "render-budget")]
    pub render_budget: u32,

    /// Maximum number of selector screenshots per run
    #[serde(rename = "screenshot-budget")]
    pub screenshot_budget: u32,

    /// Upper bound on a single render or screenshot (seconds)
    #[serde(rename = "render-timeout-secs")]
    pub render_timeout_secs: u64,

    /// Text shorter than this after parsing/rendering triggers screenshot OCR
    #[serde(rename = "sparse-text-floor")]
    pub sparse_text_floor: usize,

    /// Selector whose region is screenshotted for OCR
    #[serde(rename = "ocr-selector")]
    pub ocr_selector: String,

    /// OCR language code passed to the recognizer
    #[serde(rename = "ocr-language")]
    pub ocr_language: String,

    /// Maximum PDF pages rasterized for OCR when no text layer tool exists
    #[serde(rename = "pdf-ocr-page-limit")]
    pub pdf_ocr_page_limit: u32,
}

impl Default for EscalationConfig {
    fn default() -> Self {
        Self {
            render_budget: 50,
            screenshot_budget: 50,
            render_timeout_secs: 30,
            sparse_text_floor: 200,
            ocr_selector: "table, .table, #tuition, .tuition".to_string(),
            ocr_language: "eng".to_string(),
            pdf_ocr_page_limit: 4,
        }
    }
}

/// Remote document store that receives a best-effort copy of each record
#[derive(Debug, Clone, Deserialize)]
pub struct RemoteStoreConfig {
    /// Base URL of the PostgREST-compatible service
    pub url: String,

    /// Table records are upserted into
    #[serde(default = "default_table")]
    pub table: String,

    /// Table retrieval chunks are upserted into, keyed by `chunk_key`
    #[serde(rename = "chunk-table", default = "default_chunk_table")]
    pub chunk_table: String,

    /// Name of the environment variable holding the service key
    #[serde(rename = "service-key-env")]
    pub service_key_env: String,
}

fn default_table() -> String {
    "pages".to_string()
}

fn default_chunk_table() -> String {
    "chunks".to_string()
}

/// Segmentation service used by `--chunk`
///
/// Without a `service-url` chunking is deterministic.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Endpoint that answers a page's blocks with `{"chunks": [...]}`
    #[serde(rename = "service-url")]
    pub service_url: Option<String>,

    /// Environment variable holding a bearer token for the service
    #[serde(rename = "service-key-env")]
    pub service_key_env: Option<String>,

    /// Upper bound on one segmentation request (seconds)
    #[serde(rename = "timeout-secs")]
    pub timeout_secs: u64,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            service_url: None,
            service_key_env: None,
            timeout_secs: 60,
        }
    }
}

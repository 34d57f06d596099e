//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests for the crawler, including:
//! - Building the HTTP client with timeouts, redirects and decompression
//! - Weighted rotation of the client identity (User-Agent) per attempt
//! - Retry of rate limits, server errors and network failures with
//!   exponential backoff plus jitter
//! - Splitting responses into decoded HTML text or raw document bytes

use async_trait::async_trait;
use rand::Rng;
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, CONTENT_TYPE, REFERER, USER_AGENT};
use reqwest::{redirect::Policy, Client, StatusCode};
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Errors returned by [`Fetcher::fetch`]
///
/// None of these are fatal to a crawl; the orchestrator drops the item.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP {status} (not retryable)")]
    Status { status: u16 },

    #[error("Gave up after {attempts} attempts: {last_error}")]
    RetriesExhausted { attempts: u32, last_error: String },

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

/// Suspends the current task
///
/// Every wait in the crawler goes through this so tests can run without
/// real delays and assert on what would have been slept.
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Sleeps on the tokio timer
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// A weighted entry in the identity pool
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_agent: String,
    pub weight: u32,
}

const CHROME_WINDOWS_UA: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";
const SAFARI_MAC_UA: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/16.0 Safari/605.1.15";
const CHROME_LINUX_UA: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Builds the identity pool: three desktop browsers plus the crawler itself
///
/// # Arguments
///
/// * `crawler_user_agent` - The transparent crawler identity (`Name/Version (+contact)`)
pub fn identity_pool(crawler_user_agent: &str) -> Vec<Identity> {
    vec![
        Identity {
            user_agent: CHROME_WINDOWS_UA.to_string(),
            weight: 60,
        },
        Identity {
            user_agent: SAFARI_MAC_UA.to_string(),
            weight: 20,
        },
        Identity {
            user_agent: CHROME_LINUX_UA.to_string(),
            weight: 15,
        },
        Identity {
            user_agent: crawler_user_agent.to_string(),
            weight: 5,
        },
    ]
}

/// Picks the identity a roll in `0..total_weight` lands on
///
/// Rolls past the total fall back to the first entry.
pub fn pick_identity(pool: &[Identity], roll: u32) -> Option<&Identity> {
    let mut remaining = roll;
    for identity in pool {
        if remaining < identity.weight {
            return Some(identity);
        }
        remaining -= identity.weight;
    }
    pool.first()
}

/// Exponential backoff before retry number `attempt + 1`, without jitter
///
/// `min(base * 2^attempt, cap)`; saturates instead of overflowing.
pub fn backoff_delay(attempt: u32, base: Duration, cap: Duration) -> Duration {
    let factor = 2u32.checked_pow(attempt).unwrap_or(u32::MAX);
    base.checked_mul(factor).unwrap_or(cap).min(cap)
}

/// Retry and pacing knobs of the fetch client
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Attempts after the first one
    pub max_retries: u32,
    pub base_backoff: Duration,
    pub max_backoff: Duration,
    /// Upper bound (exclusive) of the random addition to each backoff
    pub max_jitter: Duration,
    /// Fixed part of the delay before the first attempt
    pub lead_delay: Duration,
    /// Upper bound (exclusive) of the random part of the leading delay
    pub lead_jitter: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_backoff: Duration::from_millis(400),
            max_backoff: Duration::from_millis(10_000),
            max_jitter: Duration::from_millis(300),
            lead_delay: Duration::from_millis(200),
            lead_jitter: Duration::from_millis(800),
        }
    }
}

impl RetryPolicy {
    /// Full wait before the retry that follows failed attempt `attempt`
    pub fn retry_delay(&self, attempt: u32) -> Duration {
        backoff_delay(attempt, self.base_backoff, self.max_backoff) + random_below(self.max_jitter)
    }

    /// Wait before the first attempt of a fetch
    pub fn leading_delay(&self) -> Duration {
        self.lead_delay + random_below(self.lead_jitter)
    }
}

fn random_below(bound: Duration) -> Duration {
    let millis = bound.as_millis() as u64;
    if millis == 0 {
        return Duration::ZERO;
    }
    Duration::from_millis(rand::thread_rng().gen_range(0..millis))
}

/// Broad content category, decided from the Content-Type header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    Html,
    Pdf,
    Image,
    Other,
}

impl ContentKind {
    pub fn from_content_type(content_type: &str) -> Self {
        let content_type = content_type.to_ascii_lowercase();
        if content_type.contains("text/html") {
            Self::Html
        } else if content_type.contains("pdf") {
            Self::Pdf
        } else if content_type.trim_start().starts_with("image/") {
            Self::Image
        } else {
            Self::Other
        }
    }
}

/// Response body as the crawler consumes it
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchedBody {
    /// Decoded text of an HTML response
    Text(String),
    /// Raw bytes of any other response
    Bytes(Vec<u8>),
}

/// A successfully fetched resource
#[derive(Debug, Clone)]
pub struct FetchedResource {
    /// URL after following redirects
    pub final_url: String,
    /// Content-Type header value, empty when absent
    pub content_type: String,
    pub body: FetchedBody,
}

impl FetchedResource {
    pub fn kind(&self) -> ContentKind {
        ContentKind::from_content_type(&self.content_type)
    }

    pub fn html(&self) -> Option<&str> {
        match &self.body {
            FetchedBody::Text(text) => Some(text),
            FetchedBody::Bytes(_) => None,
        }
    }

    pub fn bytes(&self) -> Option<&[u8]> {
        match &self.body {
            FetchedBody::Text(_) => None,
            FetchedBody::Bytes(bytes) => Some(bytes),
        }
    }
}

/// Outcome of a single attempt that did not produce a resource
enum AttemptError {
    Retryable(String),
    Permanent(u16),
}

/// Builds an HTTP client with proper configuration
///
/// The User-Agent is set per request from the identity pool, so none is
/// configured here.
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
pub fn build_http_client() -> Result<Client, reqwest::Error> {
    Client::builder()
        .timeout(Duration::from_secs(30))
        .connect_timeout(Duration::from_secs(10))
        .redirect(Policy::limited(10))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Resilient fetch client with identity rotation
pub struct Fetcher {
    client: Client,
    identities: Vec<Identity>,
    total_weight: u32,
    policy: RetryPolicy,
    sleeper: std::sync::Arc<dyn Sleeper>,
}

impl Fetcher {
    /// Creates a fetcher
    ///
    /// # Arguments
    ///
    /// * `crawler_user_agent` - Crawler identity added to the pool
    /// * `policy` - Retry and pacing knobs
    /// * `sleeper` - Timer used for the leading delay and backoff waits
    pub fn new(
        crawler_user_agent: &str,
        policy: RetryPolicy,
        sleeper: std::sync::Arc<dyn Sleeper>,
    ) -> Result<Self, reqwest::Error> {
        let identities = identity_pool(crawler_user_agent);
        let total_weight = identities.iter().map(|i| i.weight).sum();

        Ok(Self {
            client: build_http_client()?,
            identities,
            total_weight,
            policy,
            sleeper,
        })
    }

    /// The shared HTTP client, also used for robots.txt
    pub fn client(&self) -> &Client {
        &self.client
    }

    fn next_user_agent(&self) -> &str {
        let roll = if self.total_weight == 0 {
            0
        } else {
            rand::thread_rng().gen_range(0..self.total_weight)
        };
        pick_identity(&self.identities, roll)
            .map(|i| i.user_agent.as_str())
            .unwrap_or(CHROME_WINDOWS_UA)
    }

    /// Fetches a URL with retry logic
    ///
    /// # Retry Logic
    ///
    /// | Condition | Action |
    /// |-----------|--------|
    /// | HTTP 2xx | Return the resource |
    /// | HTTP 429 | Retry with backoff |
    /// | HTTP 5xx | Retry with backoff |
    /// | Network / body error | Retry with backoff |
    /// | Any other status | Fail immediately |
    ///
    /// Each attempt draws a fresh identity. After the last retry fails the
    /// fetch reports [`FetchError::RetriesExhausted`].
    pub async fn fetch(&self, url: &str) -> Result<FetchedResource, FetchError> {
        let target = Url::parse(url).map_err(|e| FetchError::InvalidUrl(e.to_string()))?;

        self.sleeper.sleep(self.policy.leading_delay()).await;

        let mut last_error = String::new();
        for attempt in 0..=self.policy.max_retries {
            let user_agent = self.next_user_agent();

            match self.attempt(&target, user_agent).await {
                Ok(resource) => return Ok(resource),
                Err(AttemptError::Permanent(status)) => {
                    tracing::debug!("{} returned HTTP {}, not retrying", url, status);
                    return Err(FetchError::Status { status });
                }
                Err(AttemptError::Retryable(reason)) => {
                    last_error = reason;
                    if attempt == self.policy.max_retries {
                        break;
                    }

                    let delay = self.policy.retry_delay(attempt);
                    tracing::debug!(
                        "Attempt {} for {} failed ({}), retrying in {:?}",
                        attempt + 1,
                        url,
                        last_error,
                        delay
                    );
                    self.sleeper.sleep(delay).await;
                }
            }
        }

        tracing::warn!("Fetch failed for {}: {}", url, last_error);
        Err(FetchError::RetriesExhausted {
            attempts: self.policy.max_retries + 1,
            last_error,
        })
    }

    async fn attempt(&self, target: &Url, user_agent: &str) -> Result<FetchedResource, AttemptError> {
        let mut request = self
            .client
            .get(target.clone())
            .header(USER_AGENT, user_agent)
            .header(ACCEPT, "*/*")
            .header(ACCEPT_LANGUAGE, "en-US,en;q=0.9");

        let origin = target.origin();
        if origin.is_tuple() {
            request = request.header(REFERER, origin.ascii_serialization());
        }

        let response = request
            .send()
            .await
            .map_err(|e| AttemptError::Retryable(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
            return Err(AttemptError::Retryable(format!("HTTP {}", status.as_u16())));
        }
        if !status.is_success() {
            return Err(AttemptError::Permanent(status.as_u16()));
        }

        let final_url = response.url().to_string();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();

        let body = if ContentKind::from_content_type(&content_type) == ContentKind::Html {
            let text = response
                .text()
                .await
                .map_err(|e| AttemptError::Retryable(e.to_string()))?;
            FetchedBody::Text(text)
        } else {
            let bytes = response
                .bytes()
                .await
                .map_err(|e| AttemptError::Retryable(e.to_string()))?;
            FetchedBody::Bytes(bytes.to_vec())
        };

        Ok(FetchedResource {
            final_url,
            content_type,
            body,
        })
    }
}

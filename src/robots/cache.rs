//! Per-host robots.txt cache
//!
//! Each host's robots.txt is fetched at most once per run. A missing file, a
//! non-success status or a network error all produce an allow-all policy.

use crate::robots::RobotsPolicy;
use reqwest::header::USER_AGENT;
use reqwest::Client;
use std::collections::HashMap;
use std::time::Duration;
use url::Url;

/// Robots policies keyed by origin (`scheme://host:port`)
pub struct RobotsCache {
    client: Client,
    /// Product token matched against User-agent groups
    agent: String,
    /// Full User-Agent header sent with robots.txt requests
    user_agent: String,
    policies: HashMap<String, RobotsPolicy>,
}

impl RobotsCache {
    /// Creates an empty cache
    ///
    /// # Arguments
    ///
    /// * `client` - HTTP client used for robots.txt requests
    /// * `agent` - Product token, e.g. the crawler name
    /// * `user_agent` - User-Agent header value for robots.txt requests
    pub fn new(client: Client, agent: &str, user_agent: &str) -> Self {
        Self {
            client,
            agent: agent.to_string(),
            user_agent: user_agent.to_string(),
            policies: HashMap::new(),
        }
    }

    /// Number of hosts whose policy has been loaded
    pub fn len(&self) -> usize {
        self.policies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.policies.is_empty()
    }

    async fn policy_for(&mut self, url: &Url) -> &RobotsPolicy {
        let origin = url.origin().ascii_serialization();
        if !self.policies.contains_key(&origin) {
            let policy = self.fetch(&origin).await;
            self.policies.insert(origin.clone(), policy);
        }
        // inserted above when absent
        self.policies
            .entry(origin)
            .or_insert_with(RobotsPolicy::allow_all)
    }

    async fn fetch(&self, origin: &str) -> RobotsPolicy {
        let robots_url = format!("{}/robots.txt", origin);
        let response = self
            .client
            .get(&robots_url)
            .header(USER_AGENT, &self.user_agent)
            .send()
            .await;

        match response {
            Ok(response) if response.status().is_success() => match response.text().await {
                Ok(body) => {
                    tracing::info!("Loaded {}", robots_url);
                    RobotsPolicy::from_content(&body)
                }
                Err(e) => {
                    tracing::debug!("Unreadable {}: {}", robots_url, e);
                    RobotsPolicy::allow_all()
                }
            },
            Ok(response) => {
                tracing::debug!(
                    "{} returned HTTP {}, allowing all",
                    robots_url,
                    response.status().as_u16()
                );
                RobotsPolicy::allow_all()
            }
            Err(e) => {
                tracing::debug!("Could not fetch {}: {}, allowing all", robots_url, e);
                RobotsPolicy::allow_all()
            }
        }
    }

    /// Checks whether the crawler may fetch `url`
    ///
    /// Unparseable URLs are allowed; the fetch itself will reject them.
    pub async fn is_allowed(&mut self, url: &str) -> bool {
        let Ok(parsed) = Url::parse(url) else {
            return true;
        };
        let agent = self.agent.clone();
        self.policy_for(&parsed).await.is_allowed(url, &agent)
    }

    /// Crawl-delay requested by the host of `url`, if any
    pub async fn crawl_delay(&mut self, url: &str) -> Option<Duration> {
        let parsed = Url::parse(url).ok()?;
        let agent = self.agent.clone();
        self.policy_for(&parsed).await.crawl_delay(&agent)
    }
}

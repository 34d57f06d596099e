//! Chromium-based renderer using chromiumoxide.

use super::Renderer;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::network::{EnableParams, SetBlockedUrLsParams};
use chromiumoxide::cdp::browser_protocol::page::CaptureScreenshotFormat;
use chromiumoxide::element::Element;
use chromiumoxide::page::Page;
use futures::StreamExt;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

/// Resource URL patterns that are never loaded while rendering
const BLOCKED_PATTERNS: &[&str] = &[
    "*.png", "*.jpg", "*.jpeg", "*.gif", "*.webp", "*.avif", "*.ico", "*.svg", "*.mp4",
    "*.webm", "*.mp3", "*.wav", "*.ogg", "*.woff", "*.woff2", "*.ttf", "*.otf", "*.eot",
];

/// Scrolls to the bottom in steps so lazily loaded content is requested
const AUTO_SCROLL_JS: &str = r#"
new Promise((resolve) => {
    let total = 0;
    const distance = 600;
    const timer = setInterval(() => {
        window.scrollBy(0, distance);
        total += distance;
        if (total >= document.body.scrollHeight) {
            clearInterval(timer);
            resolve(true);
        }
    }, 120);
})
"#;

/// How long to wait for the screenshot selector to appear
const SELECTOR_WAIT: Duration = Duration::from_secs(5);

struct RunningBrowser {
    browser: Browser,
    handler: JoinHandle<()>,
}

/// Headless Chromium, launched on first use
pub struct ChromiumRenderer {
    timeout: Duration,
    running: Mutex<Option<RunningBrowser>>,
}

impl ChromiumRenderer {
    /// Creates the renderer without launching a browser
    ///
    /// `timeout` bounds each render or screenshot from navigation to capture.
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            running: Mutex::new(None),
        }
    }

    async fn launch() -> Result<RunningBrowser> {
        let config = BrowserConfig::builder()
            .arg("--headless=new")
            .arg("--disable-gpu")
            .arg("--no-sandbox")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-extensions")
            .build()
            .map_err(|e| anyhow::anyhow!("failed to build browser config: {e}"))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .context("failed to launch Chromium")?;

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                let _ = event;
            }
        });

        tracing::info!("Launched headless Chromium");
        Ok(RunningBrowser { browser, handler })
    }

    async fn new_page(&self) -> Result<Page> {
        let mut running = self.running.lock().await;
        if running.is_none() {
            *running = Some(Self::launch().await?);
        }
        let browser = &running.as_ref().context("browser not running")?.browser;
        browser
            .new_page("about:blank")
            .await
            .context("failed to open a tab")
    }

    /// Navigates a tab with heavy resources blocked, then scrolls it
    async fn navigate(page: &Page, url: &str) -> Result<()> {
        page.execute(EnableParams::default()).await?;
        let blocked = BLOCKED_PATTERNS.iter().map(|p| p.to_string()).collect();
        page.execute(SetBlockedUrLsParams::new(blocked)).await?;

        page.goto(url).await.context("navigation failed")?;
        page.wait_for_navigation().await?;
        page.evaluate(AUTO_SCROLL_JS).await.context("scroll failed")?;

        Ok(())
    }

    async fn wait_for_element(page: &Page, selector: &str) -> Result<Element> {
        tokio::time::timeout(SELECTOR_WAIT, async {
            loop {
                if let Ok(element) = page.find_element(selector).await {
                    return element;
                }
                tokio::time::sleep(Duration::from_millis(250)).await;
            }
        })
        .await
        .with_context(|| format!("no element matched {selector}"))
    }

    /// Opens a blank tab within the render timeout
    async fn open_bounded(&self) -> Result<Page> {
        tokio::time::timeout(self.timeout, self.new_page())
            .await
            .with_context(|| format!("timed out after {:?} opening a tab", self.timeout))?
    }

    /// The tab is closed whether the work finished, failed or timed out
    async fn render_html(&self, url: &str) -> Result<String> {
        let page = self.open_bounded().await?;
        let result = tokio::time::timeout(self.timeout, async {
            Self::navigate(&page, url).await?;
            page.content().await.context("failed to read page content")
        })
        .await;
        let _ = page.close().await;

        result.with_context(|| format!("timed out after {:?}", self.timeout))?
    }

    async fn capture(&self, url: &str, selector: &str) -> Result<Vec<u8>> {
        let page = self.open_bounded().await?;
        let result = tokio::time::timeout(self.timeout, async {
            Self::navigate(&page, url).await?;
            let element = Self::wait_for_element(&page, selector).await?;
            element
                .screenshot(CaptureScreenshotFormat::Png)
                .await
                .context("element screenshot failed")
        })
        .await;
        let _ = page.close().await;

        result.with_context(|| format!("timed out after {:?}", self.timeout))?
    }
}

#[async_trait]
impl Renderer for ChromiumRenderer {
    async fn render(&self, url: &str) -> Option<String> {
        match self.render_html(url).await {
            Ok(html) => Some(html),
            Err(e) => {
                tracing::warn!("Render failed for {}: {:#}", url, e);
                None
            }
        }
    }

    async fn screenshot(&self, url: &str, selector: &str) -> Option<Vec<u8>> {
        match self.capture(url, selector).await {
            Ok(png) => Some(png),
            Err(e) => {
                tracing::debug!("Screenshot failed for {}: {:#}", url, e);
                None
            }
        }
    }

    async fn close(&self) {
        let Some(mut running) = self.running.lock().await.take() else {
            return;
        };
        if let Err(e) = running.browser.close().await {
            tracing::debug!("Browser close failed: {}", e);
        }
        let _ = running.browser.wait().await;
        running.handler.abort();
        tracing::info!("Closed headless Chromium");
    }
}

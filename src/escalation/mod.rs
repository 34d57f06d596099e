//! Render, OCR and PDF capabilities
//!
//! The crawler only decides *when* to escalate; the engines that render pages,
//! recognize text in images and read PDFs sit behind the traits in this
//! module. Every capability reports failure as `None` or an empty string so a
//! broken engine degrades an item instead of failing it.
//!
//! Default bindings:
//! - [`TesseractRecognizer`] runs the `tesseract` CLI
//! - [`PopplerExtractor`] runs `pdftotext`, falling back to `pdftoppm` + OCR
//! - `ChromiumRenderer` drives headless Chromium (cargo feature `chromium`)
//! - [`NoopRenderer`] is used when no browser binding is compiled in

#[cfg(feature = "chromium")]
mod chromium;
mod ocr;
mod pdf;

#[cfg(feature = "chromium")]
pub use chromium::ChromiumRenderer;
pub use ocr::TesseractRecognizer;
pub use pdf::PopplerExtractor;

use crate::config::EscalationConfig;
use async_trait::async_trait;
use std::sync::Arc;

/// Full-page rendering through a browser engine
#[async_trait]
pub trait Renderer: Send + Sync {
    /// Loads the URL, lets scripts run and returns the resulting markup
    async fn render(&self, url: &str) -> Option<String>;

    /// Loads the URL and captures a PNG of the first element matching `selector`
    async fn screenshot(&self, url: &str, selector: &str) -> Option<Vec<u8>>;

    /// Releases the engine; called once when the crawl ends
    async fn close(&self);
}

/// Optical character recognition over encoded image bytes
#[async_trait]
pub trait TextRecognizer: Send + Sync {
    async fn recognize(&self, image: &[u8]) -> String;
}

/// Text recovery from PDF bytes
#[async_trait]
pub trait DocumentTextExtractor: Send + Sync {
    async fn extract_text(&self, pdf: &[u8]) -> String;
}

/// Renderer used when no browser engine is available
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopRenderer;

#[async_trait]
impl Renderer for NoopRenderer {
    async fn render(&self, _url: &str) -> Option<String> {
        None
    }

    async fn screenshot(&self, _url: &str, _selector: &str) -> Option<Vec<u8>> {
        None
    }

    async fn close(&self) {}
}

/// Recognizer that never finds text
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopRecognizer;

#[async_trait]
impl TextRecognizer for NoopRecognizer {
    async fn recognize(&self, _image: &[u8]) -> String {
        String::new()
    }
}

/// Extractor that never finds text
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopExtractor;

#[async_trait]
impl DocumentTextExtractor for NoopExtractor {
    async fn extract_text(&self, _pdf: &[u8]) -> String {
        String::new()
    }
}

/// The capabilities the orchestrator escalates to
pub struct Escalation {
    pub renderer: Box<dyn Renderer>,
    pub recognizer: Arc<dyn TextRecognizer>,
    pub documents: Box<dyn DocumentTextExtractor>,
}

impl Escalation {
    /// All capabilities disabled
    pub fn disabled() -> Self {
        Self {
            renderer: Box::new(NoopRenderer),
            recognizer: Arc::new(NoopRecognizer),
            documents: Box::new(NoopExtractor),
        }
    }

    /// Default engine bindings for the given settings
    ///
    /// Missing external tools are logged here once; the bindings themselves
    /// then return empty results.
    pub fn from_config(config: &EscalationConfig) -> Self {
        let recognizer: Arc<dyn TextRecognizer> =
            Arc::new(TesseractRecognizer::new(&config.ocr_language));
        let documents = PopplerExtractor::new(Arc::clone(&recognizer), config.pdf_ocr_page_limit);

        for tool in ["tesseract", "pdftotext", "pdftoppm"] {
            if which::which(tool).is_err() {
                tracing::warn!("{} not found on PATH; related escalation steps will yield no text", tool);
            }
        }

        Self {
            renderer: default_renderer(config),
            recognizer,
            documents: Box::new(documents),
        }
    }
}

#[cfg(feature = "chromium")]
fn default_renderer(config: &EscalationConfig) -> Box<dyn Renderer> {
    Box::new(ChromiumRenderer::new(std::time::Duration::from_secs(
        config.render_timeout_secs,
    )))
}

#[cfg(not(feature = "chromium"))]
fn default_renderer(_config: &EscalationConfig) -> Box<dyn Renderer> {
    tracing::info!("Built without the chromium feature; page rendering is disabled");
    Box::new(NoopRenderer)
}

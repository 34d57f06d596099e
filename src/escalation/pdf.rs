//! PDF text recovery with poppler
//!
//! The text layer is read with `pdftotext -layout`. When that tool is missing
//! or finds no text, the first pages are rasterized with `pdftoppm` and each
//! page image is passed to the recognizer. All temporaries live in RAII
//! handles and are removed on every exit path.

use super::{DocumentTextExtractor, TextRecognizer};
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::process::Command;

/// Rasterization resolution for OCR
const RASTER_DPI: &str = "200";

pub struct PopplerExtractor {
    pdftotext: Option<PathBuf>,
    pdftoppm: Option<PathBuf>,
    recognizer: Arc<dyn TextRecognizer>,
    page_limit: u32,
}

impl PopplerExtractor {
    /// Locates the poppler tools on PATH
    pub fn new(recognizer: Arc<dyn TextRecognizer>, page_limit: u32) -> Self {
        Self::with_tools(
            which::which("pdftotext").ok(),
            which::which("pdftoppm").ok(),
            recognizer,
            page_limit,
        )
    }

    pub fn with_tools(
        pdftotext: Option<PathBuf>,
        pdftoppm: Option<PathBuf>,
        recognizer: Arc<dyn TextRecognizer>,
        page_limit: u32,
    ) -> Self {
        Self {
            pdftotext,
            pdftoppm,
            recognizer,
            page_limit,
        }
    }

    async fn text_layer(&self, program: &Path, pdf_path: &Path) -> Result<String> {
        let output = Command::new(program)
            .arg("-layout")
            .arg("-q")
            .arg(pdf_path)
            .arg("-")
            .kill_on_drop(true)
            .output()
            .await
            .context("failed to run pdftotext")?;

        if !output.status.success() {
            bail!("pdftotext exited with {}", output.status);
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    async fn ocr_pages(&self, program: &Path, pdf_path: &Path) -> Result<String> {
        let pages_dir = tempfile::tempdir().context("failed to create raster directory")?;
        let prefix = pages_dir.path().join("page");

        let status = Command::new(program)
            .arg("-png")
            .args(["-r", RASTER_DPI])
            .args(["-f", "1"])
            .arg("-l")
            .arg(self.page_limit.to_string())
            .arg(pdf_path)
            .arg(&prefix)
            .kill_on_drop(true)
            .status()
            .await
            .context("failed to run pdftoppm")?;

        if !status.success() {
            bail!("pdftoppm exited with {}", status);
        }

        let mut pages: Vec<PathBuf> = std::fs::read_dir(pages_dir.path())?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.extension().is_some_and(|ext| ext == "png"))
            .collect();
        pages.sort();

        let mut text = String::new();
        for page in pages.iter().take(self.page_limit as usize) {
            let image = tokio::fs::read(page).await?;
            let page_text = self.recognizer.recognize(&image).await;
            if !page_text.is_empty() {
                text.push_str(&page_text);
                text.push('\n');
            }
        }

        Ok(text.trim().to_string())
    }

    async fn run(&self, pdf: &[u8]) -> Result<String> {
        let mut file = tempfile::Builder::new()
            .prefix("site-corpus-")
            .suffix(".pdf")
            .tempfile()
            .context("failed to create temporary PDF")?;
        file.write_all(pdf)?;
        file.flush()?;

        if let Some(program) = &self.pdftotext {
            match self.text_layer(program, file.path()).await {
                Ok(text) if !text.is_empty() => return Ok(text),
                Ok(_) => tracing::debug!("PDF has no text layer, trying OCR"),
                Err(e) => tracing::debug!("Text layer extraction failed: {:#}", e),
            }
        }

        match &self.pdftoppm {
            Some(program) => self.ocr_pages(program, file.path()).await,
            None => Ok(String::new()),
        }
    }
}

#[async_trait]
impl DocumentTextExtractor for PopplerExtractor {
    async fn extract_text(&self, pdf: &[u8]) -> String {
        match self.run(pdf).await {
            Ok(text) => text,
            Err(e) => {
                tracing::debug!("PDF extraction failed: {:#}", e);
                String::new()
            }
        }
    }
}

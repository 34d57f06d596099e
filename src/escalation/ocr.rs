//! Tesseract OCR binding

use super::TextRecognizer;
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

/// Runs `tesseract stdin stdout -l <lang>` on each image
pub struct TesseractRecognizer {
    program: PathBuf,
    language: String,
}

impl TesseractRecognizer {
    /// Uses the `tesseract` found on PATH
    pub fn new(language: &str) -> Self {
        let program = which::which("tesseract").unwrap_or_else(|_| PathBuf::from("tesseract"));
        Self::with_program(program, language)
    }

    pub fn with_program(program: impl Into<PathBuf>, language: &str) -> Self {
        Self {
            program: program.into(),
            language: language.to_string(),
        }
    }

    async fn run(&self, image: &[u8]) -> Result<String> {
        let mut child = Command::new(&self.program)
            .args(["stdin", "stdout", "-l", self.language.as_str()])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("failed to start {}", self.program.display()))?;

        let mut stdin = child.stdin.take().context("tesseract stdin unavailable")?;
        let feed = async move {
            let written = stdin.write_all(image).await;
            drop(stdin);
            written
        };

        let (written, output) = tokio::join!(feed, child.wait_with_output());
        let output = output.context("tesseract did not finish")?;

        if !output.status.success() {
            bail!(
                "tesseract exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        written.context("failed to send image to tesseract")?;

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

#[async_trait]
impl TextRecognizer for TesseractRecognizer {
    async fn recognize(&self, image: &[u8]) -> String {
        match self.run(image).await {
            Ok(text) => text,
            Err(e) => {
                tracing::debug!("OCR failed: {:#}", e);
                String::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_binary_yields_empty_text() {
        let recognizer =
            TesseractRecognizer::with_program("/nonexistent/site-corpus-tesseract", "eng");
        assert_eq!(recognizer.recognize(b"not an image").await, "");
    }
}

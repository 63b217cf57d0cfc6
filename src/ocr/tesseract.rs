//! Tesseract OCR engine.
//!
//! Rasterizes PDF pages with pdftoppm and runs the tesseract binary on each
//! page image. Scanned registry ledgers carry no text layer, so every page
//! goes through OCR.

use std::path::{Path, PathBuf};
use std::process::Command;

use async_trait::async_trait;
use tempfile::TempDir;
use tracing::debug;

use super::{OcrEngine, OcrError};

/// Rasterization resolution. 300 dpi is enough for ledger print.
const RASTER_DPI: &str = "300";

pub struct TesseractOcr {
    language: String,
}

impl TesseractOcr {
    pub fn new() -> Self {
        Self {
            language: "jpn".to_string(),
        }
    }

    pub fn with_language(language: impl Into<String>) -> Self {
        Self {
            language: language.into(),
        }
    }

    /// Convert all PDF pages to PNG images in `output_dir`.
    fn rasterize(pdf_path: &Path, output_dir: &Path) -> Result<Vec<PathBuf>, OcrError> {
        let output_prefix = output_dir.join("page");

        let status = Command::new("pdftoppm")
            .args(["-png", "-r", RASTER_DPI])
            .arg(pdf_path)
            .arg(&output_prefix)
            .status();

        match status {
            Ok(s) if s.success() => {}
            Ok(_) => {
                return Err(OcrError::OcrFailed(
                    "pdftoppm failed to convert PDF".to_string(),
                ))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(OcrError::BackendNotAvailable(
                    "pdftoppm not found (install poppler-utils)".to_string(),
                ))
            }
            Err(e) => return Err(OcrError::Io(e)),
        }

        // pdftoppm names files page-01.png, page-02.png, ...; lexicographic
        // order matches page order because the index is zero-padded.
        let mut pages: Vec<PathBuf> = std::fs::read_dir(output_dir)?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.extension().map(|e| e == "png").unwrap_or(false))
            .collect();
        pages.sort();

        if pages.is_empty() {
            return Err(OcrError::OcrFailed("no pages rasterized".to_string()));
        }
        Ok(pages)
    }

    /// Run Tesseract on one page image.
    fn run_tesseract(&self, image_path: &Path) -> Result<String, OcrError> {
        let output = Command::new("tesseract")
            .arg(image_path)
            .arg("stdout")
            .args(["-l", &self.language])
            .output();

        match output {
            Ok(output) => {
                if output.status.success() {
                    Ok(String::from_utf8_lossy(&output.stdout).to_string())
                } else {
                    let stderr = String::from_utf8_lossy(&output.stderr);
                    Err(OcrError::OcrFailed(format!("tesseract failed: {}", stderr)))
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(OcrError::BackendNotAvailable(
                    "tesseract not found (install tesseract-ocr)".to_string(),
                ))
            }
            Err(e) => Err(OcrError::Io(e)),
        }
    }

    fn extract_blocking(&self, pdf_path: &Path) -> Result<String, OcrError> {
        let temp_dir = TempDir::new()?;
        let pages = Self::rasterize(pdf_path, temp_dir.path())?;
        debug!("rasterized {} pages from {}", pages.len(), pdf_path.display());

        let mut all_text = Vec::with_capacity(pages.len());
        for page in &pages {
            all_text.push(self.run_tesseract(page)?);
        }
        Ok(all_text.join("\n"))
    }
}

impl Default for TesseractOcr {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl OcrEngine for TesseractOcr {
    async fn pdf_to_text(&self, pdf_path: &Path) -> Result<String, OcrError> {
        let language = self.language.clone();
        let pdf_path = pdf_path.to_path_buf();
        tokio::task::spawn_blocking(move || {
            TesseractOcr::with_language(language).extract_blocking(&pdf_path)
        })
        .await
        .map_err(|e| OcrError::OcrFailed(format!("OCR task panicked: {}", e)))?
    }
}

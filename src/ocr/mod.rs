//! OCR collaborator interface.
//!
//! The pipeline treats OCR as a black box that turns a PDF into plain text,
//! page texts concatenated in page order. The bundled engine shells out to
//! pdftoppm (Poppler) and Tesseract; anything else that satisfies
//! `OcrEngine` can be substituted.

mod tesseract;

pub use tesseract::TesseractOcr;

use std::path::Path;

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum OcrError {
    #[error("OCR backend not available: {0}")]
    BackendNotAvailable(String),
    #[error("OCR failed: {0}")]
    OcrFailed(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// PDF-to-text capability.
#[async_trait]
pub trait OcrEngine: Send + Sync {
    /// Extract text from every page of a PDF, concatenated in page order.
    async fn pdf_to_text(&self, pdf_path: &Path) -> Result<String, OcrError>;
}

//! Text Extraction Service.
//!
//! Three operations over ledger and certificate PDFs: registry office name,
//! inheritance-transfer addresses, and owner facts. Each OCRs the document
//! and delegates the semantic part to the language model; the response text
//! contract is enforced here with pure, unit-testable helpers.

use std::path::Path;
use std::sync::OnceLock;

use async_trait::async_trait;
use regex::Regex;
use thiserror::Error;
use tracing::{debug, info};

use crate::llm::{prompts, LlmClient, LlmError};
use crate::models::OwnerInfo;
use crate::ocr::{OcrEngine, OcrError};

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("OCR error: {0}")]
    Ocr(#[from] OcrError),
    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),
}

/// Semantic extraction capability consumed by the orchestrator.
#[async_trait]
pub trait Extractor: Send + Sync {
    /// Single registry office name, trimmed, no surrounding explanation.
    async fn registry_office(&self, pdf_path: &Path) -> Result<String, ExtractError>;

    /// Every address whose ledger line is an inheritance/bequest ownership
    /// transfer. Duplicates preserved; enumeration markers and trailing
    /// "外N" suffixes stripped.
    async fn inheritance_addresses(&self, pdf_path: &Path) -> Result<Vec<String>, ExtractError>;

    /// Owner facts from a certificate document. `None` when any required
    /// field is missing from the response (the record is dropped).
    async fn owner_info(&self, pdf_path: &Path) -> Result<Option<OwnerInfo>, ExtractError>;
}

/// Extraction service backed by an OCR engine and the LLM client.
pub struct ExtractionService<O: OcrEngine> {
    ocr: O,
    llm: LlmClient,
}

impl<O: OcrEngine> ExtractionService<O> {
    pub fn new(ocr: O, llm: LlmClient) -> Self {
        Self { ocr, llm }
    }
}

#[async_trait]
impl<O: OcrEngine> Extractor for ExtractionService<O> {
    async fn registry_office(&self, pdf_path: &Path) -> Result<String, ExtractError> {
        let text = self.ocr.pdf_to_text(pdf_path).await?;
        let prompt = prompts::render(prompts::REGISTRY_OFFICE_PROMPT, &text);
        let response = self.llm.complete(&prompt).await?;
        Ok(response.trim().to_string())
    }

    async fn inheritance_addresses(&self, pdf_path: &Path) -> Result<Vec<String>, ExtractError> {
        let text = self.ocr.pdf_to_text(pdf_path).await?;
        let prompt = prompts::render(prompts::INHERITANCE_ADDRESSES_PROMPT, &text);
        let response = self.llm.complete(&prompt).await?;
        let addresses = clean_address_lines(&response);
        info!(
            "extracted {} inheritance addresses from {}",
            addresses.len(),
            pdf_path.display()
        );
        Ok(addresses)
    }

    async fn owner_info(&self, pdf_path: &Path) -> Result<Option<OwnerInfo>, ExtractError> {
        let text = self.ocr.pdf_to_text(pdf_path).await?;
        let prompt = prompts::render(prompts::OWNER_INFO_PROMPT, &text);
        let response = self.llm.complete(&prompt).await?;
        let info = parse_owner_response(&response);
        if info.is_none() {
            debug!(
                "incomplete owner response for {}, dropping record",
                pdf_path.display()
            );
        }
        Ok(info)
    }
}

fn enumeration_prefix() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(\d+\.\s*|[-・\s]*)").expect("valid prefix pattern"))
}

fn address_line_filter() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[都道府県市区町村].*\d").expect("valid filter pattern"))
}

fn others_suffix() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s?外\s?\d+").expect("valid suffix pattern"))
}

/// Clean raw model output into address lines.
///
/// Strips leading enumeration markers, keeps only lines that contain a
/// prefecture/city/town-class character and a digit (drops explanatory
/// lines the model emits around the list), and removes "外N" suffixes.
pub fn clean_address_lines(raw: &str) -> Vec<String> {
    raw.lines()
        .map(|line| enumeration_prefix().replace(line, "").trim().to_string())
        .filter(|line| address_line_filter().is_match(line))
        .map(|line| others_suffix().replace_all(&line, "").trim().to_string())
        .collect()
}

/// Parse the fixed-format owner response.
///
/// All three fields are required; a response missing any of them yields
/// `None` (skip on partial extraction).
pub fn parse_owner_response(response: &str) -> Option<OwnerInfo> {
    let name = capture_field(response, "氏名")?;
    let owner_address = capture_field(response, "所有者住所")?;
    let property_address = capture_field(response, "不動産所在地")?;
    Some(OwnerInfo {
        name,
        owner_address,
        property_address,
    })
}

fn capture_field(response: &str, label: &str) -> Option<String> {
    // Whitespace class excludes newline so an empty field does not capture
    // the following line.
    let pattern = Regex::new(&format!(r"{label}:[^\S\n]*(.+)")).expect("valid field pattern");
    pattern
        .captures(response)
        .map(|c| c[1].trim().to_string())
        .filter(|s| !s.is_empty())
}

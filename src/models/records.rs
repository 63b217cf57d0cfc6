//! Pipeline record types.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One ownership-certificate PDF fetched from the registry portal.
///
/// Immutable once written; the file itself lives in the run directory and is
/// referenced, never copied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadedCertificate {
    /// Address the certificate was requested for.
    pub address: String,
    /// Saved PDF location on disk.
    pub path: PathBuf,
    /// When the download completed.
    pub fetched_at: DateTime<Utc>,
}

/// Structured owner facts parsed from one certificate document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnerInfo {
    /// Owner name (氏名).
    pub name: String,
    /// Owner address (所有者住所).
    pub owner_address: String,
    /// Property location (不動産所在地).
    pub property_address: String,
}

/// One extracted ownership fact, enriched with a postal code in a later
/// stage. Certificates where any required field was missing never produce a
/// record (skip on partial extraction).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnerRecord {
    /// Source certificate PDF path.
    pub pdf_path: PathBuf,
    pub name: String,
    pub owner_address: String,
    pub property_address: String,
    /// Resolved postal code (`NNN-NNNN`), populated by the merge stage.
    /// `None` when the reference dataset had no match.
    pub postal_code: Option<String>,
}

impl OwnerRecord {
    pub fn new(pdf_path: PathBuf, info: OwnerInfo) -> Self {
        Self {
            pdf_path,
            name: info.name,
            owner_address: info.owner_address,
            property_address: info.property_address,
            postal_code: None,
        }
    }
}

/// Output table paths for one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputFiles {
    pub owner_info: PathBuf,
    pub zipcode_info: PathBuf,
    pub final_output: PathBuf,
}

/// Result payload returned to the caller after a completed run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineResult {
    pub run_id: String,
    /// Number of certificate PDFs downloaded.
    pub pdf_count: usize,
    /// Number of owner records extracted (always <= pdf_count).
    pub owner_count: usize,
    pub output_files: OutputFiles,
}

/// One row of the KEN_ALL postal reference dataset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostalCodeEntry {
    /// 7-digit postal code, unformatted.
    pub code: String,
    pub prefecture: String,
    pub city: String,
    pub town: String,
    pub prefecture_kana: String,
    pub city_kana: String,
    pub town_kana: String,
}

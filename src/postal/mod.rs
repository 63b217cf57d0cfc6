//! Postal code lookup against the Japan Post KEN_ALL reference dataset.
//!
//! An address string is normalized, split into prefecture/city/town with a
//! fixed pattern, and matched against the reference table. The table is
//! loaded once and shared read-only across the process.

mod normalize;
mod table;

pub use normalize::normalize;
pub use table::{PostalCodeResult, PostalTable, NOT_FOUND_SENTINEL};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PostalError {
    /// The address does not match the prefecture/city pattern. Localized to
    /// one record's enrichment; never aborts the run.
    #[error("address does not match the prefecture/city pattern: {0}")]
    MalformedAddress(String),
    #[error("failed to read reference dataset: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse reference dataset: {0}")]
    Csv(#[from] csv::Error),
    #[error("reference dataset row too short: expected {expected} columns, got {got}")]
    ShortRow { expected: usize, got: usize },
}

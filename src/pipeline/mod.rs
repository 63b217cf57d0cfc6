//! Pipeline orchestration.
//!
//! Five strictly sequential stages: address extraction, certificate
//! acquisition, owner-info extraction, postal-code resolution, and the
//! final left-join merge. Every stage persists its table before the next
//! one starts; a failed run leaves completed stage outputs on disk.

mod csv_io;
mod runner;

pub use csv_io::{merge_tables, write_owner_info, write_zipcode_info};
pub use runner::Pipeline;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// Unrecoverable failure inside one stage; aborts the run.
    #[error("stage '{stage}' failed: {message}")]
    Stage {
        stage: &'static str,
        message: String,
    },
    #[error("stage '{stage}' timed out")]
    StageTimeout { stage: &'static str },
    #[error("pipeline cancelled")]
    Cancelled,
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl PipelineError {
    pub(crate) fn stage(stage: &'static str, err: impl std::fmt::Display) -> Self {
        Self::Stage {
            stage,
            message: err.to_string(),
        }
    }
}

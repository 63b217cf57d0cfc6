//! Domain models shared across the pipeline.

mod records;
mod task;

pub use records::{
    DownloadedCertificate, OutputFiles, OwnerInfo, OwnerRecord, PipelineResult, PostalCodeEntry,
};
pub use task::{TaskRecord, TaskStatus};

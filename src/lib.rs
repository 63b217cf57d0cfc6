//! Toukiflow - real-estate inheritance registry acquisition pipeline.
//!
//! Given a scanned registry ledger PDF, extracts the addresses of
//! inheritance/bequest ownership transfers, drives the external registry
//! portal to download one ownership-certificate PDF per address, extracts
//! the owner facts from each certificate, resolves postal codes against the
//! KEN_ALL reference dataset, and merges everything into a final table.

pub mod cli;
pub mod config;
pub mod extract;
pub mod llm;
pub mod models;
pub mod ocr;
pub mod pipeline;
pub mod portal;
pub mod postal;
pub mod tasks;
pub mod utils;

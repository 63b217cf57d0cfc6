//! Language model collaborator.
//!
//! Semantic extraction (registry office name, inheritance addresses, owner
//! facts) is delegated to an external chat-completion service. This module
//! owns the HTTP client and the fixed prompts; the orchestrator only
//! depends on the text contract of the responses.

mod client;
pub mod prompts;

pub use client::{LlmClient, LlmConfig, LlmError};

//! crates/reading_adventure_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of specific implementations like CSV files or LLM APIs.

use async_trait::async_trait;
use crate::domain::{GeneratedContent, PassageRecord, ProgressRecord};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., filesystem, network).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Content generation failed: {0}")]
    Generation(String),
    #[error("Storage failure: {0}")]
    Storage(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

/// Persistence for passages and learner progress.
///
/// Loads never fail: a missing or corrupt store yields an empty history or
/// default progress. Writes report failures so the caller can tell the learner.
pub trait RecordStore: Send + Sync {
    /// Appends one passage to the history.
    fn append_passage(&self, record: &PassageRecord) -> PortResult<()>;

    /// Returns every readable passage in the order it was stored.
    fn load_all_passages(&self) -> Vec<PassageRecord>;

    /// Replaces the stored progress with `record`.
    fn save_progress(&self, record: &ProgressRecord) -> PortResult<()>;

    fn load_progress(&self) -> ProgressRecord;
}

#[async_trait]
pub trait ContentGenerator: Send + Sync {
    /// Produces a new passage with its vocabulary, questions and quiz.
    async fn generate(&self) -> PortResult<GeneratedContent>;
}

#[async_trait]
pub trait TextToSpeechService: Send + Sync {
    /// Generates audio data from a string of text.
    async fn generate_audio(&self, text: &str) -> PortResult<Vec<u8>>;
}

//! Error types for Cognimetrics
//!
//! Missing or insufficient task data is never an error: it degrades to a zero
//! domain score plus a validity alert. These variants cover contract violations
//! detected at construction time and failures in the outer surfaces.

use thiserror::Error;

/// Errors that can occur when building inputs or driving the engine
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Invalid target question count: {0} (must be at least 1)")]
    InvalidTargetCount(usize),

    #[error("Malformed question bank item {id}: {reason}")]
    MalformedBankItem { id: u32, reason: String },

    #[error("Duplicate question id in bank: {0}")]
    DuplicateQuestionId(u32),

    #[error("Invalid reaction time: {0} ms")]
    InvalidReactionTime(f64),

    #[error("Answer references unknown question: {0}")]
    UnknownQuestion(u32),

    #[error("Answer option {chosen} out of range for question {id} ({options} options)")]
    AnswerOutOfRange { id: u32, chosen: usize, options: usize },

    #[error("Invalid normalized score: {0} (must be within 0..=1)")]
    InvalidNormalizedScore(f64),

    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Raised by [`crate::store::AssessmentStore`] implementations
    #[error("Storage error: {0}")]
    StorageError(String),
}

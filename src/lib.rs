//! CogniMetrics - Cognitive assessment scoring and adaptive item selection
//!
//! The engine turns one session of raw task data into a composite cognitive
//! record through a deterministic pipeline: feature extraction → validity
//! gating → domain scoring → weighted aggregation.
//!
//! ## Modules
//!
//! - **Scoring Pipeline**: Score vigilance, memory span and questionnaire data
//!   into attention, memory, functional and global indices
//! - **Adaptive Selection**: Draw the next questionnaire from a subject's
//!   response history, favouring categories with poor prior answers
//! - **Trend Analysis**: Classify the trajectory between the two latest sessions

pub mod bank;
pub mod composite;
pub mod config;
pub mod error;
pub mod features;
pub mod pipeline;
pub mod scoring;
pub mod selector;
pub mod store;
pub mod trend;
pub mod types;
pub mod validity;

// FFI bindings for C interop (always available for cdylib/staticlib builds)
pub mod ffi;

pub use bank::QuestionBank;
pub use config::EngineConfig;
pub use error::EngineError;
pub use pipeline::{compute_session, derive_response_log, AssessmentEngine, SessionInput, SessionOutcome};
pub use selector::select_adaptive_questions;
pub use store::{generate_patient_id, AssessmentStore, InMemoryStore};
pub use trend::classify_trend;
pub use types::{
    CompositeAssessmentRecord, MemoryRoundResult, QuestionBankItem, QuestionCategory,
    QuestionResponseLogEntry, ReactionSample, RiskLevel, TrendReport, TrendStatus, ValidityAlert,
};

/// Engine version stamped on store exports
pub const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name stamped on store exports
pub const PRODUCER_NAME: &str = "cognimetrics";

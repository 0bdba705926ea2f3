//! Engine configuration
//!
//! Only session-shaping knobs are configurable. Scoring weights, thresholds
//! and validity minimums are fixed constants in their modules.

use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::selector::{DEFAULT_HISTORY_WINDOW, DEFAULT_TARGET_COUNT};

/// Session-shaping configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Questions drawn for each questionnaire administration
    pub questions_per_session: usize,
    /// Most recent response-log entries considered by the selector
    pub response_history_window: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            questions_per_session: DEFAULT_TARGET_COUNT,
            response_history_window: DEFAULT_HISTORY_WINDOW,
        }
    }
}

impl EngineConfig {
    /// Load configuration from JSON; missing fields take their defaults
    pub fn from_json(json: &str) -> Result<Self, EngineError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        if self.questions_per_session == 0 {
            return Err(EngineError::InvalidTargetCount(self.questions_per_session));
        }
        Ok(())
    }
}

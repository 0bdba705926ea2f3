//! Core data types for Cognimetrics
//!
//! This module defines the raw task samples, the questionnaire catalog and log
//! entries, and the composite record produced once per completed session.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// Responses faster than this are physiologically implausible (false starts)
pub const FALSE_START_FLOOR_MS: f64 = 100.0;

/// Responses slower than this are lapses of attention
pub const LAPSE_THRESHOLD_MS: f64 = 500.0;

/// Questionnaire category
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum QuestionCategory {
    Safety,
    Memory,
    Executive,
    Mood,
}

impl QuestionCategory {
    /// All categories in canonical order
    pub const ALL: [QuestionCategory; 4] = [
        QuestionCategory::Safety,
        QuestionCategory::Memory,
        QuestionCategory::Executive,
        QuestionCategory::Mood,
    ];

    /// Position of the category in [`QuestionCategory::ALL`]
    pub fn index(self) -> usize {
        match self {
            QuestionCategory::Safety => 0,
            QuestionCategory::Memory => 1,
            QuestionCategory::Executive => 2,
            QuestionCategory::Mood => 3,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            QuestionCategory::Safety => "Safety",
            QuestionCategory::Memory => "Memory",
            QuestionCategory::Executive => "Executive",
            QuestionCategory::Mood => "Mood",
        }
    }
}

impl std::fmt::Display for QuestionCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One value per questionnaire category.
///
/// Every category is always present, so a table built from
/// [`CategoryTable::splat`] can never be missing a key.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct CategoryTable<T> {
    #[serde(rename = "Safety")]
    pub safety: T,
    #[serde(rename = "Memory")]
    pub memory: T,
    #[serde(rename = "Executive")]
    pub executive: T,
    #[serde(rename = "Mood")]
    pub mood: T,
}

impl<T: Clone> CategoryTable<T> {
    /// Table with the same value for every category
    pub fn splat(value: T) -> Self {
        Self {
            safety: value.clone(),
            memory: value.clone(),
            executive: value.clone(),
            mood: value,
        }
    }
}

impl<T> CategoryTable<T> {
    pub fn get(&self, category: QuestionCategory) -> &T {
        match category {
            QuestionCategory::Safety => &self.safety,
            QuestionCategory::Memory => &self.memory,
            QuestionCategory::Executive => &self.executive,
            QuestionCategory::Mood => &self.mood,
        }
    }

    pub fn get_mut(&mut self, category: QuestionCategory) -> &mut T {
        match category {
            QuestionCategory::Safety => &mut self.safety,
            QuestionCategory::Memory => &mut self.memory,
            QuestionCategory::Executive => &mut self.executive,
            QuestionCategory::Mood => &mut self.mood,
        }
    }

    /// Iterate in canonical category order
    pub fn iter(&self) -> impl Iterator<Item = (QuestionCategory, &T)> {
        QuestionCategory::ALL.into_iter().map(move |c| (c, self.get(c)))
    }
}

/// Weighted questionnaire score accumulated per category
pub type CategoryScores = CategoryTable<f64>;

/// Adaptive sampling weight per category
pub type CategoryWeights = CategoryTable<f64>;

/// A single psychomotor vigilance response.
///
/// Deserialized samples always carry flags consistent with their reaction
/// time; a false start flagged by the capture layer is kept.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "ReactionSampleWire")]
pub struct ReactionSample {
    /// When the response was captured
    pub timestamp: DateTime<Utc>,
    /// Elapsed time between stimulus and response in milliseconds
    pub reaction_time_ms: f64,
    /// Response preceded the go-signal or fell below the plausibility floor
    pub is_false_start: bool,
    /// Valid but abnormally slow response
    pub is_lapse: bool,
}

#[derive(Deserialize)]
struct ReactionSampleWire {
    timestamp: DateTime<Utc>,
    reaction_time_ms: f64,
    #[serde(default)]
    is_false_start: bool,
    #[serde(default)]
    is_lapse: bool,
}

impl From<ReactionSampleWire> for ReactionSample {
    fn from(wire: ReactionSampleWire) -> Self {
        Self {
            timestamp: wire.timestamp,
            reaction_time_ms: wire.reaction_time_ms,
            is_false_start: wire.is_false_start,
            is_lapse: wire.is_lapse,
        }
        .with_derived_flags()
    }
}

impl ReactionSample {
    /// Reconcile the flags with the reaction time: anything under
    /// [`FALSE_START_FLOOR_MS`] is a false start and anything over
    /// [`LAPSE_THRESHOLD_MS`] is a lapse.
    pub fn with_derived_flags(mut self) -> Self {
        self.is_false_start |= self.reaction_time_ms < FALSE_START_FLOOR_MS;
        self.is_lapse = self.reaction_time_ms > LAPSE_THRESHOLD_MS;
        self
    }

    /// Build a sample from a timed response, deriving the false-start and
    /// lapse flags from [`FALSE_START_FLOOR_MS`] and [`LAPSE_THRESHOLD_MS`].
    pub fn from_response(
        timestamp: DateTime<Utc>,
        reaction_time_ms: f64,
    ) -> Result<Self, EngineError> {
        let sample = Self {
            timestamp,
            reaction_time_ms,
            is_false_start: false,
            is_lapse: false,
        }
        .with_derived_flags();
        sample.validate()?;
        Ok(sample)
    }

    /// A response given before the go-signal appeared
    pub fn premature(timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp,
            reaction_time_ms: 0.0,
            is_false_start: true,
            is_lapse: false,
        }
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        if !self.reaction_time_ms.is_finite() || self.reaction_time_ms < 0.0 {
            return Err(EngineError::InvalidReactionTime(self.reaction_time_ms));
        }
        Ok(())
    }
}

/// Outcome of one sequence-recall round of the memory span task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryRoundResult {
    /// Difficulty level of the round
    pub level: u32,
    /// Whether the full sequence was reproduced
    pub success: bool,
    /// Number of cells in the presented sequence
    pub sequence_length: u32,
    /// Mean latency between recall clicks in milliseconds
    pub avg_click_latency_ms: f64,
}

/// Static questionnaire catalog entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionBankItem {
    pub id: u32,
    pub category: QuestionCategory,
    pub text: String,
    /// Ordered from best (index 0) to worst functional status
    pub options: Vec<String>,
    pub correct_index: usize,
    /// Contribution of the item to its category and to the functional index
    pub weight: f64,
}

impl QuestionBankItem {
    pub fn new(
        id: u32,
        category: QuestionCategory,
        text: impl Into<String>,
        options: &[&str],
        weight: f64,
    ) -> Result<Self, EngineError> {
        let item = Self {
            id,
            category,
            text: text.into(),
            options: options.iter().map(|o| o.to_string()).collect(),
            correct_index: 0,
            weight,
        };
        item.validate()?;
        Ok(item)
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        if self.options.len() < 2 {
            return Err(EngineError::MalformedBankItem {
                id: self.id,
                reason: format!("needs at least 2 options, has {}", self.options.len()),
            });
        }
        if !self.weight.is_finite() || self.weight <= 0.0 {
            return Err(EngineError::MalformedBankItem {
                id: self.id,
                reason: format!("weight must be positive, got {}", self.weight),
            });
        }
        if self.correct_index >= self.options.len() {
            return Err(EngineError::MalformedBankItem {
                id: self.id,
                reason: format!("correct index {} out of range", self.correct_index),
            });
        }
        Ok(())
    }

    /// Normalized answer quality: 1.0 for the best option, 0.0 for the worst
    pub fn item_score(&self, chosen_index: usize) -> f64 {
        let last = (self.options.len() - 1) as f64;
        let chosen = chosen_index.min(self.options.len() - 1) as f64;
        (last - chosen) / last
    }
}

/// Historical record of one prior answer's quality
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionResponseLogEntry {
    pub patient_id: String,
    pub question_id: u32,
    pub category: QuestionCategory,
    /// Answer quality in [0, 1], 1.0 meaning the best option was chosen
    pub score_normalized: f64,
    pub timestamp: DateTime<Utc>,
}

impl QuestionResponseLogEntry {
    pub fn new(
        patient_id: impl Into<String>,
        question_id: u32,
        category: QuestionCategory,
        score_normalized: f64,
        timestamp: DateTime<Utc>,
    ) -> Result<Self, EngineError> {
        if !(0.0..=1.0).contains(&score_normalized) {
            return Err(EngineError::InvalidNormalizedScore(score_normalized));
        }
        Ok(Self {
            patient_id: patient_id.into(),
            question_id,
            category,
            score_normalized,
            timestamp,
        })
    }
}

/// Summary statistics from the vigilance task
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct AttentionMetrics {
    /// Responses that were not false starts
    pub valid_responses: u32,
    pub mean_rt_ms: f64,
    /// Bessel-corrected sample standard deviation
    pub sd_rt_ms: f64,
    /// sd / mean as a percentage
    pub coefficient_of_variation: f64,
    pub lapses: u32,
    pub false_starts: u32,
    /// Mean of the second half minus mean of the first half
    pub fatigue_index_ms: f64,
}

/// Summary statistics from the memory span task
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct MemoryMetrics {
    pub rounds_attempted: u32,
    pub max_span: u32,
    pub avg_recall_latency_ms: f64,
    /// Items recalled per second
    pub throughput: f64,
}

/// Accumulated questionnaire totals
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct FunctionalMetrics {
    pub answered: u32,
    pub total_weighted_score: f64,
    pub total_weight: f64,
    pub category_scores: CategoryScores,
}

/// Raw metrics retained on the composite record
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct RawMetrics {
    pub attention: AttentionMetrics,
    pub memory: MemoryMetrics,
    pub functional: FunctionalMetrics,
}

/// Per-domain validity outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ValidityFlags {
    pub attention: bool,
    pub memory: bool,
    pub functional: bool,
}

impl ValidityFlags {
    pub fn all_valid(&self) -> bool {
        self.attention && self.memory && self.functional
    }
}

/// Diagnostic alert raised when a domain fails its validity gate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValidityAlert {
    #[serde(rename = "ATTENTION TEST INVALID")]
    AttentionInvalid,
    #[serde(rename = "MEMORY TEST SKIPPED")]
    MemorySkipped,
    #[serde(rename = "FUNCTIONAL REVIEW INCOMPLETE")]
    FunctionalIncomplete,
}

impl ValidityAlert {
    pub fn as_str(self) -> &'static str {
        match self {
            ValidityAlert::AttentionInvalid => "ATTENTION TEST INVALID",
            ValidityAlert::MemorySkipped => "MEMORY TEST SKIPPED",
            ValidityAlert::FunctionalIncomplete => "FUNCTIONAL REVIEW INCOMPLETE",
        }
    }
}

impl std::fmt::Display for ValidityAlert {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Categorical risk band derived from the global index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiskLevel {
    High,
    Moderate,
    #[serde(rename = "Low Risk")]
    Low,
}

impl RiskLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            RiskLevel::High => "High",
            RiskLevel::Moderate => "Moderate",
            RiskLevel::Low => "Low Risk",
        }
    }
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The engine's output unit, created once per completed session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompositeAssessmentRecord {
    pub patient_id: String,
    pub date: DateTime<Utc>,
    /// Attention / processing speed index (0-100)
    pub attention_index: f64,
    /// Working memory index (0-100)
    pub memory_index: f64,
    /// Functional questionnaire index (0-100)
    pub functional_index: f64,
    /// Weighted global index (0-100)
    pub global_index: f64,
    pub risk_level: RiskLevel,
    pub raw_metrics: RawMetrics,
    pub validity_flags: ValidityFlags,
    /// Alerts for every domain that failed its validity gate
    #[serde(default)]
    pub alerts: Vec<ValidityAlert>,
    /// Weighted questionnaire score per category, zero when functional is invalid
    #[serde(default)]
    pub category_scores: CategoryScores,
    pub insight_text: String,
}

/// Longitudinal status label
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrendStatus {
    #[serde(rename = "Baseline Established")]
    BaselineEstablished,
    #[serde(rename = "Showing Improvement")]
    ShowingImprovement,
    #[serde(rename = "Decline Detected")]
    DeclineDetected,
    #[serde(rename = "Cognitively Stable")]
    CognitivelyStable,
}

impl TrendStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            TrendStatus::BaselineEstablished => "Baseline Established",
            TrendStatus::ShowingImprovement => "Showing Improvement",
            TrendStatus::DeclineDetected => "Decline Detected",
            TrendStatus::CognitivelyStable => "Cognitively Stable",
        }
    }
}

impl std::fmt::Display for TrendStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Direction of the most recent change in the global index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendDirection {
    Up,
    Down,
    Flat,
}

/// Result of trend classification
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrendReport {
    pub status: TrendStatus,
    pub direction: TrendDirection,
    /// Latest minus previous global index, absent for a baseline
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delta: Option<f64>,
}

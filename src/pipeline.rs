//! Pipeline orchestration
//!
//! This module provides the public API of the engine. Scoring runs
//! Extract → Gate → Score → Aggregate over one session snapshot; the stateful
//! [`AssessmentEngine`] ties scoring, adaptive selection and trend analysis to
//! an [`AssessmentStore`].

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::bank::QuestionBank;
use crate::composite::aggregate;
use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::features::{extract_attention, extract_functional, extract_memory};
use crate::selector::select_with_window;
use crate::store::AssessmentStore;
use crate::trend::classify_trend;
use crate::types::{
    CompositeAssessmentRecord, MemoryRoundResult, QuestionBankItem, QuestionResponseLogEntry,
    RawMetrics, ReactionSample, TrendReport,
};
use crate::validity::gate;

/// Everything captured during one assessment session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionInput {
    pub patient_id: String,
    pub date: DateTime<Utc>,
    #[serde(default)]
    pub reactions: Vec<ReactionSample>,
    #[serde(default)]
    pub memory_rounds: Vec<MemoryRoundResult>,
    /// Chosen option index keyed by question id
    #[serde(default)]
    pub answers: HashMap<u32, usize>,
    /// The question set that was administered
    #[serde(default)]
    pub active_questions: Vec<QuestionBankItem>,
}

impl SessionInput {
    /// Build a validated session snapshot; reaction flags are reconciled
    /// with their reaction times
    pub fn new(
        patient_id: impl Into<String>,
        date: DateTime<Utc>,
        reactions: Vec<ReactionSample>,
        memory_rounds: Vec<MemoryRoundResult>,
        answers: HashMap<u32, usize>,
        active_questions: Vec<QuestionBankItem>,
    ) -> Result<Self, EngineError> {
        let input = Self {
            patient_id: patient_id.into(),
            date,
            reactions: reactions
                .into_iter()
                .map(ReactionSample::with_derived_flags)
                .collect(),
            memory_rounds,
            answers,
            active_questions,
        };
        input.validate()?;
        Ok(input)
    }

    /// Parse and validate a session snapshot from JSON
    pub fn from_json(json: &str) -> Result<Self, EngineError> {
        let input: Self = serde_json::from_str(json)?;
        input.validate()?;
        Ok(input)
    }

    /// Check the session against its contracts: sane reaction times,
    /// well-formed questions, and answers that point at real options.
    pub fn validate(&self) -> Result<(), EngineError> {
        for sample in &self.reactions {
            sample.validate()?;
        }
        for item in &self.active_questions {
            item.validate()?;
        }
        for (&id, &chosen) in &self.answers {
            let item = self
                .active_questions
                .iter()
                .find(|q| q.id == id)
                .ok_or(EngineError::UnknownQuestion(id))?;
            if chosen >= item.options.len() {
                return Err(EngineError::AnswerOutOfRange {
                    id,
                    chosen,
                    options: item.options.len(),
                });
            }
        }
        Ok(())
    }
}

/// Score one session into a composite record.
///
/// Never fails: a domain without enough data scores 0 and raises an alert.
pub fn compute_session(input: &SessionInput) -> CompositeAssessmentRecord {
    let metrics = RawMetrics {
        attention: extract_attention(&input.reactions),
        memory: extract_memory(&input.memory_rounds),
        functional: extract_functional(&input.active_questions, &input.answers),
    };
    debug!(patient_id = %input.patient_id, ?metrics, "session metrics extracted");

    aggregate(&input.patient_id, input.date, gate(metrics))
}

/// Turn a session's answers into response-log entries for future selection
pub fn derive_response_log(input: &SessionInput) -> Vec<QuestionResponseLogEntry> {
    input
        .active_questions
        .iter()
        .filter_map(|item| {
            let &chosen = input.answers.get(&item.id)?;
            Some(QuestionResponseLogEntry {
                patient_id: input.patient_id.clone(),
                question_id: item.id,
                category: item.category,
                score_normalized: item.item_score(chosen),
                timestamp: input.date,
            })
        })
        .collect()
}

/// Result of completing a session through [`AssessmentEngine`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionOutcome {
    pub record: CompositeAssessmentRecord,
    pub trend: TrendReport,
}

/// Stateful engine bound to a storage collaborator.
///
/// Callers must not run two operations for the same subject concurrently.
pub struct AssessmentEngine<S: AssessmentStore> {
    store: S,
    bank: QuestionBank,
    config: EngineConfig,
}

impl<S: AssessmentStore> AssessmentEngine<S> {
    /// Engine over the standard question bank with default configuration
    pub fn new(store: S) -> Self {
        Self {
            store,
            bank: QuestionBank::standard(),
            config: EngineConfig::default(),
        }
    }

    pub fn with_config(store: S, bank: QuestionBank, config: EngineConfig) -> Result<Self, EngineError> {
        config.validate()?;
        Ok(Self {
            store,
            bank,
            config,
        })
    }

    /// Draw the next questionnaire for a subject from their response log
    pub fn prepare_questionnaire<R: Rng + ?Sized>(
        &self,
        patient_id: &str,
        rng: &mut R,
    ) -> Result<Vec<QuestionBankItem>, EngineError> {
        let log = self.store.load_response_log(patient_id)?;
        select_with_window(
            patient_id,
            &log,
            &self.bank,
            self.config.questions_per_session,
            self.config.response_history_window,
            rng,
        )
    }

    /// Score a session, persist the record and its responses, and report the
    /// updated trend.
    pub fn complete_session(&mut self, input: &SessionInput) -> Result<SessionOutcome, EngineError> {
        input.validate()?;

        let record = compute_session(input);
        self.store.persist(&record)?;
        self.store.append_responses(&derive_response_log(input))?;

        let trend = self.trend(&input.patient_id)?;
        info!(
            patient_id = %input.patient_id,
            global_index = record.global_index,
            risk = record.risk_level.as_str(),
            trend = trend.status.as_str(),
            "session completed"
        );

        Ok(SessionOutcome { record, trend })
    }

    /// Current trend for a subject
    pub fn trend(&self, patient_id: &str) -> Result<TrendReport, EngineError> {
        let history = self.store.load_history(patient_id)?;
        Ok(classify_trend(&history))
    }

    pub fn bank(&self) -> &QuestionBank {
        &self.bank
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryStore;
    use crate::types::{QuestionCategory, RiskLevel, TrendStatus, ValidityAlert};
    use chrono::{Duration, TimeZone};
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    const PATIENT: &str = "PID-E2E-001";

    fn session_date() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 2, 10, 11, 0, 0).unwrap()
    }

    fn reactions(rts: &[f64]) -> Vec<ReactionSample> {
        rts.iter()
            .enumerate()
            .map(|(i, &rt)| {
                ReactionSample::from_response(session_date() + Duration::seconds(i as i64 * 3), rt)
                    .unwrap()
            })
            .collect()
    }

    fn ten_questions() -> Vec<QuestionBankItem> {
        QuestionBank::standard().items()[..10].to_vec()
    }

    fn answers_all(questions: &[QuestionBankItem], chosen: usize) -> HashMap<u32, usize> {
        questions.iter().map(|q| (q.id, chosen)).collect()
    }

    fn reference_session() -> SessionInput {
        let questions = ten_questions();
        SessionInput::new(
            PATIENT,
            session_date(),
            reactions(&[450.0, 460.0, 440.0, 1200.0, 455.0]),
            vec![MemoryRoundResult {
                level: 3,
                success: true,
                sequence_length: 3,
                avg_click_latency_ms: 900.0,
            }],
            answers_all(&questions, 0),
            questions,
        )
        .unwrap()
    }

    #[test]
    fn test_reference_session_arithmetic() {
        let record = compute_session(&reference_session());

        // Attention
        let sd = (448_720.0f64 / 4.0).sqrt();
        let cov = sd / 601.0 * 100.0;
        let speed = 1000.0 / 601.0 * 25.0;
        let stability = (100.0 - cov * 2.0).max(0.0);
        let vigilance = 90.0;
        let attention = 0.4 * speed + 0.3 * stability + 0.3 * vigilance;

        assert!((record.raw_metrics.attention.mean_rt_ms - 601.0).abs() < 1e-9);
        assert!((record.raw_metrics.attention.sd_rt_ms - sd).abs() < 1e-9);
        assert_eq!(record.raw_metrics.attention.lapses, 1);
        assert!((record.attention_index - attention).abs() < 1e-9);

        // Memory: span 3 of 9, throughput 3.33 saturates efficiency
        assert_eq!(record.raw_metrics.memory.max_span, 3);
        assert!((record.raw_metrics.memory.throughput - 3.0 / 0.9).abs() < 1e-9);
        let memory = 0.6 * (3.0 / 9.0 * 100.0) + 0.4 * 100.0;
        assert!((record.memory_index - memory).abs() < 1e-9);

        // Functional: every answer at the best option
        assert!((record.functional_index - 100.0).abs() < 1e-9);

        let global = 0.3 * attention + 0.3 * memory + 0.4 * 100.0;
        assert!((record.global_index - global).abs() < 1e-9);
        assert_eq!(record.risk_level, RiskLevel::Low);
        assert!(record.alerts.is_empty());
        assert!(record.validity_flags.all_valid());
        assert_eq!(
            record.insight_text,
            "High reaction variability. Performance decrement over time. \
             Working memory below average."
        );
    }

    #[test]
    fn test_insufficient_reactions_penalized() {
        let mut input = reference_session();
        input.reactions = reactions(&[300.0, 320.0, 40.0, 60.0]);

        let record = compute_session(&input);
        assert_eq!(record.attention_index, 0.0);
        assert!(record.alerts.contains(&ValidityAlert::AttentionInvalid));
        assert_eq!(record.raw_metrics.attention.mean_rt_ms, 0.0);
    }

    #[test]
    fn test_empty_session_is_complete_record() {
        let input = SessionInput::new(
            PATIENT,
            session_date(),
            Vec::new(),
            Vec::new(),
            HashMap::new(),
            Vec::new(),
        )
        .unwrap();

        let record = compute_session(&input);
        assert_eq!(record.global_index, 0.0);
        assert_eq!(record.risk_level, RiskLevel::High);
        assert_eq!(
            record.alerts,
            vec![
                ValidityAlert::AttentionInvalid,
                ValidityAlert::MemorySkipped,
                ValidityAlert::FunctionalIncomplete,
            ]
        );
    }

    #[test]
    fn test_unanswered_questions_excluded() {
        let mut input = reference_session();
        let first = input.active_questions[0].id;
        input.answers = [(first, 3)].into_iter().collect();

        let record = compute_session(&input);
        assert_eq!(record.raw_metrics.functional.answered, 1);
        assert_eq!(record.functional_index, 0.0);
        assert!(record.validity_flags.functional);
    }

    #[test]
    fn test_answer_contract_violations() {
        let questions = ten_questions();

        let unknown: HashMap<u32, usize> = [(9999, 0)].into_iter().collect();
        let result = SessionInput::new(PATIENT, session_date(), vec![], vec![], unknown, questions.clone());
        assert!(matches!(result, Err(EngineError::UnknownQuestion(9999))));

        let out_of_range: HashMap<u32, usize> = [(questions[0].id, 4)].into_iter().collect();
        let result = SessionInput::new(PATIENT, session_date(), vec![], vec![], out_of_range, questions);
        assert!(matches!(result, Err(EngineError::AnswerOutOfRange { chosen: 4, .. })));
    }

    #[test]
    fn test_session_json_rejects_negative_reaction_time() {
        let json = r#"{
            "patient_id": "PID-JSN-001",
            "date": "2024-02-10T11:00:00Z",
            "reactions": [
                { "timestamp": "2024-02-10T11:00:01Z", "reaction_time_ms": -12.0 }
            ]
        }"#;
        assert!(matches!(
            SessionInput::from_json(json),
            Err(EngineError::InvalidReactionTime(_))
        ));
    }

    #[test]
    fn test_json_reaction_flags_derived_from_times() {
        let json = r#"{
            "patient_id": "PID-JSN-002",
            "date": "2024-02-10T11:00:00Z",
            "reactions": [
                { "timestamp": "2024-02-10T11:00:01Z", "reaction_time_ms": 1200.0 },
                { "timestamp": "2024-02-10T11:00:04Z", "reaction_time_ms": 40.0 },
                { "timestamp": "2024-02-10T11:00:07Z", "reaction_time_ms": 30.0 },
                { "timestamp": "2024-02-10T11:00:10Z", "reaction_time_ms": 20.0 }
            ]
        }"#;
        let record = compute_session(&SessionInput::from_json(json).unwrap());

        let attention = &record.raw_metrics.attention;
        assert!(!record.validity_flags.attention);
        assert_eq!(record.attention_index, 0.0);
        assert!(record.alerts.contains(&ValidityAlert::AttentionInvalid));
        // Gating zeroes the metrics, so check the extraction directly too
        let input = SessionInput::from_json(json).unwrap();
        let extracted = extract_attention(&input.reactions);
        assert_eq!(extracted.valid_responses, 1);
        assert_eq!(extracted.lapses, 1);
        assert_eq!(extracted.false_starts, 3);
        assert_eq!(attention.valid_responses, 0);
    }

    #[test]
    fn test_constructor_reconciles_unflagged_samples() {
        let unflagged = ReactionSample {
            timestamp: session_date(),
            reaction_time_ms: 45.0,
            is_false_start: false,
            is_lapse: false,
        };
        let input = SessionInput::new(PATIENT, session_date(), vec![unflagged], vec![], HashMap::new(), vec![])
            .unwrap();
        assert!(input.reactions[0].is_false_start);
    }

    #[test]
    fn test_category_scores_on_record() {
        let record = compute_session(&reference_session());
        let functional = record.raw_metrics.functional.category_scores;
        assert_eq!(record.category_scores, functional);
        let total: f64 = record.category_scores.iter().map(|(_, v)| *v).sum();
        assert!((total - record.raw_metrics.functional.total_weighted_score).abs() < 1e-9);
    }

    #[test]
    fn test_derive_response_log() {
        let mut input = reference_session();
        let first = input.active_questions[0].clone();
        input.answers = [(first.id, 3)].into_iter().collect();

        let log = derive_response_log(&input);
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].question_id, first.id);
        assert_eq!(log[0].category, first.category);
        assert_eq!(log[0].score_normalized, 0.0);
    }

    #[test]
    fn test_engine_round_trip() {
        let mut engine = AssessmentEngine::new(InMemoryStore::new());
        let mut rng = ChaCha8Rng::seed_from_u64(42);

        let questions = engine.prepare_questionnaire(PATIENT, &mut rng).unwrap();
        assert_eq!(questions.len(), 10);

        // Poor answers on every Memory item, best answers elsewhere
        let answers: HashMap<u32, usize> = questions
            .iter()
            .map(|q| {
                let chosen = if q.category == QuestionCategory::Memory {
                    q.options.len() - 1
                } else {
                    0
                };
                (q.id, chosen)
            })
            .collect();

        let mut input = reference_session();
        input.answers = answers;
        input.active_questions = questions.clone();

        let first = engine.complete_session(&input).unwrap();
        assert_eq!(first.trend.status, TrendStatus::BaselineEstablished);
        assert_eq!(engine.store().stats().assessment_count, 1);
        assert_eq!(engine.store().stats().response_count, 10);

        // The next questionnaire avoids the ten items just answered
        let next = engine.prepare_questionnaire(PATIENT, &mut rng).unwrap();
        assert_eq!(next.len(), 10);
        for q in &next {
            assert!(!questions.iter().any(|seen| seen.id == q.id));
        }

        // A much weaker second session registers as a decline
        let mut second = input.clone();
        second.date = session_date() + Duration::days(30);
        second.memory_rounds.clear();
        let outcome = engine.complete_session(&second).unwrap();
        assert_eq!(outcome.trend.status, TrendStatus::DeclineDetected);
        assert_eq!(engine.trend(PATIENT).unwrap().status, TrendStatus::DeclineDetected);
    }

    #[test]
    fn test_engine_rejects_zero_question_config() {
        let config = EngineConfig {
            questions_per_session: 0,
            ..Default::default()
        };
        let result = AssessmentEngine::with_config(InMemoryStore::new(), QuestionBank::standard(), config);
        assert!(result.is_err());
    }

    proptest! {
        #[test]
        fn prop_indices_within_bounds(
            rts in prop::collection::vec(0.0f64..3000.0, 0..40),
            rounds in prop::collection::vec((any::<bool>(), 1u32..10, 0.0f64..5000.0), 0..8),
            chosen in prop::collection::vec(0usize..4, 0..10),
        ) {
            let questions = ten_questions();
            let answers: HashMap<u32, usize> = questions
                .iter()
                .zip(chosen.iter())
                .map(|(q, &c)| (q.id, c))
                .collect();
            let memory_rounds = rounds
                .into_iter()
                .map(|(success, len, latency)| MemoryRoundResult {
                    level: len,
                    success,
                    sequence_length: len,
                    avg_click_latency_ms: latency,
                })
                .collect();

            let input = SessionInput::new(
                PATIENT,
                session_date(),
                reactions(&rts),
                memory_rounds,
                answers,
                questions,
            )
            .unwrap();
            let record = compute_session(&input);

            for index in [
                record.attention_index,
                record.memory_index,
                record.functional_index,
                record.global_index,
            ] {
                prop_assert!((0.0..=100.0).contains(&index));
            }
            let expected = 0.3 * record.attention_index
                + 0.3 * record.memory_index
                + 0.4 * record.functional_index;
            prop_assert!((record.global_index - expected).abs() < 1e-9);
        }
    }
}

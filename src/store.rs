//! Assessment storage collaborator
//!
//! The engine never owns durable storage. It talks to an [`AssessmentStore`]
//! for a subject's history and response log, and hands back finished records.
//! [`InMemoryStore`] is a reference implementation with JSON snapshots.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::EngineError;
use crate::types::{CompositeAssessmentRecord, QuestionResponseLogEntry};

/// Storage for composite records and questionnaire response logs
pub trait AssessmentStore {
    /// A subject's records, most recent first
    fn load_history(&self, patient_id: &str) -> Result<Vec<CompositeAssessmentRecord>, EngineError>;

    /// A subject's response log, most recent first
    fn load_response_log(
        &self,
        patient_id: &str,
    ) -> Result<Vec<QuestionResponseLogEntry>, EngineError>;

    fn persist(&mut self, record: &CompositeAssessmentRecord) -> Result<(), EngineError>;

    fn append_responses(&mut self, entries: &[QuestionResponseLogEntry]) -> Result<(), EngineError>;
}

/// A persisted record with its storage key
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredAssessment {
    pub id: Uuid,
    #[serde(flatten)]
    pub record: CompositeAssessmentRecord,
}

/// Full export of a store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreSnapshot {
    pub producer: String,
    pub engine_version: String,
    pub assessments: Vec<StoredAssessment>,
    pub responses: Vec<QuestionResponseLogEntry>,
    pub exported_at: DateTime<Utc>,
}

/// Record counts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreStats {
    pub patient_count: usize,
    pub assessment_count: usize,
    pub response_count: usize,
}

/// Reference store keeping everything in memory
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    assessments: Vec<StoredAssessment>,
    responses: Vec<QuestionResponseLogEntry>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stats(&self) -> StoreStats {
        let patients: HashSet<&str> = self
            .assessments
            .iter()
            .map(|a| a.record.patient_id.as_str())
            .chain(self.responses.iter().map(|r| r.patient_id.as_str()))
            .collect();

        StoreStats {
            patient_count: patients.len(),
            assessment_count: self.assessments.len(),
            response_count: self.responses.len(),
        }
    }

    pub fn export(&self) -> StoreSnapshot {
        StoreSnapshot {
            producer: crate::PRODUCER_NAME.to_string(),
            engine_version: crate::ENGINE_VERSION.to_string(),
            assessments: self.assessments.clone(),
            responses: self.responses.clone(),
            exported_at: Utc::now(),
        }
    }

    /// Merge a snapshot.
    ///
    /// Assessments with an existing id are replaced. Responses already present
    /// for the same subject, question and timestamp are skipped, so importing
    /// a snapshot twice leaves the response log unchanged.
    pub fn import(&mut self, snapshot: StoreSnapshot) {
        for stored in snapshot.assessments {
            match self.assessments.iter_mut().find(|a| a.id == stored.id) {
                Some(existing) => *existing = stored,
                None => self.assessments.push(stored),
            }
        }
        for response in snapshot.responses {
            let duplicate = self.responses.iter().any(|r| {
                r.patient_id == response.patient_id
                    && r.question_id == response.question_id
                    && r.timestamp == response.timestamp
            });
            if !duplicate {
                self.responses.push(response);
            }
        }
    }

    /// Serialize the store to JSON
    pub fn to_json(&self) -> Result<String, EngineError> {
        Ok(serde_json::to_string(&self.export())?)
    }

    /// Load a store from JSON produced by [`InMemoryStore::to_json`]
    pub fn from_json(json: &str) -> Result<Self, EngineError> {
        let snapshot: StoreSnapshot = serde_json::from_str(json)?;
        let mut store = Self::new();
        store.import(snapshot);
        Ok(store)
    }

    pub fn clear(&mut self) {
        self.assessments.clear();
        self.responses.clear();
    }
}

impl AssessmentStore for InMemoryStore {
    fn load_history(&self, patient_id: &str) -> Result<Vec<CompositeAssessmentRecord>, EngineError> {
        let mut history: Vec<CompositeAssessmentRecord> = self
            .assessments
            .iter()
            .filter(|a| a.record.patient_id == patient_id)
            .map(|a| a.record.clone())
            .collect();
        crate::trend::order_most_recent_first(&mut history);
        Ok(history)
    }

    fn load_response_log(
        &self,
        patient_id: &str,
    ) -> Result<Vec<QuestionResponseLogEntry>, EngineError> {
        // Reverse insertion order first so equal timestamps list the latest append first
        let mut log: Vec<QuestionResponseLogEntry> = self
            .responses
            .iter()
            .rev()
            .filter(|r| r.patient_id == patient_id)
            .cloned()
            .collect();
        log.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(log)
    }

    fn persist(&mut self, record: &CompositeAssessmentRecord) -> Result<(), EngineError> {
        self.assessments.push(StoredAssessment {
            id: Uuid::new_v4(),
            record: record.clone(),
        });
        Ok(())
    }

    fn append_responses(&mut self, entries: &[QuestionResponseLogEntry]) -> Result<(), EngineError> {
        self.responses.extend_from_slice(entries);
        Ok(())
    }
}

const PATIENT_ID_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

/// Generate a clinical subject id of the form `PID-XXX-XXX`.
///
/// The alphabet omits I, O, 0 and 1 so ids can be read aloud and transcribed.
pub fn generate_patient_id<R: Rng + ?Sized>(rng: &mut R) -> String {
    let mut block = || -> String {
        (0..3)
            .map(|_| PATIENT_ID_ALPHABET[rng.gen_range(0..PATIENT_ID_ALPHABET.len())] as char)
            .collect()
    };
    let first = block();
    let second = block();
    format!("PID-{first}-{second}")
}

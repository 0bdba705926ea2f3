//! Composite aggregation
//!
//! Combines the three domain indices into the global index under the penalized
//! policy: a domain that failed its validity gate contributes exactly 0 and the
//! remaining weights are NOT renormalized.

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::scoring::{attention_index, clamp_score, functional_index, memory_index};
use crate::types::{CompositeAssessmentRecord, RiskLevel};
use crate::validity::GateOutcome;

pub const ATTENTION_WEIGHT: f64 = 0.3;
pub const MEMORY_WEIGHT: f64 = 0.3;
pub const FUNCTIONAL_WEIGHT: f64 = 0.4;

/// Global index below this is high risk
pub const HIGH_RISK_BELOW: f64 = 50.0;
/// Global index below this (and not high) is moderate risk
pub const MODERATE_RISK_BELOW: f64 = 70.0;

const IMPULSIVITY_FALSE_STARTS: u32 = 2;
const VARIABILITY_SD_MS: f64 = 150.0;
const FATIGUE_MS: f64 = 50.0;
const LOW_SPAN: u32 = 4;

const INSIGHT_ATTENTION_DISCARDED: &str =
    "Reflexes task data discarded due to lack of participation.";
const INSIGHT_IMPULSIVITY: &str = "Impulsivity detected.";
const INSIGHT_VARIABILITY: &str = "High reaction variability.";
const INSIGHT_FATIGUE: &str = "Performance decrement over time.";
const INSIGHT_MEMORY_UNAVAILABLE: &str = "Memory span data unavailable.";
const INSIGHT_LOW_SPAN: &str = "Working memory below average.";
pub const INSIGHT_NORMAL: &str = "Performance within parameters.";

/// Global cognitive index
///
/// Formula: `0.3 * attention + 0.3 * memory + 0.4 * functional`
pub fn global_index(attention: f64, memory: f64, functional: f64) -> f64 {
    clamp_score(
        ATTENTION_WEIGHT * attention + MEMORY_WEIGHT * memory + FUNCTIONAL_WEIGHT * functional,
    )
}

/// Band the global index into a risk level
pub fn risk_level(global_index: f64) -> RiskLevel {
    if global_index < HIGH_RISK_BELOW {
        RiskLevel::High
    } else if global_index < MODERATE_RISK_BELOW {
        RiskLevel::Moderate
    } else {
        RiskLevel::Low
    }
}

/// Assemble the insight sentence.
///
/// Clauses, in order:
/// 1. attention invalid: discard notice; otherwise false starts > 2,
///    sd > 150 ms, fatigue > 50 ms
/// 2. memory invalid: unavailable notice; otherwise max span < 4
///
/// Falls back to [`INSIGHT_NORMAL`] when no clause fires.
pub fn insight_text(outcome: &GateOutcome) -> String {
    let mut clauses: Vec<&str> = Vec::new();
    let attention = &outcome.metrics.attention;
    let memory = &outcome.metrics.memory;

    if !outcome.flags.attention {
        clauses.push(INSIGHT_ATTENTION_DISCARDED);
    } else {
        if attention.false_starts > IMPULSIVITY_FALSE_STARTS {
            clauses.push(INSIGHT_IMPULSIVITY);
        }
        if attention.sd_rt_ms > VARIABILITY_SD_MS {
            clauses.push(INSIGHT_VARIABILITY);
        }
        if attention.fatigue_index_ms > FATIGUE_MS {
            clauses.push(INSIGHT_FATIGUE);
        }
    }

    if !outcome.flags.memory {
        clauses.push(INSIGHT_MEMORY_UNAVAILABLE);
    } else if memory.max_span < LOW_SPAN {
        clauses.push(INSIGHT_LOW_SPAN);
    }

    if clauses.is_empty() {
        INSIGHT_NORMAL.to_string()
    } else {
        clauses.join(" ")
    }
}

/// Score every domain and build the composite record
pub fn aggregate(
    patient_id: &str,
    date: DateTime<Utc>,
    outcome: GateOutcome,
) -> CompositeAssessmentRecord {
    let attention = if outcome.flags.attention {
        attention_index(&outcome.metrics.attention).index
    } else {
        0.0
    };
    let memory = if outcome.flags.memory {
        memory_index(&outcome.metrics.memory).index
    } else {
        0.0
    };
    let functional = if outcome.flags.functional {
        functional_index(&outcome.metrics.functional)
    } else {
        0.0
    };

    let global = global_index(attention, memory, functional);
    let risk = risk_level(global);
    let insight = insight_text(&outcome);

    debug!(
        patient_id,
        attention, memory, functional, global,
        risk = risk.as_str(),
        "composite assessment computed"
    );

    CompositeAssessmentRecord {
        patient_id: patient_id.to_string(),
        date,
        attention_index: attention,
        memory_index: memory,
        functional_index: functional,
        global_index: global,
        risk_level: risk,
        raw_metrics: outcome.metrics,
        validity_flags: outcome.flags,
        alerts: outcome.alerts,
        category_scores: outcome.metrics.functional.category_scores,
        insight_text: insight,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{
        AttentionMetrics, FunctionalMetrics, MemoryMetrics, RawMetrics, ValidityAlert,
        ValidityFlags,
    };
    use crate::validity::gate;
    use chrono::TimeZone;

    fn date() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 9, 30, 0).unwrap()
    }

    fn healthy_metrics() -> RawMetrics {
        RawMetrics {
            attention: AttentionMetrics {
                valid_responses: 12,
                mean_rt_ms: 280.0,
                sd_rt_ms: 30.0,
                coefficient_of_variation: 30.0 / 280.0 * 100.0,
                lapses: 0,
                false_starts: 0,
                fatigue_index_ms: 5.0,
            },
            memory: MemoryMetrics {
                rounds_attempted: 4,
                max_span: 6,
                avg_recall_latency_ms: 700.0,
                throughput: 6.0 / 0.7,
            },
            functional: FunctionalMetrics {
                answered: 10,
                total_weighted_score: 12.0,
                total_weight: 12.0,
                ..Default::default()
            },
        }
    }

    #[test]
    fn test_global_weights_sum_to_one() {
        assert!((ATTENTION_WEIGHT + MEMORY_WEIGHT + FUNCTIONAL_WEIGHT - 1.0).abs() < 1e-12);
        assert!((global_index(100.0, 100.0, 100.0) - 100.0).abs() < 1e-9);
        assert_eq!(global_index(0.0, 0.0, 0.0), 0.0);
        assert!((global_index(0.0, 0.0, 100.0) - 40.0).abs() < 1e-12);
    }

    #[test]
    fn test_risk_bands() {
        assert_eq!(risk_level(0.0), RiskLevel::High);
        assert_eq!(risk_level(49.99), RiskLevel::High);
        assert_eq!(risk_level(50.0), RiskLevel::Moderate);
        assert_eq!(risk_level(69.99), RiskLevel::Moderate);
        assert_eq!(risk_level(70.0), RiskLevel::Low);
        assert_eq!(risk_level(100.0), RiskLevel::Low);
    }

    #[test]
    fn test_penalized_not_renormalized() {
        let mut metrics = healthy_metrics();
        metrics.memory = MemoryMetrics::default();
        let record = aggregate("PID-ABC-123", date(), gate(metrics));

        assert_eq!(record.memory_index, 0.0);
        assert!(!record.validity_flags.memory);
        assert_eq!(record.alerts, vec![ValidityAlert::MemorySkipped]);

        let expected = 0.3 * record.attention_index + 0.4 * record.functional_index;
        assert!((record.global_index - expected).abs() < 1e-9);
    }

    #[test]
    fn test_normal_insight() {
        let record = aggregate("p", date(), gate(healthy_metrics()));
        assert_eq!(record.insight_text, INSIGHT_NORMAL);
        assert!(record.alerts.is_empty());
    }

    #[test]
    fn test_insight_clause_order() {
        let mut metrics = healthy_metrics();
        metrics.attention.false_starts = 3;
        metrics.attention.sd_rt_ms = 180.0;
        metrics.attention.fatigue_index_ms = 75.0;
        metrics.memory.max_span = 3;

        let outcome = gate(metrics);
        assert_eq!(
            insight_text(&outcome),
            "Impulsivity detected. High reaction variability. \
             Performance decrement over time. Working memory below average."
        );
    }

    #[test]
    fn test_insight_for_invalid_domains() {
        let outcome = GateOutcome {
            flags: ValidityFlags {
                attention: false,
                memory: false,
                functional: true,
            },
            metrics: RawMetrics::default(),
            alerts: vec![ValidityAlert::AttentionInvalid, ValidityAlert::MemorySkipped],
        };
        assert_eq!(
            insight_text(&outcome),
            "Reflexes task data discarded due to lack of participation. \
             Memory span data unavailable."
        );
    }

    #[test]
    fn test_everything_invalid_scores_zero() {
        let record = aggregate("p", date(), gate(RawMetrics::default()));
        assert_eq!(record.global_index, 0.0);
        assert_eq!(record.risk_level, RiskLevel::High);
        assert_eq!(record.alerts.len(), 3);
    }
}

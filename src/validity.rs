//! Per-domain validity gating
//!
//! Decides whether enough data exists to trust each domain's extracted metrics.
//! Gates are independent; a failed gate zeroes that domain's metrics and raises
//! an alert, but never aborts the session.

use tracing::warn;

use crate::types::{
    AttentionMetrics, FunctionalMetrics, MemoryMetrics, RawMetrics, ValidityAlert, ValidityFlags,
};

/// Minimum number of non-false-start responses for a usable vigilance run
pub const MIN_ATTENTION_RESPONSES: u32 = 3;

/// Outcome of gating all three domains
#[derive(Debug, Clone, PartialEq)]
pub struct GateOutcome {
    pub flags: ValidityFlags,
    /// Metrics with invalid domains held at zero
    pub metrics: RawMetrics,
    /// One alert per failed domain, in domain order
    pub alerts: Vec<ValidityAlert>,
}

pub fn attention_is_valid(metrics: &AttentionMetrics) -> bool {
    metrics.valid_responses >= MIN_ATTENTION_RESPONSES
}

pub fn memory_is_valid(metrics: &MemoryMetrics) -> bool {
    metrics.rounds_attempted > 0
}

pub fn functional_is_valid(metrics: &FunctionalMetrics) -> bool {
    metrics.answered > 0
}

/// Apply every gate to freshly extracted metrics
pub fn gate(metrics: RawMetrics) -> GateOutcome {
    let flags = ValidityFlags {
        attention: attention_is_valid(&metrics.attention),
        memory: memory_is_valid(&metrics.memory),
        functional: functional_is_valid(&metrics.functional),
    };

    let mut gated = metrics;
    let mut alerts = Vec::new();

    if !flags.attention {
        warn!(
            valid_responses = metrics.attention.valid_responses,
            required = MIN_ATTENTION_RESPONSES,
            "attention domain failed validity gate"
        );
        gated.attention = AttentionMetrics::default();
        alerts.push(ValidityAlert::AttentionInvalid);
    }

    if !flags.memory {
        warn!("memory domain failed validity gate: no rounds attempted");
        gated.memory = MemoryMetrics::default();
        alerts.push(ValidityAlert::MemorySkipped);
    }

    if !flags.functional {
        warn!("functional domain failed validity gate: no answers");
        gated.functional = FunctionalMetrics::default();
        alerts.push(ValidityAlert::FunctionalIncomplete);
    }

    GateOutcome {
        flags,
        metrics: gated,
        alerts,
    }
}

//! Domain scoring models
//!
//! Each model maps a domain's extracted metrics to a 0-100 index. Callers only
//! invoke a model for a domain that passed its validity gate; invalid domains
//! are scored as exactly 0 by the aggregator.

use crate::types::{AttentionMetrics, FunctionalMetrics, MemoryMetrics};

/// CoV sensitivity of the stability score (points lost per CoV percent)
pub const STABILITY_COV_SENSITIVITY: f64 = 2.0;

/// Largest representable span on the 3x3 recall grid
pub const MEMORY_GRID_SIZE: f64 = 9.0;

/// Recall throughput (items/sec) that saturates the efficiency score
pub const THROUGHPUT_CEILING: f64 = 3.0;

/// Clamp a sub-score to the 0-100 scale
pub fn clamp_score(value: f64) -> f64 {
    if value.is_nan() {
        return 0.0;
    }
    value.clamp(0.0, 100.0)
}

/// Breakdown of the attention index
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AttentionScores {
    pub speed: f64,
    pub stability: f64,
    pub vigilance: f64,
    pub index: f64,
}

/// Attention / processing speed index
///
/// Formula:
/// ```text
/// speed     = (1000 / mean_rt) * 25
/// stability = 100 - cov * 2
/// vigilance = 100 - lapses * 10 - false_starts * 5
/// index     = 0.4 * speed + 0.3 * stability + 0.3 * vigilance
/// ```
pub fn attention_index(metrics: &AttentionMetrics) -> AttentionScores {
    let speed = if metrics.mean_rt_ms > 0.0 {
        clamp_score((1000.0 / metrics.mean_rt_ms) * 25.0)
    } else {
        0.0
    };
    let stability =
        clamp_score(100.0 - metrics.coefficient_of_variation * STABILITY_COV_SENSITIVITY);
    let vigilance = clamp_score(
        100.0 - f64::from(metrics.lapses) * 10.0 - f64::from(metrics.false_starts) * 5.0,
    );

    AttentionScores {
        speed,
        stability,
        vigilance,
        index: clamp_score(0.4 * speed + 0.3 * stability + 0.3 * vigilance),
    }
}

/// Breakdown of the working-memory index
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MemoryScores {
    pub span: f64,
    pub efficiency: f64,
    pub index: f64,
}

/// Working-memory index
///
/// Formula: `0.6 * (max_span / 9) * 100 + 0.4 * (throughput / 3) * 100`
pub fn memory_index(metrics: &MemoryMetrics) -> MemoryScores {
    let span = clamp_score(f64::from(metrics.max_span) / MEMORY_GRID_SIZE * 100.0);
    let efficiency = clamp_score(metrics.throughput / THROUGHPUT_CEILING * 100.0);

    MemoryScores {
        span,
        efficiency,
        index: clamp_score(0.6 * span + 0.4 * efficiency),
    }
}

/// Functional index: weighted questionnaire score as a percentage of the
/// maximum attainable for the answered items.
pub fn functional_index(metrics: &FunctionalMetrics) -> f64 {
    if metrics.total_weight <= 0.0 {
        return 0.0;
    }
    clamp_score(metrics.total_weighted_score / metrics.total_weight * 100.0)
}

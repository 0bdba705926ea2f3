//! Longitudinal trend classification
//!
//! Compares the two most recent global indices in a subject's history.

use crate::types::{CompositeAssessmentRecord, TrendDirection, TrendReport, TrendStatus};

/// Minimum change in global index treated as a real shift (noise floor)
pub const TREND_THRESHOLD: f64 = 5.0;

/// Classify the trajectory of a history ordered most recent first
pub fn classify_trend(history: &[CompositeAssessmentRecord]) -> TrendReport {
    let indices: Vec<f64> = history.iter().map(|r| r.global_index).collect();
    classify_indices(&indices)
}

/// Same as [`classify_trend`] over bare global indices, most recent first
pub fn classify_indices(global_indices: &[f64]) -> TrendReport {
    let [current, previous, ..] = global_indices else {
        return TrendReport {
            status: TrendStatus::BaselineEstablished,
            direction: TrendDirection::Flat,
            delta: None,
        };
    };

    let diff = current - previous;
    let (status, direction) = if diff > TREND_THRESHOLD {
        (TrendStatus::ShowingImprovement, TrendDirection::Up)
    } else if diff < -TREND_THRESHOLD {
        (TrendStatus::DeclineDetected, TrendDirection::Down)
    } else {
        (TrendStatus::CognitivelyStable, TrendDirection::Flat)
    };

    TrendReport {
        status,
        direction,
        delta: Some(diff),
    }
}

/// Order records most recent first, as expected by [`classify_trend`].
///
/// Records sharing a date are treated as appended in slice order, so the later
/// one comes first.
pub fn order_most_recent_first(records: &mut [CompositeAssessmentRecord]) {
    records.reverse();
    records.sort_by(|a, b| b.date.cmp(&a.date));
}

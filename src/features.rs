//! Metric extraction
//!
//! Pure functions turning raw per-task sample sequences into summary statistics.
//! Extraction never fails: empty input yields zeroed metrics and the validity
//! gate decides whether they can be trusted.

use std::collections::HashMap;

use crate::types::{
    AttentionMetrics, CategoryScores, FunctionalMetrics, MemoryMetrics, MemoryRoundResult,
    QuestionBankItem, ReactionSample,
};

/// Arithmetic mean, 0 for an empty slice
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Bessel-corrected sample standard deviation
///
/// Formula: `sqrt(Σ(x - μ)² / (n - 1))`, 0 when fewer than two values
pub fn sample_std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let mu = mean(values);
    let sum_sq: f64 = values.iter().map(|x| (x - mu).powi(2)).sum();
    (sum_sq / (values.len() - 1) as f64).sqrt()
}

/// Extract vigilance statistics from the raw reaction sequence
pub fn extract_attention(samples: &[ReactionSample]) -> AttentionMetrics {
    let valid: Vec<f64> = samples
        .iter()
        .filter(|s| !s.is_false_start)
        .map(|s| s.reaction_time_ms)
        .collect();

    let mean_rt_ms = mean(&valid);
    let sd_rt_ms = sample_std_dev(&valid);

    // Lapses and false starts are counted over the full sequence
    let lapses = samples.iter().filter(|s| s.is_lapse).count() as u32;
    let false_starts = samples.iter().filter(|s| s.is_false_start).count() as u32;

    AttentionMetrics {
        valid_responses: valid.len() as u32,
        mean_rt_ms,
        sd_rt_ms,
        coefficient_of_variation: coefficient_of_variation(sd_rt_ms, mean_rt_ms),
        lapses,
        false_starts,
        fatigue_index_ms: fatigue_index(&valid),
    }
}

/// Coefficient of variation as a percentage
fn coefficient_of_variation(sd: f64, mean: f64) -> f64 {
    if mean == 0.0 {
        return 0.0;
    }
    sd / mean * 100.0
}

/// Time-on-task decrement
///
/// Formula: `mean(second_half) - mean(first_half)` with the split at `floor(n / 2)`
fn fatigue_index(valid_rts: &[f64]) -> f64 {
    let midpoint = valid_rts.len() / 2;
    let (first_half, second_half) = valid_rts.split_at(midpoint);
    if second_half.is_empty() {
        return 0.0;
    }
    mean(second_half) - mean(first_half)
}

/// Extract span and recall-speed statistics from the memory rounds
pub fn extract_memory(rounds: &[MemoryRoundResult]) -> MemoryMetrics {
    let max_span = rounds
        .iter()
        .filter(|r| r.success)
        .map(|r| r.sequence_length)
        .max()
        .unwrap_or(0);

    let latencies: Vec<f64> = rounds.iter().map(|r| r.avg_click_latency_ms).collect();
    let avg_recall_latency_ms = mean(&latencies);

    let latency_sec = avg_recall_latency_ms / 1000.0;
    let throughput = if latency_sec > 0.0 {
        max_span as f64 / latency_sec
    } else {
        0.0
    };

    MemoryMetrics {
        rounds_attempted: rounds.len() as u32,
        max_span,
        avg_recall_latency_ms,
        throughput,
    }
}

/// Accumulate weighted questionnaire scores over the answered items of the
/// active question set.
pub fn extract_functional(
    active_questions: &[QuestionBankItem],
    answers: &HashMap<u32, usize>,
) -> FunctionalMetrics {
    let mut category_scores = CategoryScores::splat(0.0);
    let mut total_weighted_score = 0.0;
    let mut total_weight = 0.0;
    let mut answered = 0;

    for item in active_questions {
        let Some(&chosen) = answers.get(&item.id) else {
            continue;
        };
        let weighted = item.item_score(chosen) * item.weight;
        total_weighted_score += weighted;
        total_weight += item.weight;
        *category_scores.get_mut(item.category) += weighted;
        answered += 1;
    }

    FunctionalMetrics {
        answered,
        total_weighted_score,
        total_weight,
        category_scores,
    }
}

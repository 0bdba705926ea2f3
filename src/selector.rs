//! Adaptive questionnaire item selection
//!
//! Biases the next questionnaire toward categories where the subject recently
//! answered poorly, avoids recently seen items when the bank allows it, and
//! guarantees every category is represented before weighted filling.
//!
//! Selection is a pure function of its inputs and the injected random source;
//! a seeded generator reproduces the same question set.

use std::collections::HashSet;

use rand::Rng;
use tracing::{debug, warn};

use crate::bank::QuestionBank;
use crate::error::EngineError;
use crate::types::{CategoryWeights, QuestionBankItem, QuestionCategory, QuestionResponseLogEntry};

/// Default number of questions per administration
pub const DEFAULT_TARGET_COUNT: usize = 10;

/// Most recent log entries considered for weighting and recency
pub const DEFAULT_HISTORY_WINDOW: usize = 50;

/// Answers scoring below this count as poor performance
pub const POOR_SCORE_THRESHOLD: f64 = 0.5;

const INITIAL_WEIGHT: f64 = 1.0;
const POOR_PERFORMANCE_BOOST: f64 = 0.5;
const MASTERY_DECAY: f64 = 0.1;
const MIN_WEIGHT: f64 = 0.5;

/// Category weights and recently seen ids derived from a response log
#[derive(Debug, Clone, PartialEq)]
pub struct SelectionProfile {
    pub weights: CategoryWeights,
    pub recently_seen: HashSet<u32>,
}

/// Fold the subject's most recent log entries into sampling weights.
///
/// `log` is ordered most recent first; entries for other subjects are ignored
/// and at most `history_window` entries are considered.
pub fn selection_profile(
    patient_id: &str,
    log: &[QuestionResponseLogEntry],
    history_window: usize,
) -> SelectionProfile {
    let mut weights = CategoryWeights::splat(INITIAL_WEIGHT);
    let mut recently_seen = HashSet::new();

    for entry in log
        .iter()
        .filter(|e| e.patient_id == patient_id)
        .take(history_window)
    {
        recently_seen.insert(entry.question_id);
        let weight = weights.get_mut(entry.category);
        if entry.score_normalized < POOR_SCORE_THRESHOLD {
            *weight += POOR_PERFORMANCE_BOOST;
        } else {
            *weight = (*weight - MASTERY_DECAY).max(MIN_WEIGHT);
        }
    }

    SelectionProfile {
        weights,
        recently_seen,
    }
}

/// Category weights only, see [`selection_profile`]
pub fn category_weights(
    patient_id: &str,
    log: &[QuestionResponseLogEntry],
    history_window: usize,
) -> CategoryWeights {
    selection_profile(patient_id, log, history_window).weights
}

/// Select the next questionnaire for a subject.
///
/// Returns at most `target_count` distinct items; fewer only when the bank
/// itself is smaller than the target.
pub fn select_adaptive_questions<R: Rng + ?Sized>(
    patient_id: &str,
    log: &[QuestionResponseLogEntry],
    bank: &QuestionBank,
    target_count: usize,
    rng: &mut R,
) -> Result<Vec<QuestionBankItem>, EngineError> {
    select_with_window(patient_id, log, bank, target_count, DEFAULT_HISTORY_WINDOW, rng)
}

/// [`select_adaptive_questions`] with an explicit history window
pub fn select_with_window<R: Rng + ?Sized>(
    patient_id: &str,
    log: &[QuestionResponseLogEntry],
    bank: &QuestionBank,
    target_count: usize,
    history_window: usize,
    rng: &mut R,
) -> Result<Vec<QuestionBankItem>, EngineError> {
    if target_count == 0 {
        return Err(EngineError::InvalidTargetCount(target_count));
    }

    let profile = selection_profile(patient_id, log, history_window);
    let mut pools = build_pools(bank, &profile.recently_seen, target_count);

    let mut picked: Vec<usize> = Vec::with_capacity(target_count);

    // Coverage pre-pass: one item from every category that still has one
    for category in QuestionCategory::ALL {
        if picked.len() >= target_count {
            break;
        }
        if let Some(index) = draw_from(&mut pools[category.index()], rng) {
            picked.push(index);
        }
    }

    // Weighted fill, without replacement
    while picked.len() < target_count {
        let Some(category) = choose_category(&profile.weights, &pools, rng) else {
            break;
        };
        if let Some(index) = draw_from(&mut pools[category.index()], rng) {
            picked.push(index);
        }
    }

    debug!(
        patient_id,
        selected = picked.len(),
        target = target_count,
        weights = ?profile.weights,
        "adaptive questionnaire selected"
    );

    Ok(picked
        .into_iter()
        .map(|index| bank.items()[index].clone())
        .collect())
}

/// Per-category index pools into the bank.
///
/// Recently seen items are excluded unless that would leave fewer than
/// `target_count` items, in which case the full bank is used.
fn build_pools(
    bank: &QuestionBank,
    recently_seen: &HashSet<u32>,
    target_count: usize,
) -> [Vec<usize>; 4] {
    let fresh: Vec<usize> = bank
        .items()
        .iter()
        .enumerate()
        .filter(|(_, item)| !recently_seen.contains(&item.id))
        .map(|(index, _)| index)
        .collect();

    let candidates: Vec<usize> = if fresh.len() >= target_count {
        fresh
    } else {
        if !recently_seen.is_empty() {
            warn!(
                fresh = fresh.len(),
                target = target_count,
                "not enough unseen questions, falling back to the full bank"
            );
        }
        (0..bank.len()).collect()
    };

    let mut pools: [Vec<usize>; 4] = Default::default();
    for index in candidates {
        pools[bank.items()[index].category.index()].push(index);
    }
    pools
}

/// Remove and return a uniformly chosen entry
fn draw_from<R: Rng + ?Sized>(pool: &mut Vec<usize>, rng: &mut R) -> Option<usize> {
    if pool.is_empty() {
        return None;
    }
    let position = rng.gen_range(0..pool.len());
    Some(pool.remove(position))
}

/// Roulette-wheel category choice.
///
/// Draws `r` in `[0, total_weight)` and walks the categories subtracting each
/// weight, stopping at the first one that takes `r` to zero or below. If that
/// category has nothing left, a non-empty category is chosen uniformly.
/// Returns `None` once every pool is exhausted.
fn choose_category<R: Rng + ?Sized>(
    weights: &CategoryWeights,
    pools: &[Vec<usize>; 4],
    rng: &mut R,
) -> Option<QuestionCategory> {
    let non_empty: Vec<QuestionCategory> = QuestionCategory::ALL
        .into_iter()
        .filter(|c| !pools[c.index()].is_empty())
        .collect();
    if non_empty.is_empty() {
        return None;
    }

    let total: f64 = weights.iter().map(|(_, w)| *w).sum();
    let mut remaining = rng.gen_range(0.0..total);
    let mut chosen = QuestionCategory::Mood;
    for (category, weight) in weights.iter() {
        remaining -= weight;
        if remaining <= 0.0 {
            chosen = category;
            break;
        }
    }

    if pools[chosen.index()].is_empty() {
        chosen = non_empty[rng.gen_range(0..non_empty.len())];
    }
    Some(chosen)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use std::collections::HashMap;

    const PATIENT: &str = "PID-K7M-2QX";

    fn entry(question_id: u32, category: QuestionCategory, score: f64, age_days: i64) -> QuestionResponseLogEntry {
        let base = Utc.with_ymd_and_hms(2024, 6, 1, 10, 0, 0).unwrap();
        QuestionResponseLogEntry {
            patient_id: PATIENT.to_string(),
            question_id,
            category,
            score_normalized: score,
            timestamp: base - Duration::days(age_days),
        }
    }

    fn ids(items: &[QuestionBankItem]) -> Vec<u32> {
        items.iter().map(|q| q.id).collect()
    }

    #[test]
    fn test_zero_target_rejected() {
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let result = select_adaptive_questions(PATIENT, &[], &QuestionBank::standard(), 0, &mut rng);
        assert!(matches!(result, Err(EngineError::InvalidTargetCount(0))));
    }

    #[test]
    fn test_initial_weights() {
        let weights = category_weights(PATIENT, &[], DEFAULT_HISTORY_WINDOW);
        assert_eq!(weights, CategoryWeights::splat(1.0));
    }

    #[test]
    fn test_poor_memory_history_raises_weight() {
        let log = vec![
            entry(101, QuestionCategory::Memory, 0.0, 1),
            entry(103, QuestionCategory::Memory, 1.0 / 3.0, 2),
        ];
        let weights = category_weights(PATIENT, &log, DEFAULT_HISTORY_WINDOW);

        assert!(weights.memory > 1.0);
        assert!((weights.memory - 2.0).abs() < 1e-12);
        assert!(weights.memory > weights.safety);
        assert_eq!(weights.safety, 1.0);
    }

    #[test]
    fn test_mastery_decays_to_floor() {
        let log: Vec<_> = (0..10)
            .map(|i| entry(301, QuestionCategory::Safety, 1.0, i))
            .collect();
        let weights = category_weights(PATIENT, &log, DEFAULT_HISTORY_WINDOW);
        assert_eq!(weights.safety, 0.5);
    }

    #[test]
    fn test_other_patients_ignored() {
        let mut other = entry(101, QuestionCategory::Memory, 0.0, 0);
        other.patient_id = "PID-OTHER".to_string();
        let profile = selection_profile(PATIENT, &[other], DEFAULT_HISTORY_WINDOW);
        assert_eq!(profile.weights.memory, 1.0);
        assert!(profile.recently_seen.is_empty());
    }

    #[test]
    fn test_history_window_limits_entries() {
        // Three recent good answers, then older poor ones outside the window
        let mut log: Vec<_> = (0..3)
            .map(|i| entry(401, QuestionCategory::Mood, 1.0, i))
            .collect();
        log.extend((3..10).map(|i| entry(402, QuestionCategory::Mood, 0.0, i)));

        let profile = selection_profile(PATIENT, &log, 3);
        assert!((profile.weights.mood - 0.7).abs() < 1e-12);
        assert!(profile.recently_seen.contains(&401));
        assert!(!profile.recently_seen.contains(&402));
    }

    #[test]
    fn test_no_duplicates_and_full_coverage() {
        let bank = QuestionBank::standard();
        for seed in 0..50 {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            let selected = select_adaptive_questions(PATIENT, &[], &bank, 10, &mut rng).unwrap();

            assert_eq!(selected.len(), 10);
            let unique: HashSet<u32> = ids(&selected).into_iter().collect();
            assert_eq!(unique.len(), 10, "seed {seed}");
            for category in QuestionCategory::ALL {
                assert!(
                    selected.iter().any(|q| q.category == category),
                    "seed {seed} missing {category}"
                );
            }
        }
    }

    #[test]
    fn test_coverage_pass_comes_first() {
        let bank = QuestionBank::standard();
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let selected = select_adaptive_questions(PATIENT, &[], &bank, 4, &mut rng).unwrap();

        let categories: Vec<QuestionCategory> = selected.iter().map(|q| q.category).collect();
        assert_eq!(categories, QuestionCategory::ALL.to_vec());
    }

    #[test]
    fn test_seeded_selection_is_reproducible() {
        let bank = QuestionBank::standard();
        let log = vec![entry(102, QuestionCategory::Memory, 0.0, 1)];

        let mut first = ChaCha8Rng::seed_from_u64(1234);
        let mut second = ChaCha8Rng::seed_from_u64(1234);
        let a = select_adaptive_questions(PATIENT, &log, &bank, 10, &mut first).unwrap();
        let b = select_adaptive_questions(PATIENT, &log, &bank, 10, &mut second).unwrap();
        assert_eq!(ids(&a), ids(&b));
    }

    #[test]
    fn test_recently_seen_items_excluded() {
        let bank = QuestionBank::standard();
        let log: Vec<_> = [101, 102, 201, 301, 401]
            .into_iter()
            .enumerate()
            .map(|(i, id)| {
                let category = bank.get(id).unwrap().category;
                entry(id, category, 1.0, i as i64)
            })
            .collect();

        for seed in 0..20 {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            let selected = select_adaptive_questions(PATIENT, &log, &bank, 10, &mut rng).unwrap();
            for seen in [101, 102, 201, 301, 401] {
                assert!(!ids(&selected).contains(&seen), "seed {seed} reused {seen}");
            }
        }
    }

    #[test]
    fn test_recency_falls_back_to_full_bank() {
        let bank = QuestionBank::standard();
        // 20 of 25 seen leaves only 5 unseen, fewer than the target of 10
        let log: Vec<_> = bank
            .items()
            .iter()
            .take(20)
            .enumerate()
            .map(|(i, q)| entry(q.id, q.category, 1.0, i as i64))
            .collect();

        let mut rng = ChaCha8Rng::seed_from_u64(99);
        let selected = select_adaptive_questions(PATIENT, &log, &bank, 10, &mut rng).unwrap();
        assert_eq!(selected.len(), 10);
    }

    #[test]
    fn test_small_bank_gives_short_session() {
        let items: Vec<_> = QuestionBank::standard()
            .items()
            .iter()
            .filter(|q| q.id % 100 <= 1)
            .cloned()
            .collect();
        let bank = QuestionBank::new(items).unwrap();
        assert_eq!(bank.len(), 4);

        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let selected = select_adaptive_questions(PATIENT, &[], &bank, 10, &mut rng).unwrap();
        assert_eq!(selected.len(), 4);
    }

    #[test]
    fn test_empty_bank_terminates() {
        let bank = QuestionBank::new(Vec::new()).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let selected = select_adaptive_questions(PATIENT, &[], &bank, 10, &mut rng).unwrap();
        assert!(selected.is_empty());
    }

    #[test]
    fn test_single_category_bank_uses_fallback() {
        let items: Vec<_> = QuestionBank::standard()
            .items()
            .iter()
            .filter(|q| q.category == QuestionCategory::Executive)
            .cloned()
            .collect();
        let bank = QuestionBank::new(items).unwrap();

        let mut rng = ChaCha8Rng::seed_from_u64(11);
        let selected = select_adaptive_questions(PATIENT, &[], &bank, 5, &mut rng).unwrap();
        assert_eq!(selected.len(), 5);
        assert!(selected.iter().all(|q| q.category == QuestionCategory::Executive));
    }

    #[test]
    fn test_weak_category_oversampled() {
        let bank = QuestionBank::standard();
        // Poor Mood answers on items outside the bank so recency doesn't shrink the pool
        let log: Vec<_> = (0..6)
            .map(|i| entry(900 + i as u32, QuestionCategory::Mood, 0.0, i))
            .collect();
        let weights = category_weights(PATIENT, &log, DEFAULT_HISTORY_WINDOW);
        assert!((weights.mood - 4.0).abs() < 1e-12);

        let mut counts: HashMap<QuestionCategory, usize> = HashMap::new();
        for seed in 0..200 {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            let selected = select_adaptive_questions(PATIENT, &log, &bank, 10, &mut rng).unwrap();
            for q in selected {
                *counts.entry(q.category).or_default() += 1;
            }
        }
        assert!(counts[&QuestionCategory::Mood] > counts[&QuestionCategory::Safety]);
    }
}

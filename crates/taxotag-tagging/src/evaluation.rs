//! Scoring predictions against ground truth.
//!
//! Predictions and gold records are joined on `(paper_id, level)`. A
//! prediction without a gold record still counts toward the total but can
//! never be a hit. Every accuracy is `hits / predictions`, and 0.0 for an
//! empty batch.

use std::collections::{BTreeMap, HashMap};

use serde::Serialize;
use tracing::debug;

use taxotag_core::{GroundTruthRecord, PaperId, PredictionRecord};

/// Case-insensitive label equality.
///
/// # Examples
///
/// ```
/// use taxotag_tagging::evaluation::match_exact;
///
/// assert!(match_exact("Applied Computing", "applied computing"));
/// assert!(!match_exact("Applied computing", "Applied computation"));
/// ```
pub fn match_exact(a: &str, b: &str) -> bool {
    a.to_lowercase() == b.to_lowercase()
}

/// True when the prediction's label equals the gold label, ignoring case.
pub fn evaluate_example_exact(prediction: &PredictionRecord, gold: &GroundTruthRecord) -> bool {
    match_exact(&prediction.label, &gold.label)
}

/// True when the gold label is among the prediction's first `k` soft targets.
///
/// This reads the prediction's own ranked alternatives in stored order and
/// compares labels exactly.
pub fn evaluate_example_in_top(
    prediction: &PredictionRecord,
    gold: &GroundTruthRecord,
    k: usize,
) -> bool {
    prediction
        .soft_targets
        .iter()
        .take(k)
        .any(|t| t.label == gold.label)
}

/// The gold record's `k` most confident soft-target labels.
///
/// Sorting is stable, so equal confidences keep their source order.
pub fn top_k_labels(gold: &GroundTruthRecord, k: usize) -> Vec<&str> {
    let mut targets: Vec<_> = gold.soft_targets.iter().collect();
    targets.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
    targets.into_iter().take(k).map(|t| t.label.as_str()).collect()
}

type GoldIndex<'a> = HashMap<(PaperId, u32), &'a GroundTruthRecord>;

/// Index gold records by key; a later record replaces an earlier duplicate.
fn index_gold(ground_truths: &[GroundTruthRecord]) -> GoldIndex<'_> {
    ground_truths.iter().map(|gt| (gt.key(), gt)).collect()
}

fn accuracy_with<F>(predictions: &[PredictionRecord], ground_truths: &[GroundTruthRecord], hit: F) -> f64
where
    F: Fn(&PredictionRecord, &GroundTruthRecord) -> bool,
{
    if predictions.is_empty() {
        debug!("No predictions to evaluate");
        return 0.0;
    }
    let gold = index_gold(ground_truths);
    let hits = predictions
        .iter()
        .filter(|p| gold.get(&p.key()).is_some_and(|gt| hit(p, gt)))
        .count();
    hits as f64 / predictions.len() as f64
}

/// Share of predictions whose label is in the gold top-`k` soft targets.
///
/// Label comparison is exact (case-sensitive).
pub fn top_k_accuracy(
    predictions: &[PredictionRecord],
    ground_truths: &[GroundTruthRecord],
    k: usize,
) -> f64 {
    accuracy_with(predictions, ground_truths, |p, gt| {
        top_k_labels(gt, k).contains(&p.label.as_str())
    })
}

/// Share of predictions whose label equals the gold label, ignoring case.
///
/// Soft targets play no part here.
pub fn exact_accuracy(predictions: &[PredictionRecord], ground_truths: &[GroundTruthRecord]) -> f64 {
    accuracy_with(predictions, ground_truths, evaluate_example_exact)
}

/// Share of predictions whose label matches any gold soft target, ignoring
/// case and rank.
pub fn soft_target_match_accuracy(
    predictions: &[PredictionRecord],
    ground_truths: &[GroundTruthRecord],
) -> f64 {
    accuracy_with(predictions, ground_truths, |p, gt| {
        gt.soft_targets.iter().any(|t| match_exact(&p.label, &t.label))
    })
}

/// Metrics for one slice of predictions.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvalMetrics {
    /// Predictions scored.
    pub total: usize,
    /// Predictions that found a gold record.
    pub matched: usize,
    pub exact_accuracy: f64,
    pub top_1_accuracy: f64,
    pub top_k_accuracy: f64,
    pub soft_target_accuracy: f64,
}

impl EvalMetrics {
    fn compute(
        predictions: &[PredictionRecord],
        ground_truths: &[GroundTruthRecord],
        k: usize,
    ) -> Self {
        let gold = index_gold(ground_truths);
        Self {
            total: predictions.len(),
            matched: predictions
                .iter()
                .filter(|p| gold.contains_key(&p.key()))
                .count(),
            exact_accuracy: exact_accuracy(predictions, ground_truths),
            top_1_accuracy: top_k_accuracy(predictions, ground_truths, 1),
            top_k_accuracy: top_k_accuracy(predictions, ground_truths, k),
            soft_target_accuracy: soft_target_match_accuracy(predictions, ground_truths),
        }
    }
}

/// Overall and per-level evaluation of a prediction batch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvalReport {
    /// The `k` used for `top_k_accuracy`.
    pub k: usize,
    pub overall: EvalMetrics,
    /// Metrics restricted to each level, keyed by level.
    pub per_level: BTreeMap<u32, EvalMetrics>,
}

impl EvalReport {
    /// Score `predictions` against `ground_truths`.
    pub fn from_records(
        predictions: &[PredictionRecord],
        ground_truths: &[GroundTruthRecord],
        k: usize,
    ) -> Self {
        let mut by_level: BTreeMap<u32, Vec<PredictionRecord>> = BTreeMap::new();
        for p in predictions {
            by_level.entry(p.level).or_default().push(p.clone());
        }

        let per_level = by_level
            .into_iter()
            .map(|(level, preds)| (level, EvalMetrics::compute(&preds, ground_truths, k)))
            .collect();

        Self {
            k,
            overall: EvalMetrics::compute(predictions, ground_truths, k),
            per_level,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use taxotag_core::SoftTarget;

    fn gold(paper_id: i64, level: u32, label: &str, targets: &[(&str, f64)]) -> GroundTruthRecord {
        GroundTruthRecord::new(paper_id, level, label).with_soft_targets(
            targets
                .iter()
                .map(|(l, c)| SoftTarget::new(*l, *c))
                .collect(),
        )
    }

    fn pred(paper_id: i64, level: u32, label: &str) -> PredictionRecord {
        PredictionRecord::new(paper_id, level, label)
    }

    fn fixture() -> (Vec<PredictionRecord>, Vec<GroundTruthRecord>) {
        let predictions = vec![
            pred(4216, 1, "Computing methodologies"),
            pred(1234, 2, "Data mining"),
            pred(5678, 1, "Applied computing"),
        ];
        let ground_truths = vec![
            gold(
                4216,
                1,
                "Computing methodologies",
                &[
                    ("Computing methodologies", 0.41),
                    ("Human-centered computing", 0.30),
                    ("Applied computing", 0.28),
                ],
            ),
            gold(
                1234,
                2,
                "Artificial intelligence",
                &[
                    ("Artificial intelligence", 0.5),
                    ("Machine learning", 0.4),
                    ("Data mining", 0.1),
                ],
            ),
            gold(
                5678,
                1,
                "Applied computing",
                &[
                    ("Applied computing", 0.9),
                    ("Security and privacy", 0.05),
                    ("Software engineering", 0.05),
                ],
            ),
        ];
        (predictions, ground_truths)
    }

    #[test]
    fn test_match_exact_case_insensitive() {
        assert!(match_exact("Applied Computing", "applied computing"));
        assert!(match_exact("", ""));
        assert!(!match_exact("Applied computing", "Applied computing "));
    }

    #[test]
    fn test_top_k_single_pair_hit_at_k3_and_k1() {
        let (predictions, ground_truths) = fixture();
        let one = &predictions[..1];
        assert_eq!(top_k_accuracy(one, &ground_truths, 3), 1.0);
        assert_eq!(top_k_accuracy(one, &ground_truths, 1), 1.0);
    }

    #[test]
    fn test_top_k_batch_by_k() {
        let (predictions, ground_truths) = fixture();
        assert_eq!(top_k_accuracy(&predictions, &ground_truths, 3), 1.0);
        assert!((top_k_accuracy(&predictions, &ground_truths, 2) - 2.0 / 3.0).abs() < 1e-9);
        assert!((top_k_accuracy(&predictions, &ground_truths, 1) - 2.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_missing_ground_truth_counts_in_denominator() {
        let (mut predictions, ground_truths) = fixture();
        predictions.push(pred(9999, 1, "Some Label"));
        assert_eq!(top_k_accuracy(&predictions, &ground_truths, 3), 0.75);
    }

    #[test]
    fn test_empty_batch_is_zero() {
        let (_, ground_truths) = fixture();
        assert_eq!(top_k_accuracy(&[], &ground_truths, 3), 0.0);
        assert_eq!(exact_accuracy(&[], &ground_truths), 0.0);
        assert_eq!(soft_target_match_accuracy(&[], &ground_truths), 0.0);
    }

    #[test]
    fn test_top_k_labels_sorted_and_stable() {
        let gt = gold(1, 1, "x", &[("low", 0.1), ("tie-a", 0.5), ("tie-b", 0.5), ("high", 0.9)]);
        assert_eq!(top_k_labels(&gt, 3), vec!["high", "tie-a", "tie-b"]);
        assert_eq!(top_k_labels(&gt, 10).len(), 4);
        assert!(top_k_labels(&gt, 0).is_empty());
    }

    #[test]
    fn test_top_k_is_case_sensitive() {
        let (_, ground_truths) = fixture();
        let predictions = vec![pred(4216, 1, "computing methodologies")];
        assert_eq!(top_k_accuracy(&predictions, &ground_truths, 3), 0.0);
    }

    #[test]
    fn test_level_is_part_of_the_key() {
        let (_, ground_truths) = fixture();
        let predictions = vec![pred(4216, 2, "Computing methodologies")];
        assert_eq!(top_k_accuracy(&predictions, &ground_truths, 3), 0.0);
    }

    #[test]
    fn test_exact_accuracy_uses_gold_label_only() {
        let (predictions, ground_truths) = fixture();
        // 1234's prediction is only a soft target, not the gold label.
        assert!((exact_accuracy(&predictions, &ground_truths) - 2.0 / 3.0).abs() < 1e-9);

        let shouting = vec![pred(5678, 1, "APPLIED COMPUTING")];
        assert_eq!(exact_accuracy(&shouting, &ground_truths), 1.0);
    }

    #[test]
    fn test_soft_target_match_ignores_rank_and_case() {
        let (_, ground_truths) = fixture();
        let predictions = vec![
            pred(1234, 2, "data mining"),
            pred(5678, 1, "Databases"),
        ];
        assert_eq!(soft_target_match_accuracy(&predictions, &ground_truths), 0.5);
    }

    #[test]
    fn test_evaluate_example_in_top_uses_prediction_soft_targets() {
        let gt = gold(1, 1, "Machine learning", &[]);
        let mut p = pred(1, 1, "Artificial intelligence");
        p.soft_targets = vec![
            SoftTarget::new("Artificial intelligence", 0.6),
            SoftTarget::new("Machine learning", 0.3),
        ];
        assert!(evaluate_example_in_top(&p, &gt, 2));
        assert!(!evaluate_example_in_top(&p, &gt, 1));
        assert!(!evaluate_example_exact(&p, &gt));
    }

    #[test]
    fn test_report_overall_and_per_level() {
        let (mut predictions, ground_truths) = fixture();
        predictions.push(pred(9999, 1, "Some Label"));
        let report = EvalReport::from_records(&predictions, &ground_truths, 3);

        assert_eq!(report.k, 3);
        assert_eq!(report.overall.total, 4);
        assert_eq!(report.overall.matched, 3);
        assert_eq!(report.overall.top_k_accuracy, 0.75);
        assert_eq!(report.overall.top_1_accuracy, 0.5);

        let level1 = &report.per_level[&1];
        assert_eq!(level1.total, 3);
        assert!((level1.top_k_accuracy - 2.0 / 3.0).abs() < 1e-9);
        let level2 = &report.per_level[&2];
        assert_eq!(level2.total, 1);
        assert_eq!(level2.exact_accuracy, 0.0);
        assert_eq!(level2.top_k_accuracy, 1.0);
    }

    #[test]
    fn test_report_serializes() {
        let (predictions, ground_truths) = fixture();
        let report = EvalReport::from_records(&predictions, &ground_truths, 3);
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["overall"]["total"], 3);
        assert!(json["per_level"]["1"].is_object());
    }
}

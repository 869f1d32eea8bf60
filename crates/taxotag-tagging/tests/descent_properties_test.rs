//! Properties of the descent controller over a multi-level taxonomy.

use std::sync::Arc;

use taxotag_core::{PaperId, Taxonomy};
use taxotag_inference::mock::{candidates_reply, MockGenerationBackend};
use taxotag_inference::LevelClassifier;
use taxotag_tagging::{
    exact_accuracy, top_k_accuracy, BatchItem, BatchTagger, DescentController, GroundTruthRecord,
    SoftTarget,
};

fn acm_fragment() -> Taxonomy {
    let mut t = Taxonomy::new();
    for path in [
        vec!["Computing methodologies", "Machine learning", "Learning paradigms"],
        vec!["Computing methodologies", "Machine learning", "Machine learning approaches"],
        vec!["Computing methodologies", "Artificial intelligence"],
        vec!["Applied computing", "Life and medical sciences"],
        vec!["Human-centered computing"],
    ] {
        t.add_node(&path, "");
    }
    t
}

fn controller(backend: &MockGenerationBackend) -> DescentController {
    DescentController::new(LevelClassifier::new(Arc::new(backend.clone())), "m")
}

/// Every reply names a label from the whole vocabulary; the walk still ends
/// within the taxonomy depth.
#[tokio::test]
async fn test_terminates_within_depth_for_any_reply_sequence() {
    let labels = [
        "Computing methodologies",
        "Machine learning",
        "Learning paradigms",
        "Applied computing",
        "Artificial intelligence",
        "Life and medical sciences",
        "Nonexistent",
    ];
    let taxonomy = acm_fragment();
    let depth = taxonomy.depth() as usize;

    for shift in 0..labels.len() {
        let mut backend = MockGenerationBackend::new();
        for i in 0..10 {
            let label = labels[(i + shift) % labels.len()];
            backend = backend.with_reply(candidates_reply(&[(label, 0.5)]));
        }

        let result = controller(&backend).tag("doc", &taxonomy).await;
        assert!(backend.call_count() <= depth);
        assert!(result.levels() <= depth);
        assert!(result.levels() <= backend.call_count());
    }
}

#[tokio::test]
async fn test_full_depth_path() {
    let backend = MockGenerationBackend::new()
        .with_reply(candidates_reply(&[("Computing methodologies", 0.6), ("Applied computing", 0.3)]))
        .with_reply(candidates_reply(&[("Machine learning", 0.8)]))
        .with_reply(candidates_reply(&[("Learning paradigms", 0.7)]));

    let result = controller(&backend).tag("doc", &acm_fragment()).await;
    assert_eq!(
        result.path(),
        vec!["Computing methodologies", "Machine learning", "Learning paradigms"]
    );
    assert_eq!(backend.call_count(), 3);

    let json = serde_json::to_value(&result).unwrap();
    assert_eq!(
        json["children"]["children"]["prediction"],
        "Learning paradigms"
    );
    assert_eq!(json["children"]["children"]["children"], serde_json::json!({}));
}

#[tokio::test]
async fn test_second_level_offers_only_chosen_children() {
    let backend = MockGenerationBackend::new()
        .with_reply(candidates_reply(&[("Applied computing", 0.9)]))
        .with_reply(candidates_reply(&[("Life and medical sciences", 0.9)]));

    controller(&backend).tag("doc", &acm_fragment()).await;

    let calls = backend.get_calls();
    assert!(calls[0].prompt.contains("Human-centered computing : "));
    assert!(calls[1].prompt.contains("Life and medical sciences : "));
    assert!(!calls[1].prompt.contains("Machine learning : "));
}

#[tokio::test]
async fn test_batch_results_score_against_ground_truth() {
    let backend = MockGenerationBackend::new()
        .with_rule(
            "paper one",
            candidates_reply(&[("Human-centered computing", 0.9)]),
        )
        .with_rule(
            "paper two",
            candidates_reply(&[("Artificial intelligence", 0.9)]),
        );

    let tagger = BatchTagger::new(controller(&backend), Arc::new(acm_fragment()));
    let results = tagger
        .run(vec![
            BatchItem::new(1i64, "paper one"),
            BatchItem::new(2i64, "paper two"),
        ])
        .await;

    let predictions: Vec<_> = results
        .iter()
        .flat_map(|(id, r)| r.to_predictions(id))
        .collect();
    assert_eq!(predictions.len(), 2);
    assert_eq!(predictions[1].paper_id, PaperId::Int(2));

    let gold = vec![
        GroundTruthRecord::new(1i64, 1, "Human-centered computing").with_soft_targets(vec![
            SoftTarget::new("Human-centered computing", 0.8),
        ]),
        GroundTruthRecord::new(2i64, 1, "Computing methodologies").with_soft_targets(vec![
            SoftTarget::new("Computing methodologies", 0.6),
            SoftTarget::new("Artificial intelligence", 0.3),
        ]),
    ];
    assert_eq!(exact_accuracy(&predictions, &gold), 0.5);
    assert_eq!(top_k_accuracy(&predictions, &gold, 1), 0.5);
}

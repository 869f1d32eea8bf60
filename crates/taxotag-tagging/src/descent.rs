//! Confidence-guided descent through the taxonomy for one document.

use std::time::Instant;

use tracing::{debug, info, instrument};

use taxotag_core::{Candidate, Taxonomy, TaggingResult, TaxonomyNode};
use taxotag_inference::LevelClassifier;

/// Walks a document from the root's children down to a terminal node.
///
/// At each level the classifier ranks the current options; the controller
/// follows the top label into that node's children and never revisits a
/// level. The walk stops at a leaf, at an empty outcome, or when the top
/// label is not among the offered options.
#[derive(Clone)]
pub struct DescentController {
    classifier: LevelClassifier,
    model: String,
}

impl DescentController {
    pub fn new(classifier: LevelClassifier, model: impl Into<String>) -> Self {
        Self {
            classifier,
            model: model.into(),
        }
    }

    /// Use the backend's default model.
    pub fn with_default_model(classifier: LevelClassifier) -> Self {
        let model = classifier.backend().default_model().to_string();
        Self::new(classifier, model)
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn classifier(&self) -> &LevelClassifier {
        &self.classifier
    }

    /// Tag `document` against `taxonomy`.
    ///
    /// Always returns a well-formed result; at most `taxonomy.depth()`
    /// classifier calls are made.
    #[instrument(skip(self, document, taxonomy), fields(subsystem = "tagging", component = "descent", op = "tag", model = %self.model))]
    pub async fn tag(&self, document: &str, taxonomy: &Taxonomy) -> TaggingResult {
        let start = Instant::now();
        let levels = self.descend(document, taxonomy.root().children()).await;
        let depth = levels.len();

        let result = levels
            .into_iter()
            .rev()
            .fold(TaggingResult::empty(), |child, candidates| {
                TaggingResult::from_candidates(candidates, child)
            });

        info!(
            levels = depth,
            path = %result.path().join(" > "),
            duration_ms = start.elapsed().as_millis() as u64,
            "Document tagged"
        );
        result
    }

    /// Collect the candidate list of every level visited, top level first.
    async fn descend(&self, document: &str, mut options: &[TaxonomyNode]) -> Vec<Vec<Candidate>> {
        let mut levels = Vec::new();

        while !options.is_empty() {
            let level = levels.len() + 1;
            let outcome = self.classifier.choose(document, options, &self.model).await;
            let Some(prediction) = outcome.top_label().map(str::to_string) else {
                debug!(level, "No candidates, halting");
                break;
            };
            levels.push(outcome.candidates);

            match options.iter().find(|node| node.name == prediction) {
                Some(node) if !node.is_leaf() => {
                    debug!(level, label = %prediction, "Descending");
                    options = node.children();
                }
                Some(_) => {
                    debug!(level, label = %prediction, "Reached leaf");
                    break;
                }
                None => {
                    debug!(level, label = %prediction, "Prediction not among options, halting");
                    break;
                }
            }
        }

        levels
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use taxotag_inference::mock::{candidates_reply, MockGenerationBackend};

    /// Two-level fragment; option lines make unique rule needles.
    fn taxonomy() -> Taxonomy {
        let mut t = Taxonomy::new();
        t.add_node(&["Computing methodologies"], "Methods of computing");
        t.add_node(&["Computing methodologies", "Machine learning"], "Learning");
        t.add_node(&["Computing methodologies", "Computer graphics"], "Rendering");
        t.add_node(&["Applied computing"], "Applications");
        t
    }

    fn controller(backend: &MockGenerationBackend) -> DescentController {
        DescentController::new(LevelClassifier::new(Arc::new(backend.clone())), "m")
    }

    #[tokio::test]
    async fn test_descends_to_leaf() {
        let backend = MockGenerationBackend::new()
            .with_rule(
                "Applied computing : ",
                candidates_reply(&[("Computing methodologies", 0.7), ("Applied computing", 0.2)]),
            )
            .with_rule("Machine learning : ", candidates_reply(&[("Machine learning", 0.9)]));

        let result = controller(&backend).tag("doc", &taxonomy()).await;

        assert_eq!(result.path(), vec!["Computing methodologies", "Machine learning"]);
        assert_eq!(result.candidates().len(), 2);
        let child = result.children().unwrap();
        assert_eq!(child.prediction(), Some("Machine learning"));
        assert!(child.children().is_none());
        assert_eq!(backend.call_count(), 2);
    }

    #[tokio::test]
    async fn test_leaf_at_first_level_stops() {
        let backend = MockGenerationBackend::new()
            .with_rule("Applied computing : ", candidates_reply(&[("Applied computing", 0.8)]));
        let result = controller(&backend).tag("doc", &taxonomy()).await;

        assert_eq!(result.path(), vec!["Applied computing"]);
        assert!(result.children().is_none());
        assert_eq!(backend.call_count(), 1);
    }

    #[tokio::test]
    async fn test_hallucinated_label_is_terminal() {
        let backend = MockGenerationBackend::new()
            .with_reply(candidates_reply(&[("Quantum biology", 0.8)]));
        let result = controller(&backend).tag("doc", &taxonomy()).await;

        assert_eq!(result.prediction(), Some("Quantum biology"));
        assert!(result.children().is_none());
        assert_eq!(backend.call_count(), 1);
    }

    #[tokio::test]
    async fn test_label_match_is_case_sensitive() {
        let backend = MockGenerationBackend::new()
            .with_reply(candidates_reply(&[("computing methodologies", 0.8)]));
        let result = controller(&backend).tag("doc", &taxonomy()).await;

        assert_eq!(result.levels(), 1);
        assert_eq!(backend.call_count(), 1);
    }

    #[tokio::test]
    async fn test_no_candidates_yields_empty_result() {
        let backend = MockGenerationBackend::new().with_default_reply("cannot decide");
        let result = controller(&backend).tag("doc", &taxonomy()).await;

        assert!(result.is_empty());
        assert!(result.prediction().is_none());
        assert!(result.children().is_none());
        assert_eq!(serde_json::to_value(&result).unwrap(), serde_json::json!({}));
    }

    #[tokio::test]
    async fn test_empty_taxonomy_makes_no_calls() {
        let backend = MockGenerationBackend::new();
        let result = controller(&backend).tag("doc", &Taxonomy::new()).await;

        assert!(result.is_empty());
        assert_eq!(backend.call_count(), 0);
    }

    #[tokio::test]
    async fn test_failure_mid_tree_keeps_upper_levels() {
        let backend = MockGenerationBackend::new()
            .with_rule(
                "Applied computing : ",
                candidates_reply(&[("Computing methodologies", 0.7)]),
            )
            .with_failure_rule("Machine learning : ", "timeout");

        let result = controller(&backend).tag("doc", &taxonomy()).await;

        assert_eq!(result.path(), vec!["Computing methodologies"]);
        assert!(result.children().is_none());
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["children"], serde_json::json!({}));
    }

    #[tokio::test]
    async fn test_with_default_model_uses_backend_model() {
        let backend = MockGenerationBackend::new().with_default_model("qwen-test");
        let c = DescentController::with_default_model(LevelClassifier::new(Arc::new(backend.clone())));
        assert_eq!(c.model(), "qwen-test");

        c.tag("doc", &taxonomy()).await;
        assert_eq!(backend.get_calls()[0].model, "qwen-test");
    }
}

//! # taxotag-tagging
//!
//! Hierarchical tagging of documents against a taxonomy.
//!
//! This crate provides:
//! - The descent controller walking one document from the root to a
//!   terminal category
//! - Bounded concurrent tagging of document batches
//! - Exact, top-k, and soft-target scoring against ground truth
//! - Seeded train/validation/test splitting of JSONL corpora
//! - The `taxotag` command-line tool
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use taxotag_inference::{LevelClassifier, OpenAIBackend, Telemetry};
//! use taxotag_tagging::{BatchItem, BatchTagger, DescentController, Taxonomy};
//!
//! let taxonomy = Arc::new(Taxonomy::load_from_file("acm_ccs.json")?);
//! let telemetry = Arc::new(Telemetry::from_env());
//! let classifier = LevelClassifier::new(Arc::new(OpenAIBackend::from_env()?))
//!     .with_telemetry(telemetry.clone());
//! let controller = DescentController::new(classifier, "local-qwen3:0.6b");
//!
//! let results = BatchTagger::new(controller, taxonomy)
//!     .run(vec![BatchItem::new(4216i64, "Title\n\nAbstract")])
//!     .await;
//! telemetry.flush()?;
//! ```

pub mod batch;
pub mod dataset;
pub mod descent;
pub mod evaluation;
pub mod records;

// Re-export core types
pub use taxotag_core::*;

pub use batch::{BatchConfig, BatchItem, BatchTagger};
pub use dataset::{create_splits, SplitConfig, SplitSummary};
pub use descent::DescentController;
pub use evaluation::{
    evaluate_example_exact, evaluate_example_in_top, exact_accuracy, match_exact,
    soft_target_match_accuracy, top_k_accuracy, EvalMetrics, EvalReport,
};
pub use records::TaggedRecord;

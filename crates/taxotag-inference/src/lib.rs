//! # taxotag-inference
//!
//! Generation backends and single-level classification for taxotag.
//!
//! This crate provides:
//! - OpenAI-compatible generation backend (feature `openai`, default)
//! - Tolerant parsing of `<think>` segments and fenced JSON replies
//! - The level classifier that ranks one set of sibling categories
//! - Run-scoped token usage and interaction telemetry
//! - A scripted mock backend (feature `mock`, and in unit tests)
//!
//! # Feature Flags
//!
//! - `openai` (default): Enable the OpenAI-compatible backend
//! - `mock`: Expose [`mock::MockGenerationBackend`] to other crates' tests
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use taxotag_core::TaxonomyNode;
//! use taxotag_inference::{LevelClassifier, OpenAIBackend};
//!
//! #[tokio::main]
//! async fn main() {
//!     let backend = Arc::new(OpenAIBackend::from_env().unwrap());
//!     let classifier = LevelClassifier::new(backend);
//!     let options = vec![TaxonomyNode::new("Machine learning", "Learning from data", 1)];
//!     let outcome = classifier
//!         .choose("Neural ranking models", &options, "local-qwen3:0.6b")
//!         .await;
//!     println!("{:?}", outcome.top_label());
//! }
//! ```

pub mod classifier;
pub mod response;
pub mod telemetry;

#[cfg(feature = "openai")]
pub mod openai;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

// Re-export core types
pub use taxotag_core::*;

#[cfg(feature = "openai")]
pub use openai::{OpenAIBackend, OpenAIConfig};

pub use classifier::{build_prompt, format_options, LevelClassifier, LevelOutcome};
pub use response::{extract_between, parse_response, ParsedResponse};
pub use telemetry::{InteractionRecord, Telemetry, TelemetryConfig, TokenUsage, UsageTotals};

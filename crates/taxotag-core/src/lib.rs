//! # taxotag-core
//!
//! Core types, traits, and abstractions for taxotag.
//!
//! This crate provides the taxonomy tree, the tagging result and evaluation
//! record types, the generation backend trait, and the shared error type
//! that the other taxotag crates depend on.

pub mod defaults;
pub mod error;
pub mod logging;
pub mod models;
pub mod taxonomy;
pub mod tokenizer;
pub mod traits;

// Re-export commonly used types at crate root
pub use error::{Error, Result};
pub use models::*;
pub use taxonomy::{Taxonomy, TaxonomyNode};
pub use tokenizer::*;
pub use traits::*;

//! Token counting for usage accounting.
//!
//! Backends that report usage are trusted as-is. When a reply carries no usage
//! block, the telemetry layer counts tokens itself with a [`Tokenizer`], or
//! falls back to [`estimate_tokens`] when no tokenizer could be built.

use crate::error::{Error, Result};

/// Trait for token counting.
pub trait Tokenizer: Send + Sync {
    /// Count the number of tokens in the given text.
    fn count_tokens(&self, text: &str) -> usize;

    /// Get the name/identifier of this tokenizer.
    fn name(&self) -> &str;
}

/// Tiktoken-based tokenizer implementation.
pub struct TiktokenTokenizer {
    bpe: tiktoken_rs::CoreBPE,
    name: String,
}

impl TiktokenTokenizer {
    /// Create a tokenizer for a model tiktoken knows (e.g. "gpt-4o-mini").
    ///
    /// # Errors
    /// Returns an error if the model is not recognized or BPE initialization fails.
    pub fn new(model: &str) -> Result<Self> {
        let bpe = tiktoken_rs::get_bpe_from_model(model)
            .map_err(|e| Error::Internal(format!("Failed to initialize tokenizer: {}", e)))?;

        Ok(Self {
            bpe,
            name: model.to_string(),
        })
    }

    /// General-purpose tokenizer (cl100k_base), used for models tiktoken does
    /// not recognize such as local Ollama tags.
    pub fn cl100k() -> Result<Self> {
        let bpe = tiktoken_rs::cl100k_base()
            .map_err(|e| Error::Internal(format!("Failed to initialize cl100k_base: {}", e)))?;

        Ok(Self {
            bpe,
            name: "cl100k_base".to_string(),
        })
    }

    /// Tokenizer for `model`, falling back to cl100k_base for unknown models.
    pub fn for_model(model: &str) -> Result<Self> {
        Self::new(model).or_else(|_| Self::cl100k())
    }
}

impl Tokenizer for TiktokenTokenizer {
    fn count_tokens(&self, text: &str) -> usize {
        self.bpe.encode_ordinary(text).len()
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Quickly estimate token count without full tokenization.
///
/// Uses a heuristic ratio of ~3.7 characters per token for English text.
pub fn estimate_tokens(text: &str) -> usize {
    (text.len() as f32 / 3.7).ceil() as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    const SIMPLE_ENGLISH: &str = "The quick brown fox jumps over the lazy dog.";
    const ABSTRACT: &str = r#"
        We study hierarchical text classification with large language models.
        At each level of the taxonomy the model ranks candidate categories and
        the controller descends into the subtree of the top choice.
    "#;

    #[test]
    fn test_cl100k_initialization() {
        let tokenizer = TiktokenTokenizer::cl100k().unwrap();
        assert_eq!(tokenizer.name(), "cl100k_base");
    }

    #[test]
    fn test_new_with_known_model() {
        let tokenizer = TiktokenTokenizer::new("gpt-4").unwrap();
        assert_eq!(tokenizer.name(), "gpt-4");
    }

    #[test]
    fn test_for_model_falls_back_for_unknown_model() {
        let tokenizer = TiktokenTokenizer::for_model("local-qwen3:0.6b").unwrap();
        assert_eq!(tokenizer.name(), "cl100k_base");
    }

    #[test]
    fn test_count_tokens_simple_english() {
        let tokenizer = TiktokenTokenizer::cl100k().unwrap();
        let count = tokenizer.count_tokens(SIMPLE_ENGLISH);
        assert!((8..=12).contains(&count), "Expected ~10 tokens, got {}", count);
    }

    #[test]
    fn test_count_tokens_abstract() {
        let tokenizer = TiktokenTokenizer::cl100k().unwrap();
        assert!(tokenizer.count_tokens(ABSTRACT) > 20);
    }

    #[test]
    fn test_count_tokens_empty_string() {
        let tokenizer = TiktokenTokenizer::cl100k().unwrap();
        assert_eq!(tokenizer.count_tokens(""), 0);
    }

    #[test]
    fn test_estimate_tokens_simple() {
        // 44 chars / 3.7 = 11.89 -> 12
        assert_eq!(estimate_tokens(SIMPLE_ENGLISH), 12);
    }

    #[test]
    fn test_estimate_tokens_empty() {
        assert_eq!(estimate_tokens(""), 0);
    }
}

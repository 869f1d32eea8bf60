//! Core traits for taxotag abstractions.
//!
//! The generation backend is the only seam to the outside world: it accepts a
//! model identifier, a system string and a user string, and returns a text
//! blob. Concrete implementations live in `taxotag-inference`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Token counts reported by a backend for one request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportedUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

/// The reply to a single generation request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Generation {
    /// Raw text returned by the model.
    pub content: String,
    /// Usage as reported by the service, when it reports any.
    pub usage: Option<ReportedUsage>,
}

impl Generation {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            usage: None,
        }
    }

    pub fn with_usage(mut self, prompt_tokens: u32, completion_tokens: u32) -> Self {
        self.usage = Some(ReportedUsage {
            prompt_tokens,
            completion_tokens,
        });
        self
    }
}

/// Backend for single-shot text generation.
///
/// One call is one request/response: no streaming, no multi-turn state.
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// Generate text for `prompt` under the `system` instruction using `model`.
    async fn generate_with_system(
        &self,
        model: &str,
        system: &str,
        prompt: &str,
    ) -> Result<Generation>;

    /// Model used when the caller does not name one.
    fn default_model(&self) -> &str;
}

//! OpenAI-compatible generation backend.
//!
//! Works with any endpoint speaking the chat-completions protocol, including
//! a LiteLLM-style routing proxy, Ollama in OpenAI compatibility mode, vLLM,
//! and the OpenAI cloud API.
//!
//! # Example
//!
//! ```rust,no_run
//! use taxotag_inference::openai::{OpenAIBackend, OpenAIConfig};
//! use taxotag_core::GenerationBackend;
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = OpenAIConfig {
//!         base_url: "http://localhost:11434/v1".to_string(),
//!         gen_model: "qwen3:0.6b".to_string(),
//!         ..Default::default()
//!     };
//!     let backend = OpenAIBackend::new(config).unwrap();
//!     let reply = backend
//!         .generate_with_system("qwen3:0.6b", "You are terse.", "Say hi")
//!         .await
//!         .unwrap();
//!     println!("{}", reply.content);
//! }
//! ```

mod backend;
mod error;
mod types;

pub use backend::{OpenAIBackend, OpenAIConfig};
pub use error::{reply_error, FailureKind};
pub use types::*;

//! Scripted generation backend for deterministic testing.
//!
//! Replies are chosen in this order: the first rule whose needle occurs in
//! the prompt, then the next queued reply, then the default reply.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use taxotag_inference::mock::{candidates_reply, MockGenerationBackend};
//!
//! let backend = MockGenerationBackend::new()
//!     .with_rule("Machine learning", candidates_reply(&[("Learning paradigms", 0.9)]))
//!     .with_default_reply("no idea");
//!
//! let reply = backend.generate_with_system("m", "", "hello").await?;
//! assert_eq!(reply.content, "no idea");
//! assert_eq!(backend.call_count(), 1);
//! ```

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use taxotag_core::{Error, Generation, GenerationBackend, Result};

/// One scripted outcome.
#[derive(Debug, Clone)]
pub enum MockReply {
    Text(String),
    /// Text plus service-reported usage.
    TextWithUsage(String, u32, u32),
    /// Simulated transport or service failure.
    Fail(String),
}

impl MockReply {
    fn into_result(self) -> Result<Generation> {
        match self {
            MockReply::Text(text) => Ok(Generation::new(text)),
            MockReply::TextWithUsage(text, p, c) => Ok(Generation::new(text).with_usage(p, c)),
            MockReply::Fail(msg) => Err(Error::Inference(msg)),
        }
    }
}

/// A recorded call to the mock.
#[derive(Debug, Clone)]
pub struct MockCall {
    pub model: String,
    pub system: String,
    pub prompt: String,
    pub timestamp: std::time::Instant,
}

/// Generation backend returning scripted replies.
#[derive(Clone)]
pub struct MockGenerationBackend {
    rules: Arc<Vec<(String, MockReply)>>,
    queue: Arc<Mutex<VecDeque<MockReply>>>,
    default_reply: MockReply,
    default_model: String,
    latency_ms: u64,
    call_log: Arc<Mutex<Vec<MockCall>>>,
}

impl MockGenerationBackend {
    /// Create a mock whose default reply carries no structured block.
    pub fn new() -> Self {
        Self {
            rules: Arc::new(Vec::new()),
            queue: Arc::new(Mutex::new(VecDeque::new())),
            default_reply: MockReply::Text("Mock response".to_string()),
            default_model: "mock-model".to_string(),
            latency_ms: 0,
            call_log: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Reply with `reply` whenever the prompt contains `needle`.
    pub fn with_rule(mut self, needle: impl Into<String>, reply: impl Into<String>) -> Self {
        Arc::make_mut(&mut self.rules).push((needle.into(), MockReply::Text(reply.into())));
        self
    }

    /// Fail whenever the prompt contains `needle`.
    pub fn with_failure_rule(mut self, needle: impl Into<String>, message: impl Into<String>) -> Self {
        Arc::make_mut(&mut self.rules).push((needle.into(), MockReply::Fail(message.into())));
        self
    }

    /// Queue a text reply for the next unmatched call.
    pub fn with_reply(self, reply: impl Into<String>) -> Self {
        self.push(MockReply::Text(reply.into()));
        self
    }

    /// Queue an arbitrary outcome for the next unmatched call.
    pub fn with_outcome(self, outcome: MockReply) -> Self {
        self.push(outcome);
        self
    }

    /// Queue a failure for the next unmatched call.
    pub fn with_failure(self, message: impl Into<String>) -> Self {
        self.push(MockReply::Fail(message.into()));
        self
    }

    /// Reply used once rules and the queue are exhausted.
    pub fn with_default_reply(mut self, reply: impl Into<String>) -> Self {
        self.default_reply = MockReply::Text(reply.into());
        self
    }

    pub fn with_default_model(mut self, model: impl Into<String>) -> Self {
        self.default_model = model.into();
        self
    }

    /// Delay every reply, in milliseconds.
    pub fn with_latency_ms(mut self, latency_ms: u64) -> Self {
        self.latency_ms = latency_ms;
        self
    }

    fn push(&self, reply: MockReply) {
        self.queue.lock().unwrap().push_back(reply);
    }

    /// All calls so far, in arrival order.
    pub fn get_calls(&self) -> Vec<MockCall> {
        self.call_log.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.call_log.lock().unwrap().len()
    }

    pub fn clear_calls(&self) {
        self.call_log.lock().unwrap().clear()
    }

    fn next_reply(&self, prompt: &str) -> MockReply {
        if let Some((_, reply)) = self.rules.iter().find(|(needle, _)| prompt.contains(needle)) {
            return reply.clone();
        }
        self.queue
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.default_reply.clone())
    }
}

impl Default for MockGenerationBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl GenerationBackend for MockGenerationBackend {
    async fn generate_with_system(
        &self,
        model: &str,
        system: &str,
        prompt: &str,
    ) -> Result<Generation> {
        self.call_log.lock().unwrap().push(MockCall {
            model: model.to_string(),
            system: system.to_string(),
            prompt: prompt.to_string(),
            timestamp: std::time::Instant::now(),
        });

        if self.latency_ms > 0 {
            tokio::time::sleep(std::time::Duration::from_millis(self.latency_ms)).await;
        }

        self.next_reply(prompt).into_result()
    }

    fn default_model(&self) -> &str {
        &self.default_model
    }
}

/// Render a reply carrying `labels` as ranked candidates in a fenced block.
pub fn candidates_reply(labels: &[(&str, f64)]) -> String {
    let candidates: Vec<_> = labels
        .iter()
        .map(|(label, confidence)| {
            serde_json::json!({
                "label": label,
                "confidence": confidence,
                "rationale": format!("mentions {}", label),
            })
        })
        .collect();
    format!(
        "<think>scripted</think>\n```json\n{}\n```",
        serde_json::json!({ "candidates": candidates })
    )
}

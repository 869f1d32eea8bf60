//! OpenAI-compatible generation backend implementation.

use async_trait::async_trait;
use reqwest::Client;
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument, warn};

use taxotag_core::defaults;
use taxotag_core::{Error, Generation, GenerationBackend, Result};

use super::error::reply_error;
use super::types::{ChatReply, ChatRequest};

/// Configuration for the OpenAI-compatible backend.
#[derive(Debug, Clone)]
pub struct OpenAIConfig {
    /// Base URL for the API endpoint (the `/chat/completions` parent).
    pub base_url: String,
    /// API key for authentication (optional behind a routing proxy).
    pub api_key: Option<String>,
    /// Model used when the caller does not name one.
    pub gen_model: String,
    /// Request timeout in seconds.
    pub timeout_seconds: u64,
    /// Skip TLS verification (for self-signed certs in local environments).
    pub skip_tls_verify: bool,
    /// Sampling temperature; left to the server when unset.
    pub temperature: Option<f32>,
    /// Completion token cap; left to the server when unset.
    pub max_tokens: Option<u32>,
}

impl Default for OpenAIConfig {
    fn default() -> Self {
        Self {
            base_url: defaults::BASE_URL.to_string(),
            api_key: None,
            gen_model: defaults::GEN_MODEL.to_string(),
            timeout_seconds: defaults::GEN_TIMEOUT_SECS,
            skip_tls_verify: false,
            temperature: None,
            max_tokens: None,
        }
    }
}

impl OpenAIConfig {
    /// Read configuration from `TAXOTAG_*` environment variables.
    pub fn from_env() -> Self {
        Self {
            base_url: std::env::var("TAXOTAG_BASE_URL")
                .unwrap_or_else(|_| defaults::BASE_URL.to_string()),
            api_key: std::env::var("TAXOTAG_API_KEY").ok().filter(|k| !k.is_empty()),
            gen_model: std::env::var("TAXOTAG_MODEL")
                .unwrap_or_else(|_| defaults::GEN_MODEL.to_string()),
            timeout_seconds: std::env::var("TAXOTAG_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults::GEN_TIMEOUT_SECS),
            skip_tls_verify: std::env::var("TAXOTAG_SKIP_TLS_VERIFY")
                .map(|v| v == "1" || v.to_lowercase() == "true")
                .unwrap_or(false),
            temperature: std::env::var("TAXOTAG_TEMPERATURE")
                .ok()
                .and_then(|s| s.parse().ok()),
            max_tokens: std::env::var("TAXOTAG_MAX_TOKENS")
                .ok()
                .and_then(|s| s.parse().ok()),
        }
    }
}

/// OpenAI-compatible generation backend.
pub struct OpenAIBackend {
    client: Client,
    config: OpenAIConfig,
}

impl OpenAIBackend {
    /// Create a new backend with the given configuration.
    pub fn new(config: OpenAIConfig) -> Result<Self> {
        let mut client_builder =
            Client::builder().timeout(Duration::from_secs(config.timeout_seconds));

        if config.skip_tls_verify {
            client_builder = client_builder.danger_accept_invalid_certs(true);
        }

        let client = client_builder
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))?;

        info!(
            "Initializing OpenAI-compatible backend: url={}, model={}",
            config.base_url, config.gen_model
        );

        Ok(Self { client, config })
    }

    /// Create with default configuration.
    pub fn with_defaults() -> Result<Self> {
        Self::new(OpenAIConfig::default())
    }

    /// Create from environment variables.
    pub fn from_env() -> Result<Self> {
        Self::new(OpenAIConfig::from_env())
    }

    /// Get the current configuration.
    pub fn config(&self) -> &OpenAIConfig {
        &self.config
    }

    /// Build a POST request with authentication if configured.
    fn build_request(&self, endpoint: &str) -> reqwest::RequestBuilder {
        let url = format!("{}{}", self.config.base_url.trim_end_matches('/'), endpoint);
        let mut req = self.client.post(&url);

        if let Some(ref api_key) = self.config.api_key {
            req = req.header("Authorization", format!("Bearer {}", api_key));
        }

        req.header("Content-Type", "application/json")
    }
}

#[async_trait]
impl GenerationBackend for OpenAIBackend {
    #[instrument(skip(self, system, prompt), fields(subsystem = "inference", component = "openai", op = "generate", model = %model, prompt_len = prompt.len()))]
    async fn generate_with_system(
        &self,
        model: &str,
        system: &str,
        prompt: &str,
    ) -> Result<Generation> {
        let start = Instant::now();

        let mut request = ChatRequest::single_turn(model, system, prompt);
        request.temperature = self.config.temperature;
        request.max_tokens = self.config.max_tokens;

        let response = self
            .build_request("/chat/completions")
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::Inference(format!("Request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(reply_error(status.as_u16(), &body));
        }

        let reply: ChatReply = response
            .json()
            .await
            .map_err(|e| Error::Inference(format!("Failed to parse response: {}", e)))?;

        let text = reply
            .first_text()
            .ok_or_else(|| Error::Inference("Response contained no choices".to_string()))?;
        let mut generation = Generation::new(text);
        if let Some(usage) = reply.usage {
            generation = generation.with_usage(usage.prompt_tokens, usage.completion_tokens);
        }

        let elapsed = start.elapsed().as_millis() as u64;
        debug!(
            response_len = generation.content.len(),
            duration_ms = elapsed,
            "Generation complete"
        );
        if elapsed > defaults::SLOW_GENERATION_MS {
            warn!(
                duration_ms = elapsed,
                prompt_len = prompt.len(),
                slow = true,
                "Slow generation operation"
            );
        }
        Ok(generation)
    }

    fn default_model(&self) -> &str {
        &self.config.gen_model
    }
}

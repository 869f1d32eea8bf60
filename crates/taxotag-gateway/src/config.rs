//! Gateway configuration.

use serde_json::{json, Map, Value};

use taxotag_core::defaults;
use taxotag_core::{Error, Result};

/// Settings for the forwarding gateway.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Upstream base URL, without a trailing slash.
    pub target: String,
    pub host: String,
    pub port: u16,
    pub client_identifier: String,
    pub release: String,
    pub temperature: f64,
    pub max_tokens: u64,
    /// Upstream request timeout.
    pub timeout_seconds: u64,
}

impl GatewayConfig {
    /// Config for `target` with every other field at its default.
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into().trim_end_matches('/').to_string(),
            host: "0.0.0.0".to_string(),
            port: defaults::GATEWAY_PORT,
            client_identifier: defaults::GATEWAY_CLIENT_IDENTIFIER.to_string(),
            release: defaults::GATEWAY_RELEASE.to_string(),
            temperature: defaults::GATEWAY_TEMPERATURE,
            max_tokens: defaults::GATEWAY_MAX_TOKENS,
            timeout_seconds: defaults::GATEWAY_TIMEOUT_SECS,
        }
    }

    /// Create config from environment variables.
    ///
    /// | Variable | Default | Description |
    /// |----------|---------|-------------|
    /// | `GATEWAY_TARGET` | (required) | Upstream base URL |
    /// | `GATEWAY_HOST` | `0.0.0.0` | Listen address |
    /// | `GATEWAY_PORT` | `4001` | Listen port |
    /// | `GATEWAY_CLIENT_IDENTIFIER` | `ml-ca-dev` | Merged `client_identifier` |
    /// | `GATEWAY_RELEASE` | `ml_ca_taxotag` | Merged `tracking_params.release` |
    /// | `GATEWAY_TEMPERATURE` | `0` | Merged `temperature` |
    /// | `GATEWAY_MAX_TOKENS` | `300` | Merged `max_tokens` |
    /// | `GATEWAY_TIMEOUT_SECS` | `300` | Upstream request timeout |
    pub fn from_env() -> Result<Self> {
        let target = std::env::var("GATEWAY_TARGET")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| Error::Config("GATEWAY_TARGET is not set".to_string()))?;
        if !target.starts_with("http://") && !target.starts_with("https://") {
            return Err(Error::Config(format!(
                "GATEWAY_TARGET must be an http(s) URL, got {}",
                target
            )));
        }

        let mut config = Self::new(target);
        if let Ok(host) = std::env::var("GATEWAY_HOST") {
            config.host = host;
        }
        config.port = parse_env("GATEWAY_PORT")?.unwrap_or(config.port);
        if let Ok(id) = std::env::var("GATEWAY_CLIENT_IDENTIFIER") {
            config.client_identifier = id;
        }
        if let Ok(release) = std::env::var("GATEWAY_RELEASE") {
            config.release = release;
        }
        config.temperature = parse_env("GATEWAY_TEMPERATURE")?.unwrap_or(config.temperature);
        config.max_tokens = parse_env("GATEWAY_MAX_TOKENS")?.unwrap_or(config.max_tokens);
        config.timeout_seconds =
            parse_env("GATEWAY_TIMEOUT_SECS")?.unwrap_or(config.timeout_seconds);
        Ok(config)
    }

    /// Top-level body parameters merged under every forwarded request.
    pub fn default_body(&self) -> Map<String, Value> {
        let mut body = Map::new();
        body.insert("client_identifier".into(), json!(self.client_identifier));
        body.insert("temperature".into(), json!(self.temperature));
        body.insert("max_tokens".into(), json!(self.max_tokens));
        body.insert(
            "tracking_params".into(),
            json!({ "release": self.release }),
        );
        body
    }
}

fn parse_env<T: std::str::FromStr>(key: &str) -> Result<Option<T>> {
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| Error::Config(format!("{} has an invalid value: {}", key, raw))),
        Err(_) => Ok(None),
    }
}

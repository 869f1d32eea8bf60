//! Classification of failed chat-completions replies.

use tracing::warn;

use taxotag_core::Error;

use super::types::ErrorEnvelope;

/// Why the service refused a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Missing or rejected credentials.
    Auth,
    RateLimited,
    UnknownModel,
    /// Prompt exceeds the model context window.
    PromptTooLong,
    /// 5xx from the service or a proxy in front of it.
    Upstream,
    Other,
}

impl FailureKind {
    pub fn classify(status: u16, error_kind: &str) -> Self {
        match status {
            401 | 403 => Self::Auth,
            429 => Self::RateLimited,
            404 => Self::UnknownModel,
            _ if error_kind == "model_not_found" => Self::UnknownModel,
            400 if error_kind.contains("context_length") => Self::PromptTooLong,
            500..=599 => Self::Upstream,
            _ => Self::Other,
        }
    }

    /// Failures that may clear up on their own. Flagged in the error text;
    /// nothing here retries.
    pub fn is_transient(self) -> bool {
        matches!(self, Self::RateLimited | Self::Upstream)
    }

    /// Misconfiguration rather than a per-request problem.
    pub fn is_config(self) -> bool {
        matches!(self, Self::Auth | Self::UnknownModel)
    }
}

/// Build the error for a non-success reply from its status and raw body.
///
/// The message is taken from an `{"error": {..}}` envelope when the body
/// holds one, and from the raw body otherwise.
pub fn reply_error(status: u16, body: &str) -> Error {
    let (message, error_kind) = match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(envelope) => (envelope.error.message, envelope.error.kind),
        Err(_) => (body.trim().to_string(), String::new()),
    };
    let kind = FailureKind::classify(status, &error_kind);
    let transient = kind.is_transient();
    warn!(
        subsystem = "inference",
        component = "openai",
        status,
        kind = ?kind,
        transient,
        "Generation request rejected"
    );
    let text = if transient {
        format!("server returned {} ({:?}, transient): {}", status, kind, message)
    } else {
        format!("server returned {} ({:?}): {}", status, kind, message)
    };
    if kind.is_config() {
        Error::Config(text)
    } else {
        Error::Inference(text)
    }
}

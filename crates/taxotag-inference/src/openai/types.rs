//! Chat-completions wire shapes.
//!
//! Only the fields the classifier reads are decoded; unknown fields are
//! ignored so that routing proxies adding their own keys still parse.

use serde::{Deserialize, Serialize};

/// Outgoing request. Messages borrow the caller's strings.
#[derive(Debug, Serialize)]
pub struct ChatRequest<'a> {
    pub model: &'a str,
    pub messages: Vec<ChatMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    pub stream: bool,
}

impl<'a> ChatRequest<'a> {
    /// A single-turn request; the system message is omitted when empty.
    pub fn single_turn(model: &'a str, system: &'a str, user: &'a str) -> Self {
        let mut messages = Vec::with_capacity(2);
        if !system.is_empty() {
            messages.push(ChatMessage {
                role: "system",
                content: system,
            });
        }
        messages.push(ChatMessage {
            role: "user",
            content: user,
        });
        Self {
            model,
            messages,
            temperature: None,
            max_tokens: None,
            stream: false,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ChatMessage<'a> {
    pub role: &'static str,
    pub content: &'a str,
}

/// Successful reply.
#[derive(Debug, Deserialize)]
pub struct ChatReply {
    pub choices: Vec<ReplyChoice>,
    #[serde(default)]
    pub usage: Option<ReplyUsage>,
}

impl ChatReply {
    /// Text of the first choice. A `null` content reads as empty.
    pub fn first_text(&self) -> Option<&str> {
        self.choices
            .first()
            .map(|c| c.message.content.as_deref().unwrap_or_default())
    }
}

#[derive(Debug, Deserialize)]
pub struct ReplyChoice {
    pub message: ReplyMessage,
}

#[derive(Debug, Deserialize)]
pub struct ReplyMessage {
    #[serde(default)]
    pub content: Option<String>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct ReplyUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

/// `{"error": {"message": .., "type": ..}}` body of a failed reply.
#[derive(Debug, Deserialize)]
pub struct ErrorEnvelope {
    pub error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
pub struct ErrorDetail {
    pub message: String,
    #[serde(rename = "type", default)]
    pub kind: String,
}

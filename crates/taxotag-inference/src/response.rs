//! Tolerant parsing of semi-structured model replies.
//!
//! A classification reply is expected to carry an optional reasoning segment
//! between `<think>` and `</think>` and a fenced ```` ```json ```` block with
//! the ranked candidates. Neither is guaranteed. Missing or malformed
//! structured data produces an empty record, which callers treat as the
//! "no candidates" outcome rather than as an error.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use taxotag_core::Candidate;

/// Opening reasoning marker.
pub const THINK_START: &str = "<think>";
/// Closing reasoning marker.
pub const THINK_END: &str = "</think>";
/// Opening fence of the structured block.
pub const JSON_FENCE_START: &str = "```json";
/// Closing fence of the structured block.
pub const JSON_FENCE_END: &str = "```";

static THINK_RE: Lazy<Regex> = Lazy::new(|| between_regex(THINK_START, THINK_END));
static JSON_FENCE_RE: Lazy<Regex> = Lazy::new(|| between_regex(JSON_FENCE_START, JSON_FENCE_END));

// Both markers are escaped, so the pattern always compiles.
fn between_regex(start: &str, end: &str) -> Regex {
    Regex::new(&format!(
        "(?s){}(.*?){}",
        regex::escape(start),
        regex::escape(end)
    ))
    .unwrap()
}

/// A reply split into its reasoning segment and its structured record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedResponse {
    /// Text of the first `<think>` segment, if any.
    pub reasoning: Option<String>,
    /// Decoded structured block; empty when absent or malformed.
    pub record: Map<String, Value>,
}

impl ParsedResponse {
    /// True when no structured data was recovered.
    pub fn is_empty(&self) -> bool {
        self.record.is_empty()
    }

    /// Ranked candidates from the record's `candidates` array.
    ///
    /// See [`decode_candidates`].
    pub fn candidates(&self) -> Vec<Candidate> {
        self.record
            .get("candidates")
            .map(decode_candidates)
            .unwrap_or_default()
    }
}

/// Return every substring of `text` enclosed by `start` and `end`, in order.
///
/// Matching is non-greedy and spans newlines.
///
/// # Examples
///
/// ```
/// use taxotag_inference::response::extract_between;
///
/// let text = "[a] and [b]";
/// assert_eq!(extract_between("[", "]", text), vec!["a", "b"]);
/// assert!(extract_between("<x>", "</x>", text).is_empty());
/// ```
pub fn extract_between<'a>(start: &str, end: &str, text: &'a str) -> Vec<&'a str> {
    let re = match (start, end) {
        (THINK_START, THINK_END) => return captures(&THINK_RE, text),
        (JSON_FENCE_START, JSON_FENCE_END) => return captures(&JSON_FENCE_RE, text),
        _ => between_regex(start, end),
    };
    captures(&re, text)
}

fn captures<'a>(re: &Regex, text: &'a str) -> Vec<&'a str> {
    re.captures_iter(text)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str())
        .collect()
}

/// First reasoning segment of a reply, if present.
pub fn extract_reasoning(text: &str) -> Option<String> {
    captures(&THINK_RE, text)
        .first()
        .map(|s| s.trim().to_string())
}

/// Decode the first fenced JSON block of a reply into an object.
///
/// Returns an empty map when there is no block, the block is not valid JSON,
/// or the JSON is not an object.
pub fn extract_record(text: &str) -> Map<String, Value> {
    let blocks = captures(&JSON_FENCE_RE, text);
    let Some(block) = blocks.first() else {
        debug!(response_len = text.len(), "No fenced JSON block in response");
        return Map::new();
    };

    match serde_json::from_str::<Value>(block.trim()) {
        Ok(Value::Object(map)) => map,
        Ok(other) => {
            warn!(
                kind = json_kind(&other),
                "Fenced JSON block is not an object, treating as empty"
            );
            Map::new()
        }
        Err(e) => {
            warn!(error = %e, "Failed to decode fenced JSON block, treating as empty");
            Map::new()
        }
    }
}

/// Split a raw reply into its reasoning segment and structured record.
///
/// # Examples
///
/// ```
/// use taxotag_inference::response::parse_response;
///
/// let reply = "<think>It is about learning.</think>\n```json\n{\"candidates\": [{\"label\": \"Machine learning\", \"confidence\": 0.9, \"rationale\": \"training\"}]}\n```";
/// let parsed = parse_response(reply);
/// assert_eq!(parsed.reasoning.as_deref(), Some("It is about learning."));
/// assert_eq!(parsed.candidates()[0].label, "Machine learning");
///
/// let garbage = parse_response("I cannot decide.");
/// assert!(garbage.is_empty());
/// assert!(garbage.candidates().is_empty());
/// ```
pub fn parse_response(text: &str) -> ParsedResponse {
    ParsedResponse {
        reasoning: extract_reasoning(text),
        record: extract_record(text),
    }
}

/// Decode a `candidates` value into ranked candidates, keeping model order.
///
/// Entries that are not objects or lack a string `label` are skipped. A
/// missing `confidence` becomes 0.0 and a missing `rationale` an empty string.
pub fn decode_candidates(value: &Value) -> Vec<Candidate> {
    let Some(items) = value.as_array() else {
        warn!(kind = json_kind(value), "candidates is not an array, ignoring");
        return Vec::new();
    };

    items
        .iter()
        .filter_map(|item| {
            let label = item.get("label").and_then(Value::as_str);
            let Some(label) = label else {
                warn!("Skipping candidate without a string label");
                return None;
            };
            let confidence = item
                .get("confidence")
                .and_then(Value::as_f64)
                .unwrap_or(0.0);
            let rationale = item
                .get("rationale")
                .and_then(Value::as_str)
                .unwrap_or_default();
            Some(Candidate::new(label, confidence, rationale))
        })
        .collect()
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

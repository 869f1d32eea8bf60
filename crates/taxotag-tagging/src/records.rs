//! Reading corpus, prediction, and ground-truth lines.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use taxotag_core::{Error, GroundTruthRecord, PaperId, PredictionRecord, Result, TaggingResult};

/// Default field holding the document identifier.
pub const DEFAULT_ID_FIELD: &str = "paper_id";

/// One line of `taxotag tag` output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaggedRecord {
    pub paper_id: PaperId,
    pub model: String,
    pub result: TaggingResult,
}

/// Text to classify for a corpus record.
///
/// With `text_field`, that string field is used as-is. Otherwise the
/// non-empty `title` and `abstract` fields are joined by a blank line.
pub fn document_text(record: &Value, text_field: Option<&str>) -> Option<String> {
    if let Some(field) = text_field {
        return record
            .get(field)
            .and_then(Value::as_str)
            .map(str::to_string);
    }

    let parts: Vec<&str> = ["title", "abstract"]
        .iter()
        .filter_map(|f| record.get(*f).and_then(Value::as_str))
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("\n\n"))
    }
}

/// Identifier of a corpus record, if `id_field` holds an integer or string.
pub fn paper_id(record: &Value, id_field: &str) -> Option<PaperId> {
    match record.get(id_field)? {
        Value::Number(n) => n.as_i64().map(PaperId::Int),
        Value::String(s) => Some(PaperId::Text(s.clone())),
        _ => None,
    }
}

/// Identifier of the corpus record at zero-based `idx`, or `line-<n>` when
/// `id_field` is unusable. The text form cannot collide with integer ids.
pub fn paper_id_or_line(record: &Value, id_field: &str, idx: usize) -> PaperId {
    paper_id(record, id_field).unwrap_or_else(|| {
        let fallback = PaperId::Text(format!("line-{}", idx + 1));
        warn!(
            line = idx + 1,
            id_field,
            paper_id = %fallback,
            "Record has no usable id, using its line number"
        );
        fallback
    })
}

/// Decode prediction lines.
///
/// A line carrying a `result` key is `taxotag tag` output and is flattened
/// into one record per level; any other line is a flat prediction record.
pub fn load_predictions(lines: Vec<Value>) -> Result<Vec<PredictionRecord>> {
    let mut out = Vec::new();
    for (idx, line) in lines.into_iter().enumerate() {
        if line.get("result").is_some() {
            let tagged: TaggedRecord = serde_json::from_value(line)
                .map_err(|e| Error::Serialization(format!("prediction line {}: {}", idx + 1, e)))?;
            out.extend(tagged.result.to_predictions(&tagged.paper_id));
        } else {
            let record: PredictionRecord = serde_json::from_value(line)
                .map_err(|e| Error::Serialization(format!("prediction line {}: {}", idx + 1, e)))?;
            out.push(record);
        }
    }
    Ok(out)
}

/// Decode ground-truth lines, warning on duplicate keys.
pub fn load_ground_truth(lines: Vec<Value>) -> Result<Vec<GroundTruthRecord>> {
    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::with_capacity(lines.len());
    for (idx, line) in lines.into_iter().enumerate() {
        let record: GroundTruthRecord = serde_json::from_value(line)
            .map_err(|e| Error::Serialization(format!("ground truth line {}: {}", idx + 1, e)))?;
        if !seen.insert(record.key()) {
            warn!(
                paper_id = %record.paper_id,
                level = record.level,
                "Duplicate ground truth key, later record wins"
            );
        }
        out.push(record);
    }
    Ok(out)
}

//! Core data models for taxotag.
//!
//! These types are shared across the taxotag crates: the per-level
//! classification candidate, the nested tagging result (the provenance tree),
//! and the flat prediction / ground-truth records consumed by evaluation.

use std::fmt;

use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

// =============================================================================
// CLASSIFICATION TYPES
// =============================================================================

/// One ranked choice returned by the model for a single taxonomy level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    /// Expected to name an offered category; not validated against the tree.
    pub label: String,
    /// 0.0-1.0 in well-formed output, not otherwise range-checked.
    #[serde(default)]
    pub confidence: f64,
    #[serde(default)]
    pub rationale: String,
}

impl Candidate {
    pub fn new(label: impl Into<String>, confidence: f64, rationale: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            confidence,
            rationale: rationale.into(),
        }
    }
}

/// Provenance of one document's descent through the taxonomy.
///
/// Each node records the candidates offered at one level and the chosen
/// label; `children` holds the result for the chosen node's subtree. An empty
/// node (no prediction) marks a halt and serializes as `{}`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct TaggingResult {
    #[serde(default)]
    prediction: Option<String>,
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default, deserialize_with = "deserialize_children")]
    children: Option<Box<TaggingResult>>,
}

impl TaggingResult {
    /// The halt node: no prediction, no candidates, no children.
    pub fn empty() -> Self {
        Self::default()
    }

    /// A populated level whose prediction is the first candidate's label.
    ///
    /// Returns the empty node when `candidates` is empty.
    pub fn from_candidates(candidates: Vec<Candidate>, children: TaggingResult) -> Self {
        let Some(top) = candidates.first() else {
            return Self::empty();
        };
        Self {
            prediction: Some(top.label.clone()),
            children: if children.is_empty() {
                None
            } else {
                Some(Box::new(children))
            },
            candidates,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.prediction.is_none() && self.candidates.is_empty() && self.children.is_none()
    }

    pub fn prediction(&self) -> Option<&str> {
        self.prediction.as_deref()
    }

    pub fn candidates(&self) -> &[Candidate] {
        &self.candidates
    }

    /// Result for the chosen node's subtree, if the descent continued.
    pub fn children(&self) -> Option<&TaggingResult> {
        self.children.as_deref()
    }

    /// Iterate over the populated levels from the top down.
    pub fn iter_levels(&self) -> impl Iterator<Item = &TaggingResult> {
        std::iter::successors(Some(self), |node| node.children())
            .take_while(|node| !node.is_empty())
    }

    /// Number of levels that produced a prediction.
    pub fn levels(&self) -> usize {
        self.iter_levels().count()
    }

    /// Chosen labels from the top level down to the terminal one.
    pub fn path(&self) -> Vec<String> {
        self.iter_levels()
            .filter_map(|node| node.prediction.clone())
            .collect()
    }

    /// Flatten into one prediction record per level (levels start at 1).
    pub fn to_predictions(&self, paper_id: &PaperId) -> Vec<PredictionRecord> {
        let mut parent_path = Vec::new();
        let mut out = Vec::new();
        for (idx, node) in self.iter_levels().enumerate() {
            let Some(label) = node.prediction.clone() else {
                break;
            };
            out.push(PredictionRecord {
                paper_id: paper_id.clone(),
                level: idx as u32 + 1,
                label: label.clone(),
                rationale: node
                    .candidates
                    .first()
                    .map(|c| c.rationale.clone())
                    .unwrap_or_default(),
                parent_path: parent_path.clone(),
                soft_targets: node.candidates.iter().map(SoftTarget::from).collect(),
            });
            parent_path.push(label);
        }
        out
    }
}

impl Serialize for TaggingResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if self.is_empty() {
            return serializer.serialize_map(Some(0))?.end();
        }
        let mut map = serializer.serialize_map(Some(3))?;
        map.serialize_entry("prediction", &self.prediction)?;
        map.serialize_entry("candidates", &self.candidates)?;
        match &self.children {
            Some(child) => map.serialize_entry("children", child.as_ref())?,
            None => map.serialize_entry("children", &TaggingResult::empty())?,
        }
        map.end()
    }
}

fn deserialize_children<'de, D>(deserializer: D) -> Result<Option<Box<TaggingResult>>, D::Error>
where
    D: Deserializer<'de>,
{
    let child = Option::<TaggingResult>::deserialize(deserializer)?;
    Ok(child.filter(|c| !c.is_empty()).map(Box::new))
}

// =============================================================================
// EVALUATION RECORDS
// =============================================================================

/// Document identifier; datasets use either integers or strings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PaperId {
    Int(i64),
    Text(String),
}

impl fmt::Display for PaperId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PaperId::Int(id) => write!(f, "{}", id),
            PaperId::Text(id) => f.write_str(id),
        }
    }
}

impl From<i64> for PaperId {
    fn from(id: i64) -> Self {
        PaperId::Int(id)
    }
}

impl From<&str> for PaperId {
    fn from(id: &str) -> Self {
        PaperId::Text(id.to_string())
    }
}

/// An acceptable label with its relative merit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SoftTarget {
    pub label: String,
    #[serde(default)]
    pub confidence: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rationale: Option<String>,
}

impl SoftTarget {
    pub fn new(label: impl Into<String>, confidence: f64) -> Self {
        Self {
            label: label.into(),
            confidence,
            rationale: None,
        }
    }
}

impl From<&Candidate> for SoftTarget {
    fn from(c: &Candidate) -> Self {
        Self {
            label: c.label.clone(),
            confidence: c.confidence,
            rationale: Some(c.rationale.clone()),
        }
    }
}

/// A single per-level prediction, keyed by `(paper_id, level)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionRecord {
    pub paper_id: PaperId,
    pub level: u32,
    pub label: String,
    #[serde(default)]
    pub rationale: String,
    #[serde(default)]
    pub parent_path: Vec<String>,
    /// The ranked alternatives the model offered at this level.
    #[serde(default)]
    pub soft_targets: Vec<SoftTarget>,
}

impl PredictionRecord {
    pub fn new(paper_id: impl Into<PaperId>, level: u32, label: impl Into<String>) -> Self {
        Self {
            paper_id: paper_id.into(),
            level,
            label: label.into(),
            rationale: String::new(),
            parent_path: Vec::new(),
            soft_targets: Vec::new(),
        }
    }

    pub fn key(&self) -> (PaperId, u32) {
        (self.paper_id.clone(), self.level)
    }
}

/// Gold annotation for one document at one level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroundTruthRecord {
    pub paper_id: PaperId,
    pub level: u32,
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    #[serde(default)]
    pub soft_targets: Vec<SoftTarget>,
}

impl GroundTruthRecord {
    pub fn new(paper_id: impl Into<PaperId>, level: u32, label: impl Into<String>) -> Self {
        Self {
            paper_id: paper_id.into(),
            level,
            label: label.into(),
            confidence: None,
            soft_targets: Vec::new(),
        }
    }

    pub fn with_soft_targets(mut self, soft_targets: Vec<SoftTarget>) -> Self {
        self.soft_targets = soft_targets;
        self
    }

    pub fn key(&self) -> (PaperId, u32) {
        (self.paper_id.clone(), self.level)
    }
}

//! Hierarchical category taxonomy.
//!
//! A [`Taxonomy`] owns a single root node; every other node is exclusively
//! owned by its parent. Nodes carry no parent reference, so upward navigation
//! is done by re-deriving a name path from the root ([`Taxonomy::find_path`]).
//!
//! The serialized form is the nested record
//! `{name, description, depth, children: [...]}`. Loading preserves the stored
//! `depth` values verbatim; use [`Taxonomy::validate`] to check them.

use std::collections::HashSet;
use std::fmt;
use std::path::Path;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value as JsonValue;
use tracing::debug;

use crate::defaults::{TAXONOMY_ROOT_DESCRIPTION, TAXONOMY_ROOT_NAME};
use crate::error::{Error, Result};

/// A single category in the taxonomy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaxonomyNode {
    /// Unique among siblings; acts as the key under the parent.
    pub name: String,
    /// Free-text description, may be empty.
    pub description: String,
    /// Distance from the root (root = 0).
    pub depth: u32,
    children: Vec<TaxonomyNode>,
}

impl TaxonomyNode {
    /// Create a childless node.
    pub fn new(name: impl Into<String>, description: impl Into<String>, depth: u32) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            depth,
            children: Vec::new(),
        }
    }

    /// Immediate children in insertion order.
    pub fn children(&self) -> &[TaxonomyNode] {
        &self.children
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// Add a child under this node.
    ///
    /// A child with the same name is replaced in place, keeping its position.
    pub fn add_child(&mut self, child: TaxonomyNode) {
        match self.children.iter_mut().find(|c| c.name == child.name) {
            Some(existing) => *existing = child,
            None => self.children.push(child),
        }
    }

    /// Retrieve a direct child by name.
    pub fn get_child(&self, name: &str) -> Option<&TaxonomyNode> {
        self.children.iter().find(|c| c.name == name)
    }

    /// Pre-order search of this subtree for the first node named `name`.
    pub fn find(&self, name: &str) -> Option<&TaxonomyNode> {
        if self.name == name {
            return Some(self);
        }
        self.children.iter().find_map(|child| child.find(name))
    }

    /// Names from this node down to the first node named `name`.
    pub fn find_path(&self, name: &str) -> Option<Vec<String>> {
        let mut path = Vec::new();
        if self.collect_path(name, &mut path) {
            Some(path)
        } else {
            None
        }
    }

    fn collect_path(&self, name: &str, path: &mut Vec<String>) -> bool {
        path.push(self.name.clone());
        if self.name == name {
            return true;
        }
        for child in &self.children {
            if child.collect_path(name, path) {
                return true;
            }
        }
        path.pop();
        false
    }

    /// Convert this node and its subtree into the nested serialized form.
    pub fn to_dict(&self) -> JsonValue {
        serde_json::json!({
            "name": self.name,
            "description": self.description,
            "depth": self.depth,
            "children": self.children.iter().map(TaxonomyNode::to_dict).collect::<Vec<_>>(),
        })
    }

    fn from_dict(data: &JsonValue) -> Result<Self> {
        let obj = data.as_object().ok_or_else(|| {
            Error::Serialization(format!("taxonomy node must be an object, got {}", data))
        })?;

        let name = obj
            .get("name")
            .and_then(JsonValue::as_str)
            .ok_or_else(|| Error::Serialization("taxonomy node is missing a string 'name'".into()))?;

        let description = match obj.get("description") {
            None | Some(JsonValue::Null) => "",
            Some(JsonValue::String(s)) => s.as_str(),
            Some(other) => {
                return Err(Error::Serialization(format!(
                    "description of '{}' must be a string, got {}",
                    name, other
                )))
            }
        };

        let depth = match obj.get("depth") {
            None | Some(JsonValue::Null) => 0,
            Some(v) => v
                .as_u64()
                .and_then(|d| u32::try_from(d).ok())
                .ok_or_else(|| {
                    Error::Serialization(format!("depth of '{}' must be a non-negative integer", name))
                })?,
        };

        let mut node = TaxonomyNode::new(name, description, depth);
        match obj.get("children") {
            None | Some(JsonValue::Null) => {}
            Some(JsonValue::Array(items)) => {
                // Stored as-is, duplicates included; `validate` reports those.
                for item in items {
                    node.children.push(TaxonomyNode::from_dict(item)?);
                }
            }
            Some(other) => {
                return Err(Error::Serialization(format!(
                    "children of '{}' must be an array, got {}",
                    name, other
                )))
            }
        }
        Ok(node)
    }

    fn max_leaf_depth(&self) -> u32 {
        self.children
            .iter()
            .map(TaxonomyNode::max_leaf_depth)
            .max()
            .unwrap_or(self.depth)
    }

    fn count(&self) -> usize {
        1 + self.children.iter().map(TaxonomyNode::count).sum::<usize>()
    }

    fn collect_leaves(&self, prefix: &mut Vec<String>, out: &mut Vec<Vec<String>>) {
        for child in &self.children {
            prefix.push(child.name.clone());
            if child.is_leaf() {
                out.push(prefix.clone());
            } else {
                child.collect_leaves(prefix, out);
            }
            prefix.pop();
        }
    }

    fn check_subtree(&self, path: &mut Vec<String>) -> Result<()> {
        let mut seen = HashSet::with_capacity(self.children.len());
        for child in &self.children {
            path.push(child.name.clone());
            if child.name.is_empty() {
                return Err(Error::InvalidInput(format!(
                    "empty category name under '{}'",
                    path[..path.len() - 1].join("/")
                )));
            }
            if !seen.insert(child.name.as_str()) {
                return Err(Error::InvalidInput(format!(
                    "duplicate sibling name '{}'",
                    path.join("/")
                )));
            }
            if child.depth != self.depth + 1 {
                return Err(Error::InvalidInput(format!(
                    "depth of '{}' is {}, expected {}",
                    path.join("/"),
                    child.depth,
                    self.depth + 1
                )));
            }
            child.check_subtree(path)?;
            path.pop();
        }
        Ok(())
    }

    fn fmt_tree(&self, f: &mut fmt::Formatter<'_>, indent: usize) -> fmt::Result {
        writeln!(
            f,
            "{:indent$}- {} (Depth: {}): {}",
            "",
            self.name,
            self.depth,
            self.description,
            indent = indent
        )?;
        for child in &self.children {
            child.fmt_tree(f, indent + 4)?;
        }
        Ok(())
    }
}

/// An ordered tree of categories rooted at a synthetic `root` node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Taxonomy {
    root: TaxonomyNode,
}

impl Default for Taxonomy {
    fn default() -> Self {
        Self::new()
    }
}

impl Taxonomy {
    /// Create an empty taxonomy containing only the root.
    pub fn new() -> Self {
        Self {
            root: TaxonomyNode::new(TAXONOMY_ROOT_NAME, TAXONOMY_ROOT_DESCRIPTION, 0),
        }
    }

    pub fn root(&self) -> &TaxonomyNode {
        &self.root
    }

    /// Maximum depth over all leaf nodes.
    pub fn depth(&self) -> u32 {
        self.root.max_leaf_depth()
    }

    /// Number of nodes, root included.
    pub fn len(&self) -> usize {
        self.root.count()
    }

    /// True when the root has no children.
    pub fn is_empty(&self) -> bool {
        self.root.is_leaf()
    }

    /// Ensure every name along `path` exists, creating missing nodes.
    ///
    /// The description is applied to the final node unless it is empty, in
    /// which case any existing description is kept.
    pub fn add_node<S: AsRef<str>>(&mut self, path: &[S], description: &str) {
        let mut current = &mut self.root;
        for name in path {
            let name = name.as_ref();
            let idx = match current.children.iter().position(|c| c.name == name) {
                Some(idx) => idx,
                None => {
                    let depth = current.depth + 1;
                    current.children.push(TaxonomyNode::new(name, "", depth));
                    current.children.len() - 1
                }
            };
            current = &mut current.children[idx];
        }
        if !description.is_empty() {
            current.description = description.to_string();
        }
    }

    /// Retrieve a node by its full path of names below the root.
    pub fn get_node<S: AsRef<str>>(&self, path: &[S]) -> Option<&TaxonomyNode> {
        path.iter()
            .try_fold(&self.root, |node, name| node.get_child(name.as_ref()))
    }

    /// Like [`Taxonomy::get_node`], failing with [`Error::NotFound`] on the
    /// first missing name.
    pub fn require_node<S: AsRef<str>>(&self, path: &[S]) -> Result<&TaxonomyNode> {
        let mut node = &self.root;
        for (i, name) in path.iter().enumerate() {
            node = node.get_child(name.as_ref()).ok_or_else(|| {
                let walked: Vec<&str> = path[..=i].iter().map(AsRef::as_ref).collect();
                Error::NotFound(walked.join("/"))
            })?;
        }
        Ok(node)
    }

    /// Direct children of the node at `path`; an empty path means the root.
    ///
    /// Returns an empty slice when the path does not resolve.
    pub fn get_children<S: AsRef<str>>(&self, path: &[S]) -> &[TaxonomyNode] {
        self.get_node(path)
            .map(TaxonomyNode::children)
            .unwrap_or(&[])
    }

    /// Global pre-order search for a node by name.
    pub fn find(&self, name: &str) -> Option<&TaxonomyNode> {
        self.root.find(name)
    }

    /// Path of names from the root (inclusive) to the first node named `name`.
    pub fn find_path(&self, name: &str) -> Option<Vec<String>> {
        self.root.find_path(name)
    }

    /// Paths (below the root) of every leaf, in pre-order.
    pub fn leaves(&self) -> Vec<Vec<String>> {
        let mut out = Vec::new();
        self.root.collect_leaves(&mut Vec::new(), &mut out);
        out
    }

    /// Convert the entire taxonomy to its nested serialized form.
    pub fn to_dict(&self) -> JsonValue {
        self.root.to_dict()
    }

    /// Replace this taxonomy with the tree described by `data`.
    ///
    /// On error the current tree is left untouched.
    pub fn load_from_dict(&mut self, data: &JsonValue) -> Result<()> {
        self.root = TaxonomyNode::from_dict(data)?;
        Ok(())
    }

    /// Build a taxonomy from its nested serialized form.
    pub fn from_dict(data: &JsonValue) -> Result<Self> {
        Ok(Self {
            root: TaxonomyNode::from_dict(data)?,
        })
    }

    /// Check the depth invariant, non-empty names, and sibling-name
    /// uniqueness across the whole tree. Reports the first offending path.
    pub fn validate(&self) -> Result<()> {
        if self.root.depth != 0 {
            return Err(Error::InvalidInput(format!(
                "root depth is {}, expected 0",
                self.root.depth
            )));
        }
        self.root.check_subtree(&mut Vec::new())
    }

    /// Load a taxonomy from a JSON file.
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)?;
        let data: JsonValue = serde_json::from_str(&raw)?;
        let taxonomy = Self::from_dict(&data)?;
        debug!(
            path = %path.display(),
            nodes = taxonomy.len(),
            depth = taxonomy.depth(),
            "Loaded taxonomy"
        );
        Ok(taxonomy)
    }

    /// Write the taxonomy to a JSON file (pretty-printed).
    pub fn save_to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let raw = serde_json::to_string_pretty(&self.to_dict())?;
        std::fs::write(path, raw)?;
        Ok(())
    }
}

impl fmt::Display for TaxonomyNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_tree(f, 0)
    }
}

impl fmt::Display for Taxonomy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.root.fmt_tree(f, 0)
    }
}

impl Serialize for Taxonomy {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.root.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Taxonomy {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let data = JsonValue::deserialize(deserializer)?;
        Taxonomy::from_dict(&data).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Taxonomy {
        let mut t = Taxonomy::new();
        t.add_node(&["Science"], "All scientific papers");
        t.add_node(&["Science", "AI"], "Artificial Intelligence");
        t.add_node(&["Science", "AI", "NLP"], "Natural Language Processing");
        t.add_node(&["Science", "Biology"], "The study of living organisms");
        t.add_node(&["Humanities", "History"], "The study of past events");
        t
    }

    fn assert_depths(node: &TaxonomyNode) {
        for child in node.children() {
            assert_eq!(child.depth, node.depth + 1, "bad depth at {}", child.name);
            assert_depths(child);
        }
    }

    #[test]
    fn test_new_taxonomy_has_root_only() {
        let t = Taxonomy::new();
        assert_eq!(t.root().name, "root");
        assert_eq!(t.root().depth, 0);
        assert!(t.is_empty());
        assert_eq!(t.len(), 1);
        assert_eq!(t.depth(), 0);
    }

    #[test]
    fn test_add_node_depth_invariant() {
        let t = sample();
        assert_eq!(t.root().depth, 0);
        assert_depths(t.root());
        assert!(t.validate().is_ok());
    }

    #[test]
    fn test_add_node_creates_intermediate_nodes() {
        let t = sample();
        let humanities = t.get_node(&["Humanities"]).unwrap();
        assert_eq!(humanities.description, "");
        assert_eq!(humanities.depth, 1);
        let history = t.get_node(&["Humanities", "History"]).unwrap();
        assert_eq!(history.depth, 2);
    }

    #[test]
    fn test_add_node_keeps_description_when_new_is_empty() {
        let mut t = sample();
        t.add_node(&["Science", "AI"], "");
        assert_eq!(
            t.get_node(&["Science", "AI"]).unwrap().description,
            "Artificial Intelligence"
        );

        t.add_node(&["Science", "AI"], "Machine intelligence");
        assert_eq!(
            t.get_node(&["Science", "AI"]).unwrap().description,
            "Machine intelligence"
        );
    }

    #[test]
    fn test_add_node_existing_path_is_noop_extension() {
        let mut t = sample();
        let before = t.len();
        t.add_node(&["Science", "AI", "NLP"], "");
        assert_eq!(t.len(), before);
    }

    #[test]
    fn test_get_node_path_consistency() {
        let paths: Vec<Vec<&str>> = vec![
            vec!["Science"],
            vec!["Science", "AI"],
            vec!["Science", "AI", "NLP"],
            vec!["Science", "Biology"],
            vec!["Humanities", "History"],
        ];
        let t = sample();
        for path in paths {
            let node = t.get_node(&path).unwrap();
            assert_eq!(&node.name, path.last().unwrap());
        }
    }

    #[test]
    fn test_get_node_missing() {
        let t = sample();
        assert!(t.get_node(&["Science", "Physics"]).is_none());
        assert!(t.get_node(&["Nope", "AI"]).is_none());
    }

    #[test]
    fn test_get_node_empty_path_is_root() {
        let t = sample();
        let empty: [&str; 0] = [];
        assert_eq!(t.get_node(&empty).unwrap().name, "root");
    }

    #[test]
    fn test_get_children_preserves_insertion_order() {
        let t = sample();
        let empty: [&str; 0] = [];
        let names: Vec<&str> = t.get_children(&empty).iter().map(|n| n.name.as_str()).collect();
        assert_eq!(names, vec!["Science", "Humanities"]);

        let names: Vec<&str> = t
            .get_children(&["Science"])
            .iter()
            .map(|n| n.name.as_str())
            .collect();
        assert_eq!(names, vec!["AI", "Biology"]);
    }

    #[test]
    fn test_get_children_unknown_path_is_empty() {
        let t = sample();
        assert!(t.get_children(&["Missing"]).is_empty());
    }

    #[test]
    fn test_find_and_find_path() {
        let t = sample();
        assert_eq!(t.find("NLP").unwrap().depth, 3);
        assert_eq!(
            t.find_path("NLP").unwrap(),
            vec!["root", "Science", "AI", "NLP"]
        );
        assert!(t.find("Chemistry").is_none());
        assert!(t.find_path("Chemistry").is_none());
    }

    #[test]
    fn test_find_first_match_in_preorder() {
        let mut t = Taxonomy::new();
        t.add_node(&["A", "Shared"], "under A");
        t.add_node(&["B", "Shared"], "under B");
        assert_eq!(t.find("Shared").unwrap().description, "under A");
        assert_eq!(t.find_path("Shared").unwrap(), vec!["root", "A", "Shared"]);
    }

    #[test]
    fn test_depth_is_max_over_leaves() {
        let t = sample();
        assert_eq!(t.depth(), 3);
    }

    #[test]
    fn test_depth_uses_stored_leaf_depth() {
        let data = serde_json::json!({
            "name": "root", "description": "", "depth": 0,
            "children": [{"name": "X", "description": "", "depth": 7, "children": []}]
        });
        let t = Taxonomy::from_dict(&data).unwrap();
        assert_eq!(t.depth(), 7);
    }

    #[test]
    fn test_round_trip_is_lossless() {
        let t = sample();
        let mut loaded = Taxonomy::new();
        loaded.load_from_dict(&t.to_dict()).unwrap();
        assert_eq!(loaded, t);
        assert_eq!(loaded.to_dict(), t.to_dict());
    }

    #[test]
    fn test_to_dict_shape() {
        let mut t = Taxonomy::new();
        t.add_node(&["Science"], "All");
        let dict = t.to_dict();
        assert_eq!(dict["name"], "root");
        assert_eq!(dict["description"], "Root of taxonomy");
        assert_eq!(dict["depth"], 0);
        assert_eq!(dict["children"][0]["name"], "Science");
        assert_eq!(dict["children"][0]["depth"], 1);
        assert_eq!(dict["children"][0]["children"], serde_json::json!([]));
    }

    #[test]
    fn test_load_preserves_depth_without_recomputing() {
        let data = serde_json::json!({
            "name": "root", "depth": 0,
            "children": [{"name": "Odd", "depth": 5}]
        });
        let t = Taxonomy::from_dict(&data).unwrap();
        assert_eq!(t.get_node(&["Odd"]).unwrap().depth, 5);
        assert_eq!(t.get_node(&["Odd"]).unwrap().description, "");
        assert!(t.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_duplicate_siblings() {
        let data = serde_json::json!({
            "name": "root", "depth": 0,
            "children": [
                {"name": "Science", "depth": 1, "children": [
                    {"name": "AI", "depth": 2, "description": "first"},
                    {"name": "AI", "depth": 2, "description": "second"}
                ]}
            ]
        });
        let t = Taxonomy::from_dict(&data).unwrap();
        // Loading keeps both entries.
        let children = t.get_children(&["Science"]);
        assert_eq!(children.len(), 2);
        assert_eq!(children[1].description, "second");

        let err = t.validate().unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
        assert!(err.to_string().contains("Science/AI"));
    }

    #[test]
    fn test_require_node_reports_missing_prefix() {
        let t = sample();
        assert_eq!(t.require_node(&["Science", "AI"]).unwrap().name, "AI");
        let err = t.require_node(&["Science", "Physics", "Optics"]).unwrap_err();
        assert!(matches!(err, Error::NotFound(ref p) if p == "Science/Physics"));

        let subtree = t.require_node(&["Science", "AI"]).unwrap().to_string();
        assert!(subtree.starts_with("- AI (Depth: 2): Artificial Intelligence\n"));
        assert!(subtree.contains("    - NLP (Depth: 3)"));
    }

    #[test]
    fn test_load_rejects_malformed_node() {
        let mut t = sample();
        let before = t.clone();
        let err = t
            .load_from_dict(&serde_json::json!({"description": "no name"}))
            .unwrap_err();
        assert!(matches!(err, Error::Serialization(_)));
        assert_eq!(t, before);

        assert!(Taxonomy::from_dict(&serde_json::json!([1, 2])).is_err());
        assert!(Taxonomy::from_dict(&serde_json::json!({"name": "r", "children": {}})).is_err());
    }

    #[test]
    fn test_serde_round_trip() {
        let t = sample();
        let raw = serde_json::to_string(&t).unwrap();
        let back: Taxonomy = serde_json::from_str(&raw).unwrap();
        assert_eq!(back, t);
    }

    #[test]
    fn test_leaves() {
        let t = sample();
        assert_eq!(
            t.leaves(),
            vec![
                vec!["Science", "AI", "NLP"],
                vec!["Science", "Biology"],
                vec!["Humanities", "History"],
            ]
        );
    }

    #[test]
    fn test_display_renders_tree() {
        let t = sample();
        let rendered = t.to_string();
        let lines: Vec<&str> = rendered.lines().collect();
        assert_eq!(lines[0], "- root (Depth: 0): Root of taxonomy");
        assert_eq!(lines[1], "    - Science (Depth: 1): All scientific papers");
        assert_eq!(lines[2], "        - AI (Depth: 2): Artificial Intelligence");
    }

    #[test]
    fn test_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("taxonomy.json");
        let t = sample();
        t.save_to_file(&path).unwrap();
        let loaded = Taxonomy::load_from_file(&path).unwrap();
        assert_eq!(loaded, t);
    }
}

//! Concept graph records and snapshot format.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Prefix of every concept node id.
pub const CONCEPT_PREFIX: &str = "concept::";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    #[serde(alias = "paper")]
    Document,
    Concept,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Relation {
    /// document → concept
    Mentions,
    /// document ↔ document through shared concepts
    Related,
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Relation::Mentions => write!(f, "mentions"),
            Relation::Related => write!(f, "related"),
        }
    }
}

/// A node in the concept graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphNode {
    pub id: String,
    #[serde(default)]
    pub label: String,
    #[serde(rename = "type")]
    pub kind: NodeKind,
}

impl GraphNode {
    pub fn document(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: title.into(),
            kind: NodeKind::Document,
        }
    }

    /// Concept node for a normalized (lowercased) phrase.
    pub fn concept(normalized: &str, label: impl Into<String>) -> Self {
        Self {
            id: concept_id(normalized),
            label: label.into(),
            kind: NodeKind::Concept,
        }
    }

    pub fn is_concept(&self) -> bool {
        self.kind == NodeKind::Concept
    }
}

pub fn concept_id(normalized: &str) -> String {
    format!("{}{}", CONCEPT_PREFIX, normalized)
}

fn default_weight() -> f64 {
    1.0
}

/// An undirected edge as it appears in a snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphEdge {
    pub source: String,
    pub target: String,
    pub relation: Relation,
    #[serde(default = "default_weight")]
    pub weight: f64,
}

/// Edge payload stored in the petgraph graph.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EdgeData {
    pub relation: Relation,
    pub weight: f64,
}

/// Whole-graph (or induced subgraph) snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphSnapshot {
    #[serde(default)]
    pub nodes: Vec<GraphNode>,
    #[serde(default)]
    pub edges: Vec<GraphEdge>,
}

impl GraphSnapshot {
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.edges.is_empty()
    }
}

/// A node adjacent to another, with the connecting edge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Neighbor {
    pub node: GraphNode,
    pub relation: Relation,
    pub weight: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphStats {
    pub node_count: usize,
    pub edge_count: usize,
    pub document_count: usize,
    pub concept_count: usize,
}

/// Outcome of a graph build.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GraphBuildReport {
    pub stats: GraphStats,
    /// Normalized keyphrases extracted per document, in rank order.
    pub keyphrases: BTreeMap<String, Vec<String>>,
}

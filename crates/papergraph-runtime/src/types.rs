//! Query and explanation results.

use papergraph_store::{GraphNode, GraphSnapshot, NodeKind};
use serde::{Deserialize, Serialize};

/// How the answer text was produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum SynthesisOutcome {
    /// The generator produced the text.
    Enhanced,
    /// The generator was called and failed; the heuristic text was used.
    Degraded { reason: String },
    /// No generator is configured; the heuristic text was used.
    Disabled,
}

/// One retrieved chunk in an answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceRecord {
    #[serde(alias = "paper_id")]
    pub document_id: String,
    pub title: String,
    pub chunk_id: String,
    pub score: f32,
    /// Leading characters of the chunk text.
    pub excerpt: String,
}

/// Result of `QueryOrchestrator::answer`. Same shape whether or not a
/// generator was used.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryAnswer {
    pub answer: String,
    pub sources: Vec<SourceRecord>,
    pub path: Vec<String>,
    pub subgraph: GraphSnapshot,
    /// `None` when synthesis was not attempted (nothing retrieved).
    pub synthesis: Option<SynthesisOutcome>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NeighborSummary {
    pub id: String,
    pub label: String,
    #[serde(rename = "type")]
    pub kind: NodeKind,
    pub weight: f64,
}

/// Result of `QueryOrchestrator::explain`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Explanation {
    pub explanation: String,
    /// `None` when the node is not in the graph.
    pub node: Option<GraphNode>,
    /// Neighbors by descending weight.
    pub neighbors: Vec<NeighborSummary>,
    pub synthesis: Option<SynthesisOutcome>,
}

impl Explanation {
    pub fn not_found() -> Self {
        Self {
            explanation: "Node not found in graph.".into(),
            node: None,
            neighbors: Vec::new(),
            synthesis: None,
        }
    }
}

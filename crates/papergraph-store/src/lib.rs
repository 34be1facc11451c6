//! PaperGraph Store: similarity index over chunks + concept graph over documents.

pub mod graph;
pub mod index;

pub use graph::{
    ConceptGraph, GraphBuildReport, GraphEdge, GraphNode, GraphSnapshot, GraphStats,
    KeyphraseConfig, Neighbor, NodeKind, Relation,
};
pub use index::{BackendKind, IndexBackend, IndexManifest, ScoredChunk, SimilarityIndex, SparseParams};

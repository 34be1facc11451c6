//! Concept graph over documents and the keyphrases they mention.
//!
//! Undirected petgraph graph with at most one edge per node pair. Both edge
//! rules (`mentions`, `related`) go through `add_or_merge_edge`, which
//! accumulates weight and keeps the first relation recorded for a pair.
//! The whole graph is rebuilt by `build` and persisted to `graph.json`.

pub mod keyphrase;
pub mod types;

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use papergraph_core::{snapshot, Chunk, Document, Error, PaperGraphConfig, Result};
use parking_lot::RwLock;
use petgraph::graph::{NodeIndex, UnGraph};
use petgraph::visit::EdgeRef;
use tracing::{debug, info, warn};

pub use keyphrase::{extract_keyphrases, Keyphrase};
pub use types::*;

pub const GRAPH_FILE: &str = "graph.json";

/// Keyphrase extraction limits used by `ConceptGraph::build`.
#[derive(Debug, Clone, Copy)]
pub struct KeyphraseConfig {
    /// Keyphrases kept per document.
    pub max_keyphrases: usize,
    /// Leading chunks of each document fed to the extractor.
    pub sample_chunks: usize,
}

impl Default for KeyphraseConfig {
    fn default() -> Self {
        Self {
            max_keyphrases: 15,
            sample_chunks: 10,
        }
    }
}

impl From<&PaperGraphConfig> for KeyphraseConfig {
    fn from(config: &PaperGraphConfig) -> Self {
        Self {
            max_keyphrases: config.keyphrase_max,
            sample_chunks: config.keyphrase_sample_chunks,
        }
    }
}

#[derive(Default)]
struct GraphInner {
    graph: UnGraph<GraphNode, EdgeData>,
    node_index: HashMap<String, NodeIndex>,
}

impl GraphInner {
    /// Insert `node` unless its id already exists. Returns its index.
    fn add_node(&mut self, node: GraphNode) -> NodeIndex {
        if let Some(&idx) = self.node_index.get(&node.id) {
            return idx;
        }
        let id = node.id.clone();
        let idx = self.graph.add_node(node);
        self.node_index.insert(id, idx);
        idx
    }

    fn add_or_merge_edge(&mut self, a: &str, b: &str, relation: Relation, delta: f64) -> Result<()> {
        if !delta.is_finite() || delta < 0.0 {
            return Err(Error::Graph(format!(
                "cannot link {} and {}: invalid weight {}",
                a, b, delta
            )));
        }
        let (ia, ib) = match (self.node_index.get(a), self.node_index.get(b)) {
            (Some(&ia), Some(&ib)) => (ia, ib),
            _ => {
                return Err(Error::Graph(format!(
                    "cannot link {} and {}: unknown node",
                    a, b
                )))
            }
        };
        match self.graph.find_edge(ia, ib) {
            Some(e) => {
                if let Some(data) = self.graph.edge_weight_mut(e) {
                    data.weight += delta;
                }
            }
            None => {
                self.graph.add_edge(
                    ia,
                    ib,
                    EdgeData {
                        relation,
                        weight: delta,
                    },
                );
            }
        }
        Ok(())
    }

    fn edge_between(&self, a: &str, b: &str) -> Option<EdgeData> {
        let ia = *self.node_index.get(a)?;
        let ib = *self.node_index.get(b)?;
        let e = self.graph.find_edge(ia, ib)?;
        self.graph.edge_weight(e).copied()
    }

    fn edge_record(&self, source: NodeIndex, target: NodeIndex, data: &EdgeData) -> GraphEdge {
        GraphEdge {
            source: self.graph[source].id.clone(),
            target: self.graph[target].id.clone(),
            relation: data.relation,
            weight: data.weight,
        }
    }

    fn snapshot(&self) -> GraphSnapshot {
        GraphSnapshot {
            nodes: self.graph.node_weights().cloned().collect(),
            edges: self
                .graph
                .edge_references()
                .map(|e| self.edge_record(e.source(), e.target(), e.weight()))
                .collect(),
        }
    }

    fn from_snapshot(snap: GraphSnapshot) -> Self {
        let mut inner = Self::default();
        for node in snap.nodes {
            inner.add_node(node);
        }
        for edge in snap.edges {
            if let Err(e) =
                inner.add_or_merge_edge(&edge.source, &edge.target, edge.relation, edge.weight)
            {
                warn!("Skipping snapshot edge: {}", e);
            }
        }
        inner
    }

    fn stats(&self) -> GraphStats {
        let concept_count = self.graph.node_weights().filter(|n| n.is_concept()).count();
        GraphStats {
            node_count: self.graph.node_count(),
            edge_count: self.graph.edge_count(),
            document_count: self.graph.node_count() - concept_count,
            concept_count,
        }
    }
}

/// Shared, persistable concept graph.
pub struct ConceptGraph {
    path: PathBuf,
    inner: RwLock<GraphInner>,
}

impl ConceptGraph {
    /// Empty graph persisted under `dir/graph.json`. Call `load` to restore.
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            path: dir.as_ref().join(GRAPH_FILE),
            inner: RwLock::new(GraphInner::default()),
        }
    }

    pub fn from_config(config: &PaperGraphConfig) -> Self {
        Self::new(&config.data_paths.graph)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Replace the graph with one built from `documents` and their `chunks`,
    /// then persist it.
    pub fn build(
        &self,
        documents: &[Document],
        chunks: &[Chunk],
        config: KeyphraseConfig,
    ) -> Result<GraphBuildReport> {
        let mut inner = GraphInner::default();
        let mut report = GraphBuildReport::default();

        for doc in documents {
            inner.add_node(GraphNode::document(&doc.document_id, &doc.title));
        }

        let mut by_doc: HashMap<&str, Vec<&Chunk>> = HashMap::new();
        for chunk in chunks {
            by_doc.entry(chunk.document_id.as_str()).or_default().push(chunk);
        }

        let mut phrase_sets: Vec<HashSet<String>> = Vec::with_capacity(documents.len());
        for doc in documents {
            let sample: Vec<&str> = by_doc
                .get(doc.document_id.as_str())
                .map(|cs| {
                    cs.iter()
                        .take(config.sample_chunks)
                        .map(|c| c.text.as_str())
                        .collect()
                })
                .unwrap_or_default();
            let keyphrases = extract_keyphrases(&sample.join(" "), config.max_keyphrases);
            debug!("{}: {} keyphrases", doc.document_id, keyphrases.len());

            let mut phrases = HashSet::new();
            for kp in &keyphrases {
                let concept = GraphNode::concept(&kp.normalized, &kp.phrase);
                let concept_id = concept.id.clone();
                inner.add_node(concept);
                inner.add_or_merge_edge(&doc.document_id, &concept_id, Relation::Mentions, 1.0)?;
                phrases.insert(kp.normalized.clone());
            }
            report.keyphrases.insert(
                doc.document_id.clone(),
                keyphrases.into_iter().map(|k| k.normalized).collect(),
            );
            phrase_sets.push(phrases);
        }

        for i in 0..documents.len() {
            for j in (i + 1)..documents.len() {
                let shared = phrase_sets[i].intersection(&phrase_sets[j]).count();
                if shared > 0 {
                    inner.add_or_merge_edge(
                        &documents[i].document_id,
                        &documents[j].document_id,
                        Relation::Related,
                        shared as f64,
                    )?;
                }
            }
        }

        report.stats = inner.stats();
        *self.inner.write() = inner;
        self.persist()?;

        info!(
            "Concept graph built: {} documents, {} concepts, {} edges",
            report.stats.document_count, report.stats.concept_count, report.stats.edge_count
        );
        Ok(report)
    }

    /// Insert a node unless one with the same id exists.
    pub fn add_node(&self, node: GraphNode) {
        self.inner.write().add_node(node);
    }

    /// Add an edge between two existing nodes, or add `delta` to the weight
    /// of the existing edge. The relation of an existing edge is unchanged.
    /// `delta` must be finite and non-negative.
    pub fn add_or_merge_edge(&self, a: &str, b: &str, relation: Relation, delta: f64) -> Result<()> {
        self.inner.write().add_or_merge_edge(a, b, relation, delta)
    }

    /// Write the current graph to `graph.json`.
    pub fn persist(&self) -> Result<()> {
        let snap = self.inner.read().snapshot();
        let json = serde_json::to_vec_pretty(&snap)?;
        snapshot::write_atomic(&self.path, &json)
    }

    /// Restore from `graph.json`. Missing or malformed files yield an empty graph.
    pub fn load(&self) -> GraphStats {
        let snap: GraphSnapshot = snapshot::read_json(&self.path).unwrap_or_default();
        let inner = GraphInner::from_snapshot(snap);
        let stats = inner.stats();
        *self.inner.write() = inner;
        info!(
            "Concept graph loaded: {} nodes, {} edges",
            stats.node_count, stats.edge_count
        );
        stats
    }

    /// Induced subgraph over exactly `ids` (unknown ids are skipped).
    /// Nodes keep the order of `ids`.
    pub fn subgraph_for_path(&self, ids: &[String]) -> GraphSnapshot {
        let inner = self.inner.read();
        let mut seen = HashSet::new();
        let members: Vec<NodeIndex> = ids
            .iter()
            .filter_map(|id| inner.node_index.get(id).copied())
            .filter(|idx| seen.insert(*idx))
            .collect();

        let nodes = members.iter().map(|&i| inner.graph[i].clone()).collect();
        let edges = inner
            .graph
            .edge_references()
            .filter(|e| seen.contains(&e.source()) && seen.contains(&e.target()))
            .map(|e| inner.edge_record(e.source(), e.target(), e.weight()))
            .collect();
        GraphSnapshot { nodes, edges }
    }

    /// Full node/edge snapshot.
    pub fn snapshot(&self) -> GraphSnapshot {
        self.inner.read().snapshot()
    }

    /// Neighbors of `id` in edge-insertion order. Empty for unknown ids.
    pub fn neighbors(&self, id: &str) -> Vec<Neighbor> {
        let inner = self.inner.read();
        let Some(&idx) = inner.node_index.get(id) else {
            return Vec::new();
        };

        // petgraph walks adjacency newest-first; edge indices give insertion order.
        let mut edges: Vec<_> = inner.graph.edges(idx).collect();
        edges.sort_by_key(|e| e.id());
        edges
            .into_iter()
            .map(|e| {
                let other = if e.source() == idx { e.target() } else { e.source() };
                Neighbor {
                    node: inner.graph[other].clone(),
                    relation: e.weight().relation,
                    weight: e.weight().weight,
                }
            })
            .collect()
    }

    pub fn node(&self, id: &str) -> Option<GraphNode> {
        let inner = self.inner.read();
        inner.node_index.get(id).map(|&i| inner.graph[i].clone())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.inner.read().node_index.contains_key(id)
    }

    pub fn has_edge(&self, a: &str, b: &str) -> bool {
        self.inner.read().edge_between(a, b).is_some()
    }

    pub fn edge_weight(&self, a: &str, b: &str) -> Option<f64> {
        self.inner.read().edge_between(a, b).map(|e| e.weight)
    }

    pub fn relation(&self, a: &str, b: &str) -> Option<Relation> {
        self.inner.read().edge_between(a, b).map(|e| e.relation)
    }

    pub fn stats(&self) -> GraphStats {
        self.inner.read().stats()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().graph.node_count() == 0
    }

    /// Remove the persisted snapshot and empty the in-memory graph.
    pub fn clear(&self) -> Result<()> {
        if self.path.exists() {
            std::fs::remove_file(&self.path)?;
        }
        *self.inner.write() = GraphInner::default();
        info!("Concept graph cleared");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(id: &str, title: &str) -> Document {
        Document {
            document_id: id.into(),
            title: title.into(),
            source_path: format!("/papers/{}.pdf", id),
        }
    }

    fn chunk(doc: &str, i: usize, text: &str) -> Chunk {
        Chunk {
            chunk_id: Chunk::make_id(doc, i),
            document_id: doc.into(),
            title: doc.into(),
            text: text.into(),
        }
    }

    fn transformer_corpus() -> (Vec<Document>, Vec<Chunk>) {
        (
            vec![doc("A", "Attention Is All You Need"), doc("B", "Vision Transformers")],
            vec![
                chunk("A", 0, "The transformer replaces recurrence with attention. The transformer is fast."),
                chunk("B", 0, "We apply the transformer to image patches. A transformer scales well."),
            ],
        )
    }

    fn ids(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_transformer_scenario() {
        let dir = tempfile::tempdir().unwrap();
        let graph = ConceptGraph::new(dir.path());
        let (docs, chunks) = transformer_corpus();
        let report = graph.build(&docs, &chunks, KeyphraseConfig::default()).unwrap();

        assert!(report.keyphrases["A"].contains(&"transformer".to_string()));
        assert_eq!(graph.relation("A", "B"), Some(Relation::Related));
        assert!(graph.edge_weight("A", "B").unwrap() >= 1.0);
        assert!(graph.edge_weight("A", "concept::transformer").unwrap() >= 1.0);
        assert!(graph.edge_weight("B", "concept::transformer").unwrap() >= 1.0);
        assert_eq!(graph.relation("A", "concept::transformer"), Some(Relation::Mentions));

        let sub = graph.subgraph_for_path(&ids(&["A", "B"]));
        assert_eq!(sub.nodes.len(), 2);
        assert_eq!(sub.edges.len(), 1);
        assert_eq!(sub.edges[0].relation, Relation::Related);
    }

    #[test]
    fn test_merge_accumulates_and_keeps_first_relation() {
        let dir = tempfile::tempdir().unwrap();
        let graph = ConceptGraph::new(dir.path());
        graph.add_node(GraphNode::document("a", "A"));
        graph.add_node(GraphNode::document("b", "B"));

        graph.add_or_merge_edge("a", "b", Relation::Related, 2.0).unwrap();
        graph.add_or_merge_edge("b", "a", Relation::Mentions, 1.5).unwrap();

        assert_eq!(graph.edge_weight("a", "b"), Some(3.5));
        assert_eq!(graph.relation("a", "b"), Some(Relation::Related));
        assert_eq!(graph.stats().edge_count, 1);
    }

    #[test]
    fn test_merge_requires_known_nodes() {
        let dir = tempfile::tempdir().unwrap();
        let graph = ConceptGraph::new(dir.path());
        graph.add_node(GraphNode::document("a", "A"));
        assert!(graph.add_or_merge_edge("a", "ghost", Relation::Related, 1.0).is_err());
    }

    #[test]
    fn test_merge_rejects_negative_and_non_finite_weight() {
        let dir = tempfile::tempdir().unwrap();
        let graph = ConceptGraph::new(dir.path());
        graph.add_node(GraphNode::document("a", "A"));
        graph.add_node(GraphNode::document("b", "B"));
        graph.add_or_merge_edge("a", "b", Relation::Related, 2.0).unwrap();

        for delta in [-5.0, f64::NAN, f64::INFINITY] {
            assert!(graph.add_or_merge_edge("a", "b", Relation::Related, delta).is_err());
        }
        assert_eq!(graph.edge_weight("a", "b"), Some(2.0));

        assert!(graph.add_or_merge_edge("a", "b", Relation::Related, 0.0).is_ok());
        assert_eq!(graph.edge_weight("a", "b"), Some(2.0));
    }

    #[test]
    fn test_load_skips_negative_weight_edges() {
        let dir = tempfile::tempdir().unwrap();
        let snap = GraphSnapshot {
            nodes: vec![
                GraphNode::document("a", "A"),
                GraphNode::document("b", "B"),
                GraphNode::concept("attention", "attention"),
            ],
            edges: vec![
                GraphEdge {
                    source: "a".into(),
                    target: "b".into(),
                    relation: Relation::Related,
                    weight: -3.0,
                },
                GraphEdge {
                    source: "a".into(),
                    target: "concept::attention".into(),
                    relation: Relation::Mentions,
                    weight: 1.0,
                },
            ],
        };
        std::fs::write(dir.path().join(GRAPH_FILE), serde_json::to_vec(&snap).unwrap()).unwrap();

        let graph = ConceptGraph::new(dir.path());
        let stats = graph.load();
        assert_eq!(stats.node_count, 3);
        assert_eq!(stats.edge_count, 1);
        assert!(!graph.has_edge("a", "b"));
        assert_eq!(graph.edge_weight("a", "concept::attention"), Some(1.0));
    }

    #[test]
    fn test_empty_document_still_gets_node() {
        let dir = tempfile::tempdir().unwrap();
        let graph = ConceptGraph::new(dir.path());
        let report = graph
            .build(&[doc("empty", "Blank")], &[chunk("empty", 0, "")], KeyphraseConfig::default())
            .unwrap();

        assert_eq!(graph.node("empty").unwrap().kind, NodeKind::Document);
        assert!(report.keyphrases["empty"].is_empty());
        assert_eq!(report.stats.edge_count, 0);
    }

    #[test]
    fn test_neighbors_in_insertion_order() {
        let dir = tempfile::tempdir().unwrap();
        let graph = ConceptGraph::new(dir.path());
        for id in ["hub", "x", "y", "z"] {
            graph.add_node(GraphNode::document(id, id));
        }
        graph.add_or_merge_edge("hub", "y", Relation::Related, 1.0).unwrap();
        graph.add_or_merge_edge("x", "hub", Relation::Related, 1.0).unwrap();
        graph.add_or_merge_edge("hub", "z", Relation::Related, 1.0).unwrap();

        let order: Vec<String> = graph.neighbors("hub").into_iter().map(|n| n.node.id).collect();
        assert_eq!(order, ids(&["y", "x", "z"]));
        assert!(graph.neighbors("nobody").is_empty());
    }

    #[test]
    fn test_persist_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let (docs, chunks) = transformer_corpus();
        let built = ConceptGraph::new(dir.path());
        built.build(&docs, &chunks, KeyphraseConfig::default()).unwrap();

        let fresh = ConceptGraph::new(dir.path());
        assert!(fresh.is_empty());
        let stats = fresh.load();
        assert_eq!(stats, built.stats());
        assert_eq!(fresh.snapshot(), built.snapshot());
    }

    #[test]
    fn test_load_missing_or_malformed_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let graph = ConceptGraph::new(dir.path());
        assert_eq!(graph.load().node_count, 0);

        std::fs::write(dir.path().join(GRAPH_FILE), b"[1, 2").unwrap();
        assert_eq!(graph.load().node_count, 0);
    }

    #[test]
    fn test_rebuild_replaces_graph() {
        let dir = tempfile::tempdir().unwrap();
        let graph = ConceptGraph::new(dir.path());
        let (docs, chunks) = transformer_corpus();
        graph.build(&docs, &chunks, KeyphraseConfig::default()).unwrap();
        let first = graph.edge_weight("A", "B");

        graph.build(&docs, &chunks, KeyphraseConfig::default()).unwrap();
        assert_eq!(graph.edge_weight("A", "B"), first);
    }

    #[test]
    fn test_clear() {
        let dir = tempfile::tempdir().unwrap();
        let graph = ConceptGraph::new(dir.path());
        let (docs, chunks) = transformer_corpus();
        graph.build(&docs, &chunks, KeyphraseConfig::default()).unwrap();
        assert!(graph.path().exists());

        graph.clear().unwrap();
        assert!(graph.is_empty());
        assert!(!graph.path().exists());
    }
}

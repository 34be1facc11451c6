//! Wires configuration, encoder, index, graph and generator into one handle.

use std::sync::Arc;

use papergraph_chat::{create_generator, LLMConfig, TextGenerator};
use papergraph_core::{load_corpus, Corpus, PaperGraphConfig, Result};
use papergraph_infer::{create_embedder, EmbedderBackend};
use papergraph_store::{
    BackendKind, ConceptGraph, GraphBuildReport, GraphSnapshot, GraphStats, IndexManifest,
    KeyphraseConfig, SimilarityIndex,
};
use serde::Serialize;
use tracing::{info, warn};

use crate::orchestrator::QueryOrchestrator;
use crate::types::{Explanation, QueryAnswer};

/// Summary of a full rebuild.
#[derive(Debug, Clone, Serialize)]
pub struct BuildReport {
    pub chunks_indexed: usize,
    pub backend: BackendKind,
    pub documents: usize,
    pub nodes: usize,
    pub edges: usize,
}

impl BuildReport {
    fn new(manifest: &IndexManifest, graph: &GraphStats) -> Self {
        Self {
            chunks_indexed: manifest.count,
            backend: manifest.backend,
            documents: graph.document_count,
            nodes: graph.node_count,
            edges: graph.edge_count,
        }
    }
}

/// All components over one data directory.
pub struct PaperGraph {
    config: PaperGraphConfig,
    orchestrator: QueryOrchestrator,
}

impl PaperGraph {
    /// Open components for `config`: ONNX encoder when present, LLM
    /// provider from `llm-config.json` and the environment.
    pub fn open(config: PaperGraphConfig) -> Self {
        let embedder = create_embedder(&config.model_dir);
        let llm_config = LLMConfig::load(&config.data_paths.llm_config_file);
        let generator = create_generator(&llm_config, config.synthesis_timeout());
        Self::with_parts(config, embedder, generator)
    }

    /// Open with an explicit encoder and generator.
    pub fn with_parts(
        config: PaperGraphConfig,
        embedder: Arc<dyn EmbedderBackend>,
        generator: Arc<dyn TextGenerator>,
    ) -> Self {
        let index = Arc::new(SimilarityIndex::from_config(&config, embedder));
        let graph = Arc::new(ConceptGraph::from_config(&config));
        let orchestrator = QueryOrchestrator::new(index, graph, generator);
        Self {
            config,
            orchestrator,
        }
    }

    pub fn config(&self) -> &PaperGraphConfig {
        &self.config
    }

    pub fn orchestrator(&self) -> &QueryOrchestrator {
        &self.orchestrator
    }

    fn corpus(&self) -> Corpus {
        let corpus = load_corpus(&self.config.data_paths.chunks);
        if corpus.is_empty() {
            warn!(
                "No corpus found in {}; building empty state",
                self.config.data_paths.chunks.display()
            );
        }
        corpus
    }

    /// Rebuild the similarity index from the corpus on disk.
    pub fn build_index(&self) -> Result<IndexManifest> {
        let corpus = self.corpus();
        self.orchestrator.index().build(&corpus.chunks)
    }

    /// Rebuild the concept graph from the corpus on disk.
    pub fn build_graph(&self) -> Result<GraphBuildReport> {
        let corpus = self.corpus();
        self.orchestrator.graph().build(
            &corpus.documents,
            &corpus.chunks,
            KeyphraseConfig::from(&self.config),
        )
    }

    /// Rebuild both from one read of the corpus.
    pub fn build(&self) -> Result<BuildReport> {
        let corpus = self.corpus();
        let manifest = self.orchestrator.index().build(&corpus.chunks)?;
        let graph = self.orchestrator.graph().build(
            &corpus.documents,
            &corpus.chunks,
            KeyphraseConfig::from(&self.config),
        )?;
        let report = BuildReport::new(&manifest, &graph.stats);
        info!(
            "Build complete: {} chunks, {} nodes, {} edges",
            report.chunks_indexed, report.nodes, report.edges
        );
        Ok(report)
    }

    /// Answer with `k`, or the configured default when `None`.
    pub async fn answer(&self, question: &str, k: Option<usize>) -> QueryAnswer {
        let k = k.unwrap_or(self.config.default_top_k);
        self.orchestrator.answer(question, k).await
    }

    pub async fn explain(&self, node_id: &str) -> Explanation {
        self.orchestrator.explain(node_id).await
    }

    /// The whole graph, loading the persisted snapshot when nothing is in
    /// memory.
    pub fn graph_snapshot(&self) -> GraphSnapshot {
        let graph = self.orchestrator.graph();
        if graph.is_empty() {
            graph.load();
        }
        graph.snapshot()
    }

    /// Remove the persisted index and graph.
    pub fn clear(&self) -> Result<()> {
        self.orchestrator.index().clear()?;
        self.orchestrator.graph().clear()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use papergraph_chat::UnavailableGenerator;
    use papergraph_core::corpus::write_corpus;
    use papergraph_core::{Chunk, Document};
    use papergraph_infer::NoopEmbedder;

    fn corpus() -> Corpus {
        let docs = [
            ("a", "Attention Models", "The transformer architecture relies on attention. Transformer layers stack attention heads."),
            ("b", "Efficient Transformers", "Sparse attention makes the transformer cheaper. Transformer variants trade accuracy for speed."),
        ];
        let mut corpus = Corpus::default();
        for (id, title, text) in docs {
            corpus.documents.push(Document {
                document_id: id.into(),
                title: title.into(),
                source_path: format!("{}.pdf", id),
            });
            corpus.chunks.push(Chunk {
                chunk_id: Chunk::make_id(id, 0),
                document_id: id.into(),
                title: title.into(),
                text: text.into(),
            });
        }
        corpus
    }

    fn open(dir: &std::path::Path) -> PaperGraph {
        let config = PaperGraphConfig::with_defaults(dir).unwrap();
        write_corpus(&config.data_paths.chunks, &corpus()).unwrap();
        PaperGraph::with_parts(
            config,
            Arc::new(NoopEmbedder::new(8)),
            Arc::new(UnavailableGenerator),
        )
    }

    #[test]
    fn test_build_reports_counts() {
        let dir = tempfile::tempdir().unwrap();
        let pg = open(dir.path());
        let report = pg.build().unwrap();
        assert_eq!(report.chunks_indexed, 2);
        assert_eq!(report.backend, BackendKind::Sparse);
        assert_eq!(report.documents, 2);
        assert!(report.nodes > 2);
        assert!(report.edges > 0);
    }

    #[test]
    fn test_separate_builds() {
        let dir = tempfile::tempdir().unwrap();
        let pg = open(dir.path());
        assert_eq!(pg.build_index().unwrap().count, 2);
        let graph = pg.build_graph().unwrap();
        assert!(graph.keyphrases["a"].contains(&"transformer".to_string()));
    }

    #[tokio::test]
    async fn test_answer_uses_default_k() {
        let dir = tempfile::tempdir().unwrap();
        let pg = open(dir.path());
        pg.build().unwrap();
        let answer = pg.answer("transformer attention", None).await;
        assert_eq!(answer.sources.len(), 2);
        let answer = pg.answer("transformer attention", Some(1)).await;
        assert_eq!(answer.sources.len(), 1);
    }

    #[test]
    fn test_snapshot_reloads_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        open(dir.path()).build().unwrap();

        let reopened = open(dir.path());
        let snapshot = reopened.graph_snapshot();
        assert!(snapshot.nodes.iter().any(|n| n.id == "concept::transformer"));
    }

    #[test]
    fn test_clear_removes_state() {
        let dir = tempfile::tempdir().unwrap();
        let pg = open(dir.path());
        pg.build().unwrap();
        pg.clear().unwrap();

        let reopened = open(dir.path());
        assert!(reopened.graph_snapshot().is_empty());
        assert_eq!(reopened.orchestrator().index().load(), 0);
    }

    #[test]
    fn test_empty_corpus_builds_empty_state() {
        let dir = tempfile::tempdir().unwrap();
        let config = PaperGraphConfig::with_defaults(dir.path()).unwrap();
        let pg = PaperGraph::with_parts(
            config,
            Arc::new(NoopEmbedder::new(8)),
            Arc::new(UnavailableGenerator),
        );
        let report = pg.build().unwrap();
        assert_eq!(report.chunks_indexed, 0);
        assert_eq!(report.nodes, 0);
    }
}

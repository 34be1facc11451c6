//! Query orchestrator: retrieval, path stitching and answer synthesis.

use std::collections::HashSet;
use std::sync::Arc;

use papergraph_chat::prompts::{EXPLAIN_SYSTEM_PROMPT, SYNTHESIS_SYSTEM_PROMPT};
use papergraph_chat::TextGenerator;
use papergraph_store::{ConceptGraph, GraphSnapshot, NodeKind, ScoredChunk, SimilarityIndex};
use tracing::{debug, info, warn};

use crate::stitch::stitch_path;
use crate::types::*;

pub const NO_CONTENT_MESSAGE: &str =
    "I couldn't find relevant content. Please upload papers and rebuild the graph.";

/// Characters of chunk text kept in each source record.
const EXCERPT_CHARS: usize = 1200;
/// Characters of concatenated source text sent to the generator.
const PROMPT_SOURCE_CHARS: usize = 7000;
const PROMPT_PATH_NODES: usize = 5;
const PROMPT_TITLES: usize = 5;
const FOOTER_PATH_NODES: usize = 8;
const EXPLAIN_TOP_CONCEPTS: usize = 8;
const EXPLAIN_TOP_RELATED: usize = 5;
const EXPLAIN_EXAMPLES: usize = 8;
const EXPLAIN_PROMPT_NEIGHBORS: usize = 20;

/// Result of one attempt at external synthesis.
enum Synthesis {
    Enhanced(String),
    Degraded(String),
    Disabled,
}

impl Synthesis {
    fn outcome(&self) -> SynthesisOutcome {
        match self {
            Synthesis::Enhanced(_) => SynthesisOutcome::Enhanced,
            Synthesis::Degraded(reason) => SynthesisOutcome::Degraded {
                reason: reason.clone(),
            },
            Synthesis::Disabled => SynthesisOutcome::Disabled,
        }
    }
}

/// Prefix of `text` holding at most `max` characters.
fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((byte, _)) => &text[..byte],
        None => text,
    }
}

/// First `n` ids joined with arrows, with `...` when more remain.
fn path_preview(path: &[String], n: usize) -> String {
    let shown = path.iter().take(n).cloned().collect::<Vec<_>>().join(" -> ");
    if path.len() > n {
        format!("{}...", shown)
    } else {
        shown
    }
}

fn kind_name(kind: NodeKind) -> &'static str {
    match kind {
        NodeKind::Document => "paper",
        NodeKind::Concept => "concept",
    }
}

fn join_labels<'a>(items: impl Iterator<Item = &'a NeighborSummary>) -> String {
    let labels: Vec<&str> = items.map(|n| n.label.as_str()).collect();
    if labels.is_empty() {
        "n/a".into()
    } else {
        labels.join(", ")
    }
}

/// Composes the similarity index, the concept graph and the text generator.
pub struct QueryOrchestrator {
    index: Arc<SimilarityIndex>,
    graph: Arc<ConceptGraph>,
    generator: Arc<dyn TextGenerator>,
}

impl QueryOrchestrator {
    pub fn new(
        index: Arc<SimilarityIndex>,
        graph: Arc<ConceptGraph>,
        generator: Arc<dyn TextGenerator>,
    ) -> Self {
        info!(
            "Query orchestrator ready: backend={}, synthesis={}",
            index.backend_kind(),
            generator.describe()
        );
        Self {
            index,
            graph,
            generator,
        }
    }

    pub fn index(&self) -> &Arc<SimilarityIndex> {
        &self.index
    }

    pub fn graph(&self) -> &Arc<ConceptGraph> {
        &self.graph
    }

    fn ensure_graph_loaded(&self) {
        if self.graph.is_empty() {
            self.graph.load();
        }
    }

    async fn synthesize(&self, system_prompt: &str, prompt: &str) -> Synthesis {
        if !self.generator.is_available() {
            return Synthesis::Disabled;
        }
        match self.generator.generate(system_prompt, prompt).await {
            Ok(text) => Synthesis::Enhanced(text),
            Err(e) => {
                warn!("Synthesis via {} failed: {}", self.generator.describe(), e);
                Synthesis::Degraded(e.to_string())
            }
        }
    }

    /// Answer `question` from the top-`k` retrieved chunks. Never fails:
    /// retrieval errors yield the no-content answer and synthesis failures
    /// fall back to the heuristic summary.
    pub async fn answer(&self, question: &str, k: usize) -> QueryAnswer {
        let hits: Vec<ScoredChunk> = match self.index.query(question, k) {
            Ok(hits) => hits,
            Err(e) => {
                warn!("Retrieval failed, answering without sources: {}", e);
                Vec::new()
            }
        };

        let sources: Vec<SourceRecord> = hits
            .iter()
            .map(|h| SourceRecord {
                document_id: h.chunk.document_id.clone(),
                title: h.chunk.title.clone(),
                chunk_id: h.chunk.chunk_id.clone(),
                score: h.score,
                excerpt: truncate_chars(&h.chunk.text, EXCERPT_CHARS).to_string(),
            })
            .collect();

        if sources.is_empty() {
            return QueryAnswer {
                answer: NO_CONTENT_MESSAGE.into(),
                sources,
                path: Vec::new(),
                subgraph: GraphSnapshot::default(),
                synthesis: None,
            };
        }

        let mut seen = HashSet::new();
        let stops: Vec<String> = sources
            .iter()
            .filter(|s| seen.insert(s.document_id.as_str()))
            .map(|s| s.document_id.clone())
            .collect();

        self.ensure_graph_loaded();
        let path = stitch_path(&self.graph, &stops);
        let subgraph = self.graph.subgraph_for_path(&path);
        debug!("Retrieved {} chunks, {} papers, path {:?}", sources.len(), stops.len(), path);

        let heuristic = format!(
            "Retrieved {} chunks across {} papers. Traversal order: {}. \
             Shared concepts form edges; see subgraph for details.",
            sources.len(),
            stops.len(),
            path.join(" -> ")
        );

        let prompt = self.synthesis_prompt(question, &sources, stops.len(), &path);
        let synthesis = self.synthesize(SYNTHESIS_SYSTEM_PROMPT, &prompt).await;

        let answer = match &synthesis {
            Synthesis::Enhanced(text) => format!(
                "{}\n\n---\n\n*Analysis Metadata:*\n\
                 - Sources: {} chunks from {} paper(s)\n\
                 - Graph Path: {}\n\
                 - Retrieval Score Range: {:.3} - {:.3}",
                text,
                sources.len(),
                stops.len(),
                path_preview(&path, FOOTER_PATH_NODES),
                sources[0].score,
                sources[sources.len() - 1].score
            ),
            Synthesis::Degraded(reason) => format!(
                "## LLM Synthesis Unavailable\n\n{}\n\n*Synthesis request failed: {}*",
                heuristic, reason
            ),
            Synthesis::Disabled => format!(
                "## LLM Not Configured\n\n{}\n\n*Set GROQ_API_KEY, ANTHROPIC_API_KEY or \
                 OPENAI_API_KEY to enable AI-powered synthesis.*",
                heuristic
            ),
        };

        QueryAnswer {
            answer,
            sources,
            path,
            subgraph,
            synthesis: Some(synthesis.outcome()),
        }
    }

    fn synthesis_prompt(
        &self,
        question: &str,
        sources: &[SourceRecord],
        paper_count: usize,
        path: &[String],
    ) -> String {
        let paper_titles = sources
            .iter()
            .take(PROMPT_TITLES)
            .map(|s| format!("- **{}** (ID: {})", s.title, s.document_id))
            .collect::<Vec<_>>()
            .join("\n");
        let joined_sources = sources
            .iter()
            .enumerate()
            .map(|(i, s)| format!("### Source [{}] - {}\n{}", i + 1, s.title, s.excerpt))
            .collect::<Vec<_>>()
            .join("\n\n");

        format!(
            "**Research Question:** {question}\n\n\
             **Analysis Context:**\n\
             - Papers Analyzed: {papers}\n\
             - Sources Retrieved: {count}\n\
             - Knowledge Graph Traversal: {path}\n\n\
             **Papers in Analysis:**\n{titles}\n\n\
             **Task:** Provide a comprehensive, well-structured comparative synthesis following \
             the format guidelines. Use markdown formatting extensively with headers, bold text \
             for key concepts, bullet points, and clear sections.\n\n\
             **Retrieved Content:**\n{content}\n\n\
             **Remember:** Use professional academic writing style with proper markdown \
             formatting, clear structure, and highlighted key terms.",
            question = question,
            papers = paper_count,
            count = sources.len(),
            path = path_preview(path, PROMPT_PATH_NODES),
            titles = paper_titles,
            content = truncate_chars(&joined_sources, PROMPT_SOURCE_CHARS),
        )
    }

    /// Describe a node from its graph neighborhood.
    pub async fn explain(&self, node_id: &str) -> Explanation {
        self.ensure_graph_loaded();
        let Some(node) = self.graph.node(node_id) else {
            return Explanation::not_found();
        };

        let mut neighbors: Vec<NeighborSummary> = self
            .graph
            .neighbors(node_id)
            .into_iter()
            .map(|n| NeighborSummary {
                id: n.node.id,
                label: n.node.label,
                kind: n.node.kind,
                weight: n.weight,
            })
            .collect();
        neighbors.sort_by(|a, b| b.weight.total_cmp(&a.weight));

        let label = if node.label.is_empty() {
            node.id.clone()
        } else {
            node.label.clone()
        };
        let papers = || neighbors.iter().filter(|n| n.kind == NodeKind::Document);

        let heuristic = match node.kind {
            NodeKind::Document => format!(
                "Paper: {}. Key linked concepts: {}. Related papers: {}.",
                label,
                join_labels(
                    neighbors
                        .iter()
                        .filter(|n| n.kind == NodeKind::Concept)
                        .take(EXPLAIN_TOP_CONCEPTS)
                ),
                join_labels(papers().take(EXPLAIN_TOP_RELATED)),
            ),
            NodeKind::Concept => format!(
                "Concept: {}. Mentioned in {} papers. Examples: {}.",
                label,
                papers().count(),
                join_labels(papers().take(EXPLAIN_EXAMPLES)),
            ),
        };

        let context_lines = neighbors
            .iter()
            .take(EXPLAIN_PROMPT_NEIGHBORS)
            .map(|n| format!("- {}: {} (w={:.2})", kind_name(n.kind), n.label, n.weight))
            .collect::<Vec<_>>()
            .join("\n");
        let prompt = format!(
            "Explain the node '{}' ({}) in a research knowledge graph. \
             Summarize how it relates to its strongest neighbors and what it signifies.\n\
             Neighbors (top {} by weight):\n{}\nKeep it to 2-4 concise sentences.",
            label,
            kind_name(node.kind),
            EXPLAIN_PROMPT_NEIGHBORS,
            context_lines
        );

        let synthesis = self.synthesize(EXPLAIN_SYSTEM_PROMPT, &prompt).await;
        let explanation = match &synthesis {
            Synthesis::Enhanced(text) => text.clone(),
            Synthesis::Degraded(_) => heuristic,
            Synthesis::Disabled => format!("{} (LLM disabled)", heuristic),
        };

        Explanation {
            explanation,
            node: Some(node),
            neighbors,
            synthesis: Some(synthesis.outcome()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use papergraph_chat::{GenerateFuture, UnavailableGenerator};
    use papergraph_core::{Chunk, Document, Error};
    use papergraph_store::{GraphNode, KeyphraseConfig, Relation, SparseParams};

    /// Records prompts and answers with a fixed reply or error.
    struct ScriptedGenerator {
        reply: Result<String, String>,
        calls: AtomicUsize,
        last_prompt: parking_lot::Mutex<String>,
    }

    impl ScriptedGenerator {
        fn ok(text: &str) -> Self {
            Self {
                reply: Ok(text.into()),
                calls: AtomicUsize::new(0),
                last_prompt: parking_lot::Mutex::new(String::new()),
            }
        }

        fn failing(reason: &str) -> Self {
            Self {
                reply: Err(reason.into()),
                ..Self::ok("")
            }
        }
    }

    impl TextGenerator for ScriptedGenerator {
        fn is_available(&self) -> bool {
            true
        }

        fn describe(&self) -> String {
            "scripted".into()
        }

        fn generate<'a>(&'a self, _system: &'a str, prompt: &'a str) -> GenerateFuture<'a> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last_prompt.lock() = prompt.to_string();
            let reply = self.reply.clone();
            Box::pin(async move { reply.map_err(Error::Http) })
        }
    }

    fn chunk(doc: &str, i: usize, text: &str) -> Chunk {
        Chunk {
            chunk_id: Chunk::make_id(doc, i),
            document_id: doc.into(),
            title: format!("Paper {}", doc.to_uppercase()),
            text: text.into(),
        }
    }

    struct Fixture {
        _dir: tempfile::TempDir,
        index: Arc<SimilarityIndex>,
        graph: Arc<ConceptGraph>,
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let docs = vec![
            Document {
                document_id: "a".into(),
                title: "Paper A".into(),
                source_path: String::new(),
            },
            Document {
                document_id: "b".into(),
                title: "Paper B".into(),
                source_path: String::new(),
            },
        ];
        let chunks = vec![
            chunk("a", 0, "Transformers use attention. The transformer encoder stacks attention layers."),
            chunk("b", 0, "Vision models adopt the transformer. A transformer splits images into patches."),
            chunk("a", 1, "Training uses large batches of translated sentences."),
        ];

        let index = Arc::new(SimilarityIndex::sparse(dir.path().join("index"), SparseParams::default()));
        index.build(&chunks).unwrap();
        let graph = Arc::new(ConceptGraph::new(dir.path().join("graph")));
        graph.build(&docs, &chunks, KeyphraseConfig::default()).unwrap();
        Fixture {
            _dir: dir,
            index,
            graph,
        }
    }

    fn orchestrator(f: &Fixture, generator: Arc<dyn TextGenerator>) -> QueryOrchestrator {
        QueryOrchestrator::new(f.index.clone(), f.graph.clone(), generator)
    }

    #[tokio::test]
    async fn test_disabled_synthesis_uses_heuristic() {
        let f = fixture();
        let answer = orchestrator(&f, Arc::new(UnavailableGenerator))
            .answer("transformer attention", 5)
            .await;

        assert_eq!(answer.sources.len(), 3);
        assert_eq!(answer.synthesis, Some(SynthesisOutcome::Disabled));
        assert!(answer.answer.contains("LLM Not Configured"));
        assert!(answer.answer.contains("Retrieved 3 chunks across 2 papers."));
        // Both papers share "transformer", so they are linked directly.
        assert_eq!(answer.path.len(), 2);
        assert!(answer.path.contains(&"a".to_string()) && answer.path.contains(&"b".to_string()));
        assert_eq!(answer.subgraph.nodes.len(), 2);
        assert_eq!(answer.subgraph.edges.len(), 1);
    }

    #[tokio::test]
    async fn test_enhanced_answer_gets_footer() {
        let f = fixture();
        let generator = Arc::new(ScriptedGenerator::ok("## Executive Summary\nDone."));
        let answer = orchestrator(&f, generator.clone()).answer("transformer", 2).await;

        assert_eq!(answer.synthesis, Some(SynthesisOutcome::Enhanced));
        assert!(answer.answer.starts_with("## Executive Summary"));
        assert!(answer.answer.contains("- Sources: 2 chunks from"));
        assert!(answer.answer.contains("Retrieval Score Range:"));
        assert_eq!(generator.calls.load(Ordering::SeqCst), 1);
        assert!(generator.last_prompt.lock().contains("**Research Question:** transformer"));
    }

    #[tokio::test]
    async fn test_failed_synthesis_degrades_with_reason() {
        let f = fixture();
        let answer = orchestrator(&f, Arc::new(ScriptedGenerator::failing("request timed out")))
            .answer("transformer", 3)
            .await;

        match &answer.synthesis {
            Some(SynthesisOutcome::Degraded { reason }) => assert!(reason.contains("timed out")),
            other => panic!("expected degraded, got {:?}", other),
        }
        assert!(answer.answer.contains("request timed out"));
        assert!(answer.answer.contains("Traversal order:"));
        assert_eq!(answer.sources.len(), 3);
    }

    #[tokio::test]
    async fn test_no_sources_skips_generator() {
        let dir = tempfile::tempdir().unwrap();
        let index = Arc::new(SimilarityIndex::sparse(dir.path().join("index"), SparseParams::default()));
        let graph = Arc::new(ConceptGraph::new(dir.path().join("graph")));
        let generator = Arc::new(ScriptedGenerator::ok("unused"));

        let answer = QueryOrchestrator::new(index, graph, generator.clone())
            .answer("anything", 5)
            .await;
        assert_eq!(answer.answer, NO_CONTENT_MESSAGE);
        assert!(answer.path.is_empty());
        assert!(answer.subgraph.is_empty());
        assert!(answer.synthesis.is_none());
        assert_eq!(generator.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_excerpt_truncated() {
        let dir = tempfile::tempdir().unwrap();
        let long = "word ".repeat(600);
        let index = Arc::new(SimilarityIndex::sparse(dir.path().join("index"), SparseParams::default()));
        index.build(&[chunk("a", 0, &long)]).unwrap();
        let graph = Arc::new(ConceptGraph::new(dir.path().join("graph")));

        let answer = QueryOrchestrator::new(index, graph, Arc::new(UnavailableGenerator))
            .answer("word", 1)
            .await;
        assert_eq!(answer.sources[0].excerpt.chars().count(), EXCERPT_CHARS);
    }

    #[tokio::test]
    async fn test_explain_unknown_node() {
        let f = fixture();
        let explanation = orchestrator(&f, Arc::new(UnavailableGenerator)).explain("nope").await;
        assert_eq!(explanation.explanation, "Node not found in graph.");
        assert!(explanation.node.is_none());
        assert!(explanation.neighbors.is_empty());
    }

    #[tokio::test]
    async fn test_explain_document_heuristic() {
        let f = fixture();
        let explanation = orchestrator(&f, Arc::new(UnavailableGenerator)).explain("a").await;

        assert!(explanation.explanation.starts_with("Paper: Paper A."));
        assert!(explanation.explanation.contains("Related papers: Paper B."));
        assert!(explanation.explanation.ends_with(" (LLM disabled)"));
        assert!(explanation
            .neighbors
            .windows(2)
            .all(|w| w[0].weight >= w[1].weight));
    }

    #[tokio::test]
    async fn test_explain_concept_heuristic_and_failure_fallback() {
        let dir = tempfile::tempdir().unwrap();
        let graph = Arc::new(ConceptGraph::new(dir.path()));
        graph.add_node(GraphNode::document("a", "Paper A"));
        graph.add_node(GraphNode::document("b", "Paper B"));
        graph.add_node(GraphNode::concept("attention", "attention"));
        graph.add_or_merge_edge("a", "concept::attention", Relation::Mentions, 1.0).unwrap();
        graph.add_or_merge_edge("b", "concept::attention", Relation::Mentions, 2.0).unwrap();
        let index = Arc::new(SimilarityIndex::sparse(dir.path().join("index"), SparseParams::default()));

        let explanation = QueryOrchestrator::new(index, graph, Arc::new(ScriptedGenerator::failing("boom")))
            .explain("concept::attention")
            .await;
        assert_eq!(
            explanation.explanation,
            "Concept: attention. Mentioned in 2 papers. Examples: Paper B, Paper A."
        );
        assert!(matches!(explanation.synthesis, Some(SynthesisOutcome::Degraded { .. })));
    }

    #[tokio::test]
    async fn test_explain_enhanced_uses_generator_text() {
        let f = fixture();
        let generator = Arc::new(ScriptedGenerator::ok("A paper about transformers."));
        let explanation = orchestrator(&f, generator.clone()).explain("b").await;
        assert_eq!(explanation.explanation, "A paper about transformers.");
        assert!(generator.last_prompt.lock().contains("Neighbors (top 20 by weight):"));
    }
}

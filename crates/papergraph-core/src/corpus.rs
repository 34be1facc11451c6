//! Reader for the ingestion collaborator's output.
//!
//! Layout: `papers.json` (array of documents) and `chunks.jsonl`
//! (one chunk per line) inside the chunks directory.

use std::path::Path;

use tracing::{info, warn};

use crate::error::Result;
use crate::snapshot;
use crate::types::{Chunk, Document};

pub const PAPERS_FILE: &str = "papers.json";
pub const CHUNKS_FILE: &str = "chunks.jsonl";

/// Documents and chunks in ingestion order.
#[derive(Debug, Clone, Default)]
pub struct Corpus {
    pub documents: Vec<Document>,
    pub chunks: Vec<Chunk>,
}

impl Corpus {
    /// Chunks belonging to one document, in ingestion order.
    pub fn chunks_for<'a>(&'a self, document_id: &'a str) -> impl Iterator<Item = &'a Chunk> + 'a {
        self.chunks.iter().filter(move |c| c.document_id == document_id)
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty() && self.chunks.is_empty()
    }
}

/// Load the corpus from `dir`. Missing files yield an empty corpus;
/// malformed chunk lines are skipped.
pub fn load_corpus(dir: &Path) -> Corpus {
    let documents: Vec<Document> = snapshot::read_json(&dir.join(PAPERS_FILE)).unwrap_or_default();

    let mut chunks = Vec::new();
    if let Ok(data) = std::fs::read_to_string(dir.join(CHUNKS_FILE)) {
        for (lineno, line) in data.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<Chunk>(line) {
                Ok(c) => chunks.push(c),
                Err(e) => warn!("Skipping malformed chunk at line {}: {}", lineno + 1, e),
            }
        }
    }

    info!(
        "Loaded corpus: {} documents, {} chunks from {}",
        documents.len(),
        chunks.len(),
        dir.display()
    );
    Corpus { documents, chunks }
}

/// Write a corpus in the layout `load_corpus` reads.
pub fn write_corpus(dir: &Path, corpus: &Corpus) -> Result<()> {
    snapshot::write_json(&dir.join(PAPERS_FILE), &corpus.documents)?;
    let mut lines = String::new();
    for chunk in &corpus.chunks {
        lines.push_str(&serde_json::to_string(chunk)?);
        lines.push('\n');
    }
    snapshot::write_atomic(&dir.join(CHUNKS_FILE), lines.as_bytes())
}

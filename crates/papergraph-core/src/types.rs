//! Records handed over by the ingestion collaborator.

use serde::{Deserialize, Serialize};

/// A source document (one ingested paper).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    #[serde(alias = "paper_id")]
    pub document_id: String,
    pub title: String,
    #[serde(alias = "path", default)]
    pub source_path: String,
}

/// A bounded excerpt of a document; the unit of retrieval.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub chunk_id: String,
    #[serde(alias = "paper_id")]
    pub document_id: String,
    pub title: String,
    pub text: String,
}

impl Chunk {
    /// Chunk id in the `<document_id>::chunk_<NNNN>` form used by ingestion.
    pub fn make_id(document_id: &str, ordinal: usize) -> String {
        format!("{}::chunk_{:04}", document_id, ordinal)
    }
}

//! Error types for PaperGraph.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Index error: {0}")]
    Index(String),

    #[error("Graph error: {0}")]
    Graph(String),

    #[error("Inference error: {0}")]
    Inference(String),

    #[error("Synthesis error: {0}")]
    Synthesis(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, Error>;

//! PaperGraph Infer: dense sentence encoder, encoder fallback, query cache.
//!
//! Provides the `EmbedderBackend` trait for generating dense embeddings.
//! When the `onnx` feature is enabled and model files are present,
//! `OnnxEmbedder` loads all-MiniLM-L6-v2 for 384-dim embeddings.
//! Without it, `NoopEmbedder` reports itself unavailable and the
//! similarity index switches to its sparse backend.

pub mod cache;
pub mod embedder;
pub mod onnx_embedder;

pub use cache::QueryCache;
pub use embedder::{EmbedderBackend, EmbeddingResult, NoopEmbedder, DEFAULT_DIM};

#[cfg(feature = "onnx")]
pub use onnx_embedder::OnnxEmbedder;

use std::path::Path;
use std::sync::Arc;

/// Create the best available encoder for the given model directory.
///
/// Tries ONNX first (if feature enabled and model files present),
/// falls back to NoopEmbedder.
pub fn create_embedder(model_dir: &Path) -> Arc<dyn EmbedderBackend> {
    #[cfg(feature = "onnx")]
    {
        match OnnxEmbedder::load(model_dir) {
            Ok(embedder) => {
                tracing::info!("Using ONNX encoder (dim={})", embedder.dimension());
                return Arc::new(embedder);
            }
            Err(e) => {
                tracing::warn!("ONNX encoder unavailable: {}. Using sparse index backend.", e);
            }
        }
    }

    #[cfg(not(feature = "onnx"))]
    {
        let _ = model_dir;
        tracing::info!("ONNX feature disabled. Using sparse index backend.");
    }

    Arc::new(NoopEmbedder::new(DEFAULT_DIM))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_model_falls_back() {
        let embedder = create_embedder(Path::new("/definitely/not/a/model/dir"));
        assert!(!embedder.is_available());
        assert!(embedder.embed("anything").is_none());
    }
}

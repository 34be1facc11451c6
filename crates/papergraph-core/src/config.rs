//! Configuration and data directory management.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Paths to all PaperGraph data directories.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataPaths {
    /// Root data directory (e.g., `storage/`).
    pub root: PathBuf,
    /// Ingestion output: `papers.json` + `chunks.jsonl` (`storage/chunks/`).
    pub chunks: PathBuf,
    /// Similarity index snapshot (`storage/index/`).
    pub index: PathBuf,
    /// Concept graph snapshot (`storage/graph/`).
    pub graph: PathBuf,
    /// Sentence encoder model files (`storage/models/`).
    pub models: PathBuf,
    /// LLM configuration (`storage/llm-config.json`).
    pub llm_config_file: PathBuf,
}

impl DataPaths {
    /// Create data paths from a root directory. Creates directories if needed.
    pub fn new(root: impl AsRef<Path>) -> std::io::Result<Self> {
        let root = root.as_ref().to_path_buf();
        let paths = Self {
            chunks: root.join("chunks"),
            index: root.join("index"),
            graph: root.join("graph"),
            models: root.join("models"),
            llm_config_file: root.join("llm-config.json"),
            root,
        };
        paths.ensure_dirs()?;
        Ok(paths)
    }

    /// Create all required directories.
    fn ensure_dirs(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.chunks)?;
        std::fs::create_dir_all(&self.index)?;
        std::fs::create_dir_all(&self.graph)?;
        Ok(())
    }
}

/// Tunables for graph extraction, sparse fallback, and synthesis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaperGraphConfig {
    /// Data directory paths.
    pub data_paths: DataPaths,
    /// Directory holding `model.onnx` + `tokenizer.json`.
    pub model_dir: PathBuf,
    /// Maximum keyphrases extracted per document.
    pub keyphrase_max: usize,
    /// Number of leading chunks sampled per document for keyphrase extraction.
    pub keyphrase_sample_chunks: usize,
    /// TF-IDF vocabulary cap for the sparse backend.
    pub sparse_max_features: usize,
    /// Projection dimension for the sparse backend.
    pub sparse_components: usize,
    /// Upper bound on a single synthesis call, in seconds.
    pub synthesis_timeout_secs: u64,
    /// Default number of chunks retrieved per question.
    pub default_top_k: usize,
}

pub const DEFAULT_KEYPHRASE_MAX: usize = 15;
pub const DEFAULT_SAMPLE_CHUNKS: usize = 10;
pub const DEFAULT_SPARSE_MAX_FEATURES: usize = 4000;
pub const DEFAULT_SPARSE_COMPONENTS: usize = 256;
pub const DEFAULT_SYNTHESIS_TIMEOUT_SECS: u64 = 45;
pub const DEFAULT_TOP_K: usize = 5;

impl PaperGraphConfig {
    /// Create configuration from environment and defaults.
    pub fn from_env(data_dir: impl AsRef<Path>) -> std::io::Result<Self> {
        let data_paths = DataPaths::new(data_dir)?;

        let model_dir = std::env::var("PAPERGRAPH_MODEL_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| data_paths.models.clone());

        Ok(Self {
            model_dir,
            keyphrase_max: env_or("PAPERGRAPH_KEYPHRASE_MAX", DEFAULT_KEYPHRASE_MAX),
            keyphrase_sample_chunks: env_or("PAPERGRAPH_SAMPLE_CHUNKS", DEFAULT_SAMPLE_CHUNKS),
            sparse_max_features: DEFAULT_SPARSE_MAX_FEATURES,
            sparse_components: DEFAULT_SPARSE_COMPONENTS,
            synthesis_timeout_secs: env_or(
                "PAPERGRAPH_SYNTHESIS_TIMEOUT_SECS",
                DEFAULT_SYNTHESIS_TIMEOUT_SECS,
            ),
            default_top_k: DEFAULT_TOP_K,
            data_paths,
        })
    }

    /// Create configuration with defaults only (no environment lookups).
    pub fn with_defaults(data_dir: impl AsRef<Path>) -> std::io::Result<Self> {
        let data_paths = DataPaths::new(data_dir)?;
        Ok(Self {
            model_dir: data_paths.models.clone(),
            keyphrase_max: DEFAULT_KEYPHRASE_MAX,
            keyphrase_sample_chunks: DEFAULT_SAMPLE_CHUNKS,
            sparse_max_features: DEFAULT_SPARSE_MAX_FEATURES,
            sparse_components: DEFAULT_SPARSE_COMPONENTS,
            synthesis_timeout_secs: DEFAULT_SYNTHESIS_TIMEOUT_SECS,
            default_top_k: DEFAULT_TOP_K,
            data_paths,
        })
    }

    pub fn synthesis_timeout(&self) -> Duration {
        Duration::from_secs(self.synthesis_timeout_secs)
    }
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_paths_created() {
        let dir = tempfile::tempdir().unwrap();
        let paths = DataPaths::new(dir.path()).unwrap();
        assert!(paths.chunks.is_dir());
        assert!(paths.index.is_dir());
        assert!(paths.graph.is_dir());
        assert_eq!(paths.llm_config_file, dir.path().join("llm-config.json"));
    }

    #[test]
    fn test_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = PaperGraphConfig::with_defaults(dir.path()).unwrap();
        assert_eq!(config.keyphrase_max, 15);
        assert_eq!(config.keyphrase_sample_chunks, 10);
        assert_eq!(config.sparse_max_features, 4000);
        assert_eq!(config.sparse_components, 256);
        assert_eq!(config.synthesis_timeout(), Duration::from_secs(45));
    }
}

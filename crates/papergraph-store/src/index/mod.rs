//! Similarity index over chunks with a dense or sparse backend.
//!
//! The backend is chosen once, when the index is opened: dense when the
//! sentence encoder is available, sparse otherwise. `build`, `load` and
//! `query` behave the same either way; callers never branch on backend.
//!
//! On disk (`index/`):
//! - `meta.json`: the indexed chunks, in result-order
//! - `dense.index`: flat inner-product vectors (dense backend only)
//! - `manifest.json`: backend, dimension, count and build time

pub mod dense;
pub mod flat;
pub mod sparse;
pub mod svd;
pub mod tfidf;

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use papergraph_core::{snapshot, Chunk, PaperGraphConfig, Result};
use papergraph_infer::EmbedderBackend;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

pub use dense::DenseBackend;
pub use sparse::{SparseBackend, SparseParams};

pub const META_FILE: &str = "meta.json";
pub const DENSE_INDEX_FILE: &str = "dense.index";
pub const MANIFEST_FILE: &str = "manifest.json";

/// Which embedding strategy an index uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    Dense,
    Sparse,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKind::Dense => write!(f, "dense"),
            BackendKind::Sparse => write!(f, "sparse"),
        }
    }
}

/// Embedding + search strategy behind a `SimilarityIndex`.
///
/// Backends own their vector state; the index owns `meta`. Row `i` of a
/// backend's vectors always corresponds to `meta[i]`.
pub trait IndexBackend: Send + Sync {
    fn kind(&self) -> BackendKind;

    /// Vector dimension, when known.
    fn dimension(&self) -> Option<usize>;

    /// Vectorize `chunks` and persist whatever the backend keeps on disk.
    fn build(&self, chunks: &[Chunk], dir: &Path) -> Result<()>;

    /// Restore backend state for `meta`. Never fails: unusable snapshots are
    /// dropped and rebuilt lazily on the next search.
    fn load(&self, dir: &Path, meta: &[Chunk]);

    /// Top-`k` `(row, score)` pairs by descending score.
    fn search(&self, query: &str, k: usize, meta: &[Chunk]) -> Result<Vec<(usize, f32)>>;

    /// Drop all in-memory state.
    fn reset(&self);
}

/// Written next to `meta.json` after every build.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexManifest {
    pub backend: BackendKind,
    #[serde(default)]
    pub dimension: Option<usize>,
    pub count: usize,
    pub built_at: DateTime<Utc>,
}

/// A retrieved chunk with its similarity score.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredChunk {
    pub chunk: Chunk,
    pub score: f32,
}

pub struct SimilarityIndex {
    dir: PathBuf,
    backend: Box<dyn IndexBackend>,
    meta: RwLock<Vec<Chunk>>,
}

impl SimilarityIndex {
    /// Open an index in `dir`, selecting the dense backend when `embedder`
    /// is available and the sparse backend otherwise.
    pub fn open(
        dir: impl Into<PathBuf>,
        embedder: Arc<dyn EmbedderBackend>,
        params: SparseParams,
    ) -> Self {
        let dir = dir.into();
        if embedder.is_available() {
            info!("Similarity index using dense backend (dim={})", embedder.dimension());
            Self::dense(dir, embedder)
        } else {
            info!("Sentence encoder unavailable, similarity index using sparse backend");
            Self::sparse(dir, params)
        }
    }

    /// Open with paths and sparse parameters taken from `config`.
    pub fn from_config(config: &PaperGraphConfig, embedder: Arc<dyn EmbedderBackend>) -> Self {
        let params = SparseParams {
            max_features: config.sparse_max_features,
            n_components: config.sparse_components,
            ..SparseParams::default()
        };
        Self::open(config.data_paths.index.clone(), embedder, params)
    }

    pub fn dense(dir: impl Into<PathBuf>, embedder: Arc<dyn EmbedderBackend>) -> Self {
        Self::with_backend(dir, Box::new(DenseBackend::new(embedder)))
    }

    pub fn sparse(dir: impl Into<PathBuf>, params: SparseParams) -> Self {
        Self::with_backend(dir, Box::new(SparseBackend::new(params)))
    }

    pub fn with_backend(dir: impl Into<PathBuf>, backend: Box<dyn IndexBackend>) -> Self {
        Self {
            dir: dir.into(),
            backend,
            meta: RwLock::new(Vec::new()),
        }
    }

    pub fn backend_kind(&self) -> BackendKind {
        self.backend.kind()
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Rebuild from `chunks`, replacing any previous state.
    pub fn build(&self, chunks: &[Chunk]) -> Result<IndexManifest> {
        std::fs::create_dir_all(&self.dir)?;
        self.backend.build(chunks, &self.dir)?;
        snapshot::write_json(&self.dir.join(META_FILE), chunks)?;

        let manifest = IndexManifest {
            backend: self.backend.kind(),
            dimension: self.backend.dimension(),
            count: chunks.len(),
            built_at: Utc::now(),
        };
        snapshot::write_json(&self.dir.join(MANIFEST_FILE), &manifest)?;

        *self.meta.write() = chunks.to_vec();
        info!(
            "Similarity index built: {} chunks, backend={}",
            manifest.count, manifest.backend
        );
        Ok(manifest)
    }

    /// Restore from the last snapshot. Returns the number of indexed chunks;
    /// an absent or malformed snapshot yields an empty index.
    pub fn load(&self) -> usize {
        let meta: Vec<Chunk> = snapshot::read_json(&self.dir.join(META_FILE)).unwrap_or_default();
        self.backend.load(&self.dir, &meta);
        let count = meta.len();
        *self.meta.write() = meta;
        info!("Similarity index loaded: {} chunks, backend={}", count, self.backend.kind());
        count
    }

    /// Up to `k` chunks most similar to `text`, by descending score.
    /// `k` is clamped to the number of indexed chunks.
    pub fn query(&self, text: &str, k: usize) -> Result<Vec<ScoredChunk>> {
        if self.meta.read().is_empty() {
            self.load();
        }

        let meta = self.meta.read();
        let k = k.min(meta.len());
        if k == 0 {
            return Ok(Vec::new());
        }

        let hits = self.backend.search(text, k, &meta)?;
        debug!("Query matched {} of {} chunks", hits.len(), meta.len());
        Ok(hits
            .into_iter()
            .filter_map(|(row, score)| {
                meta.get(row).map(|chunk| ScoredChunk {
                    chunk: chunk.clone(),
                    score,
                })
            })
            .collect())
    }

    pub fn len(&self) -> usize {
        self.meta.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.meta.read().is_empty()
    }

    /// Snapshot of the indexed chunks, in index order.
    pub fn meta(&self) -> Vec<Chunk> {
        self.meta.read().clone()
    }

    pub fn manifest(&self) -> Option<IndexManifest> {
        snapshot::read_json(&self.dir.join(MANIFEST_FILE))
    }

    /// Remove persisted state and reset to an empty index.
    pub fn clear(&self) -> Result<()> {
        for name in [META_FILE, DENSE_INDEX_FILE, MANIFEST_FILE] {
            let path = self.dir.join(name);
            if path.exists() {
                std::fs::remove_file(&path)?;
            }
        }
        self.backend.reset();
        self.meta.write().clear();
        info!("Similarity index cleared");
        Ok(())
    }
}

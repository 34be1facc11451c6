//! Sparse statistical backend: TF-IDF + truncated SVD + L2 normalization.
//!
//! Fitted state is owned here and follows a fixed lifecycle:
//! unfit → fit on `build` (or on the first query after `load`) → valid until
//! the next `build`. Only chunk metadata is persisted for this backend.

use std::cmp::Ordering;
use std::path::Path;

use ndarray::{Array1, Array2};
use papergraph_core::{Chunk, Error, Result};
use parking_lot::RwLock;
use tracing::{debug, info};

use super::svd::TruncatedSvd;
use super::tfidf::TfidfVectorizer;
use super::{BackendKind, IndexBackend};

/// Added to row norms so all-zero rows normalize to zero instead of NaN.
const NORM_EPSILON: f32 = 1e-9;

const SVD_SEED: u64 = 42;

/// Vectorizer/projection parameters.
#[derive(Debug, Clone, Copy)]
pub struct SparseParams {
    pub max_features: usize,
    pub max_ngram: usize,
    pub n_components: usize,
}

impl Default for SparseParams {
    fn default() -> Self {
        Self {
            max_features: 4000,
            max_ngram: 2,
            n_components: 256,
        }
    }
}

struct FittedSparse {
    vectorizer: TfidfVectorizer,
    projection: TruncatedSvd,
    /// One normalized row per chunk, parallel to meta.
    vectors: Array2<f32>,
}

impl FittedSparse {
    fn fit(texts: &[&str], params: SparseParams) -> Self {
        let (vectorizer, rows) =
            TfidfVectorizer::fit_transform(texts, params.max_features, params.max_ngram);
        let projection =
            TruncatedSvd::fit(&rows, vectorizer.n_features(), params.n_components, SVD_SEED);

        let dim = projection.n_components();
        let mut vectors = Array2::<f32>::zeros((rows.len(), dim));
        for (i, row) in rows.iter().enumerate() {
            vectors.row_mut(i).assign(&normalize(projection.transform(row)));
        }

        info!(
            "Sparse backend fitted: {} rows, vocab={}, dim={}",
            rows.len(),
            vectorizer.n_features(),
            dim
        );
        Self {
            vectorizer,
            projection,
            vectors,
        }
    }

    fn embed_query(&self, text: &str) -> Array1<f32> {
        normalize(self.projection.transform(&self.vectorizer.transform(text)))
    }
}

fn normalize(v: Array1<f32>) -> Array1<f32> {
    let norm = v.dot(&v).sqrt() + NORM_EPSILON;
    v / norm
}

/// TF-IDF/SVD backend with lazily fitted in-memory state.
pub struct SparseBackend {
    params: SparseParams,
    fitted: RwLock<Option<FittedSparse>>,
}

impl SparseBackend {
    pub fn new(params: SparseParams) -> Self {
        Self {
            params,
            fitted: RwLock::new(None),
        }
    }

    /// Whether fitted state is currently materialized.
    pub fn is_fitted(&self) -> bool {
        self.fitted.read().is_some()
    }

    fn ensure_fitted(&self, meta: &[Chunk]) {
        if self.fitted.read().is_some() {
            return;
        }
        let mut guard = self.fitted.write();
        if guard.is_none() {
            debug!("Refitting sparse backend from {} indexed chunks", meta.len());
            let texts: Vec<&str> = meta.iter().map(|c| c.text.as_str()).collect();
            *guard = Some(FittedSparse::fit(&texts, self.params));
        }
    }
}

impl IndexBackend for SparseBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Sparse
    }

    fn dimension(&self) -> Option<usize> {
        self.fitted.read().as_ref().map(|f| f.vectors.ncols())
    }

    fn build(&self, chunks: &[Chunk], dir: &Path) -> Result<()> {
        let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
        let fitted = FittedSparse::fit(&texts, self.params);
        *self.fitted.write() = Some(fitted);

        // A dense snapshot from an earlier build would no longer match meta.
        let stale = dir.join(super::DENSE_INDEX_FILE);
        if stale.exists() {
            std::fs::remove_file(&stale)?;
        }
        Ok(())
    }

    fn load(&self, _dir: &Path, _meta: &[Chunk]) {
        *self.fitted.write() = None;
    }

    fn search(&self, query: &str, k: usize, meta: &[Chunk]) -> Result<Vec<(usize, f32)>> {
        self.ensure_fitted(meta);
        let guard = self.fitted.read();
        let fitted = guard
            .as_ref()
            .ok_or_else(|| Error::Internal("sparse backend not fitted".into()))?;

        if fitted.vectors.nrows() != meta.len() {
            return Err(Error::Index(format!(
                "vector/meta length mismatch: {} vs {}",
                fitted.vectors.nrows(),
                meta.len()
            )));
        }

        let q = fitted.embed_query(query);
        let sims = fitted.vectors.dot(&q);

        let mut scored: Vec<(usize, f32)> = sims.iter().copied().enumerate().collect();
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
        scored.truncate(k);
        Ok(scored)
    }

    fn reset(&self) {
        *self.fitted.write() = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Axis;

    fn chunk(i: usize, text: &str) -> Chunk {
        Chunk {
            chunk_id: Chunk::make_id("d", i),
            document_id: "d".into(),
            title: "D".into(),
            text: text.into(),
        }
    }

    #[test]
    fn test_rows_are_unit_or_zero() {
        let texts = ["graph neural networks", "", "convolution kernels for images"];
        let fitted = FittedSparse::fit(&texts, SparseParams::default());
        for (i, row) in fitted.vectors.axis_iter(Axis(0)).enumerate() {
            let norm = row.dot(&row).sqrt();
            if i == 1 {
                assert!(norm < 1e-6, "empty text must project to zero");
            } else {
                assert!((norm - 1.0).abs() < 1e-4);
            }
        }
    }

    #[test]
    fn test_lazy_refit_after_load() {
        let dir = tempfile::tempdir().unwrap();
        let meta = vec![chunk(0, "attention is all you need"), chunk(1, "residual learning")];
        let backend = SparseBackend::new(SparseParams::default());

        backend.build(&meta, dir.path()).unwrap();
        assert!(backend.is_fitted());

        backend.load(dir.path(), &meta);
        assert!(!backend.is_fitted());

        let hits = backend.search("attention", 1, &meta).unwrap();
        assert!(backend.is_fitted());
        assert_eq!(hits[0].0, 0);
    }

    #[test]
    fn test_ties_keep_index_order() {
        let dir = tempfile::tempdir().unwrap();
        let meta = vec![
            chunk(0, "alpha beta"),
            chunk(1, "gamma delta"),
            chunk(2, "epsilon zeta"),
        ];
        let backend = SparseBackend::new(SparseParams::default());
        backend.build(&meta, dir.path()).unwrap();

        // Nothing in the vocabulary: every similarity is zero.
        let hits = backend.search("unrelated words", 3, &meta).unwrap();
        let order: Vec<usize> = hits.iter().map(|h| h.0).collect();
        assert_eq!(order, vec![0, 1, 2]);
    }

    #[test]
    fn test_build_removes_stale_dense_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let stale = dir.path().join(crate::index::DENSE_INDEX_FILE);
        std::fs::write(&stale, b"old").unwrap();

        let backend = SparseBackend::new(SparseParams::default());
        backend.build(&[chunk(0, "text")], dir.path()).unwrap();
        assert!(!stale.exists());
    }
}

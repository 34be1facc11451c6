//! Dense backend: sentence encoder + flat inner-product index.

use std::path::Path;
use std::sync::Arc;

use ndarray::{Array1, Array2};
use papergraph_core::{Chunk, Error, Result};
use papergraph_infer::EmbedderBackend;
use parking_lot::RwLock;
use tracing::{debug, info, warn};

use super::flat::{FlatIpIndex, NOT_FOUND};
use super::{BackendKind, IndexBackend, DENSE_INDEX_FILE};

pub struct DenseBackend {
    embedder: Arc<dyn EmbedderBackend>,
    index: RwLock<Option<FlatIpIndex>>,
}

fn l2_normalize(v: Array1<f32>) -> Array1<f32> {
    let norm = v.dot(&v).sqrt();
    if norm > 0.0 {
        v / norm
    } else {
        v
    }
}

impl DenseBackend {
    pub fn new(embedder: Arc<dyn EmbedderBackend>) -> Self {
        Self {
            embedder,
            index: RwLock::new(None),
        }
    }

    /// Encode every chunk into a fresh index. Any failed encoding aborts.
    fn encode(&self, chunks: &[Chunk]) -> Result<FlatIpIndex> {
        let dim = self.embedder.dimension();
        let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
        let encoded = self.embedder.embed_batch(&texts);

        let mut matrix = Array2::<f32>::zeros((chunks.len(), dim));
        for (i, result) in encoded.into_iter().enumerate() {
            let result = result.ok_or_else(|| {
                Error::Inference(format!("failed to encode chunk {}", chunks[i].chunk_id))
            })?;
            if result.embedding.len() != dim {
                return Err(Error::Index(format!(
                    "encoder returned dim {} for chunk {}, expected {}",
                    result.embedding.len(),
                    chunks[i].chunk_id,
                    dim
                )));
            }
            matrix.row_mut(i).assign(&l2_normalize(result.embedding));
        }

        let mut index = FlatIpIndex::new(dim);
        index.add(&matrix)?;
        Ok(index)
    }

    pub fn is_materialized(&self) -> bool {
        self.index.read().is_some()
    }
}

impl IndexBackend for DenseBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Dense
    }

    fn dimension(&self) -> Option<usize> {
        Some(self.embedder.dimension())
    }

    fn build(&self, chunks: &[Chunk], dir: &Path) -> Result<()> {
        let index = self.encode(chunks)?;
        index.write_to(&dir.join(DENSE_INDEX_FILE))?;
        info!("Dense index built: {} vectors, dim={}", index.len(), index.dimension());
        *self.index.write() = Some(index);
        Ok(())
    }

    fn load(&self, dir: &Path, meta: &[Chunk]) {
        let path = dir.join(DENSE_INDEX_FILE);
        let restored = if path.exists() {
            match FlatIpIndex::read_from(&path) {
                Ok(index)
                    if index.len() == meta.len()
                        && index.dimension() == self.embedder.dimension() =>
                {
                    Some(index)
                }
                Ok(index) => {
                    warn!(
                        "Ignoring {}: {} vectors of dim {} do not match {} chunks of dim {}",
                        path.display(),
                        index.len(),
                        index.dimension(),
                        meta.len(),
                        self.embedder.dimension()
                    );
                    None
                }
                Err(e) => {
                    warn!("Ignoring unreadable dense index {}: {}", path.display(), e);
                    None
                }
            }
        } else {
            None
        };
        *self.index.write() = restored;
    }

    fn search(&self, query: &str, k: usize, meta: &[Chunk]) -> Result<Vec<(usize, f32)>> {
        if self.index.read().is_none() {
            debug!("Dense index absent, re-encoding {} chunks", meta.len());
            let rebuilt = self.encode(meta)?;
            let mut guard = self.index.write();
            if guard.is_none() {
                *guard = Some(rebuilt);
            }
        }

        let query_vec = self
            .embedder
            .embed(query)
            .ok_or_else(|| Error::Inference("failed to encode query".into()))?;
        let query_vec = l2_normalize(query_vec.embedding);

        let guard = self.index.read();
        let index = guard
            .as_ref()
            .ok_or_else(|| Error::Internal("dense index not materialized".into()))?;
        if index.len() != meta.len() {
            return Err(Error::Index(format!(
                "vector/meta length mismatch: {} vs {}",
                index.len(),
                meta.len()
            )));
        }

        let (scores, ids) = index.search(query_vec.view(), k);
        Ok(ids
            .into_iter()
            .zip(scores)
            .filter(|(id, _)| *id != NOT_FOUND)
            .map(|(id, score)| (id as usize, score))
            .collect())
    }

    fn reset(&self) {
        *self.index.write() = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use papergraph_infer::EmbeddingResult;

    /// Maps each text to a fixed 3-dim vector keyed on its first word.
    struct KeywordEmbedder;

    impl EmbedderBackend for KeywordEmbedder {
        fn embed(&self, text: &str) -> Option<EmbeddingResult> {
            let v = match text.split_whitespace().next()? {
                "red" => [1.0, 0.0, 0.0],
                "green" => [0.0, 2.0, 0.0],
                _ => [0.0, 0.0, 1.0],
            };
            Some(EmbeddingResult {
                embedding: Array1::from_vec(v.to_vec()),
                cached: false,
            })
        }

        fn dimension(&self) -> usize {
            3
        }

        fn is_available(&self) -> bool {
            true
        }
    }

    fn chunks(texts: &[&str]) -> Vec<Chunk> {
        texts
            .iter()
            .enumerate()
            .map(|(i, t)| Chunk {
                chunk_id: Chunk::make_id("d", i),
                document_id: "d".into(),
                title: "D".into(),
                text: t.to_string(),
            })
            .collect()
    }

    #[test]
    fn test_build_persists_and_search_normalizes() {
        let dir = tempfile::tempdir().unwrap();
        let meta = chunks(&["red apple", "green leaf", "blue sky"]);
        let backend = DenseBackend::new(Arc::new(KeywordEmbedder));
        backend.build(&meta, dir.path()).unwrap();
        assert!(dir.path().join(DENSE_INDEX_FILE).exists());

        let hits = backend.search("green grass", 5, &meta).unwrap();
        assert_eq!(hits.len(), 3, "not-found slots are filtered");
        assert_eq!(hits[0].0, 1);
        assert!((hits[0].1 - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_mismatched_snapshot_reencoded_on_query() {
        let dir = tempfile::tempdir().unwrap();
        let backend = DenseBackend::new(Arc::new(KeywordEmbedder));
        backend.build(&chunks(&["red"]), dir.path()).unwrap();

        let meta = chunks(&["red", "green"]);
        backend.load(dir.path(), &meta);
        assert!(!backend.is_materialized());

        let hits = backend.search("green", 1, &meta).unwrap();
        assert_eq!(hits[0].0, 1);
        assert!(backend.is_materialized());
    }

    #[test]
    fn test_corrupt_snapshot_treated_as_absent() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(DENSE_INDEX_FILE), b"garbage").unwrap();
        let backend = DenseBackend::new(Arc::new(KeywordEmbedder));
        backend.load(dir.path(), &chunks(&["red"]));
        assert!(!backend.is_materialized());
    }

    #[test]
    fn test_overflowing_header_treated_as_absent() {
        let dir = tempfile::tempdir().unwrap();
        let mut bytes = crate::index::flat::MAGIC.to_vec();
        bytes.extend_from_slice(&u32::MAX.to_le_bytes());
        bytes.extend_from_slice(&(u64::MAX / 2).to_le_bytes());
        std::fs::write(dir.path().join(DENSE_INDEX_FILE), bytes).unwrap();

        let meta = chunks(&["red", "green"]);
        let backend = DenseBackend::new(Arc::new(KeywordEmbedder));
        backend.load(dir.path(), &meta);
        assert!(!backend.is_materialized());
        assert_eq!(backend.search("green", 1, &meta).unwrap()[0].0, 1);
    }
}

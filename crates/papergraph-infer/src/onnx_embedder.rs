//! ONNX sentence encoder using all-MiniLM-L6-v2.
//!
//! Loads a SentenceTransformers ONNX export and its tokenizer, produces
//! mean-pooled 384-dimensional float32 embeddings. Requires the `onnx` feature.

#[cfg(feature = "onnx")]
mod inner {
    use std::path::Path;
    use std::sync::Arc;

    use ndarray::Array1;
    use ort::session::Session;
    use ort::value::Tensor;
    use papergraph_core::{Error, Result};
    use parking_lot::Mutex;
    use tokenizers::{Encoding, Tokenizer};
    use tracing::{debug, info, warn};

    use crate::cache::QueryCache;
    use crate::embedder::{EmbedderBackend, EmbeddingResult, DEFAULT_DIM};

    /// Maximum sequence length for the model.
    const MAX_SEQ_LEN: usize = 256;

    /// Chunk texts are encoded this many at a time.
    const BATCH_SIZE: usize = 32;

    /// ONNX sentence encoder.
    pub struct OnnxEmbedder {
        session: Arc<Mutex<Session>>,
        tokenizer: Tokenizer,
        cache: QueryCache,
        dimension: usize,
    }

    impl OnnxEmbedder {
        /// Load an ONNX model and tokenizer from the given directory.
        ///
        /// Expects:
        /// - `model_dir/model.onnx`: the ONNX model file
        /// - `model_dir/tokenizer.json`: the HuggingFace tokenizer
        pub fn load(model_dir: &Path) -> Result<Self> {
            let model_path = model_dir.join("model.onnx");
            let tokenizer_path = model_dir.join("tokenizer.json");

            if !model_path.exists() {
                return Err(Error::Inference(format!(
                    "Model not found: {}",
                    model_path.display()
                )));
            }
            if !tokenizer_path.exists() {
                return Err(Error::Inference(format!(
                    "Tokenizer not found: {}",
                    tokenizer_path.display()
                )));
            }

            // With load-dynamic, ORT_DYLIB_PATH must point to libonnxruntime.
            ort::init().commit();

            let session = Session::builder()
                .map_err(|e| Error::Inference(format!("Session builder: {}", e)))?
                .with_intra_threads(2)
                .map_err(|e| Error::Inference(format!("Session threads: {}", e)))?
                .commit_from_file(&model_path)
                .map_err(|e| Error::Inference(format!("Failed to load ONNX model: {}", e)))?;

            let tokenizer = Tokenizer::from_file(&tokenizer_path)
                .map_err(|e| Error::Inference(format!("Failed to load tokenizer: {}", e)))?;

            info!(
                "ONNX encoder loaded: dim={}, model={}",
                DEFAULT_DIM,
                model_path.display()
            );

            Ok(Self {
                session: Arc::new(Mutex::new(session)),
                tokenizer,
                cache: QueryCache::default_cache(),
                dimension: DEFAULT_DIM,
            })
        }

        /// Encode a batch in a single forward pass, right-padding to the
        /// longest sequence and mean-pooling under the attention mask.
        fn infer_batch(&self, texts: &[&str]) -> Option<Vec<Array1<f32>>> {
            if texts.is_empty() {
                return Some(Vec::new());
            }

            let encodings: Vec<Encoding> = self
                .tokenizer
                .encode_batch(texts.to_vec(), true)
                .map_err(|e| warn!("Tokenization failed: {}", e))
                .ok()?;

            let batch = encodings.len();
            let seq_len = encodings
                .iter()
                .map(|e| e.get_ids().len().min(MAX_SEQ_LEN))
                .max()
                .unwrap_or(0)
                .max(1);

            let mut ids = vec![0i64; batch * seq_len];
            let mut mask = vec![0i64; batch * seq_len];
            for (row, enc) in encodings.iter().enumerate() {
                let n = enc.get_ids().len().min(MAX_SEQ_LEN);
                for t in 0..n {
                    ids[row * seq_len + t] = enc.get_ids()[t] as i64;
                    mask[row * seq_len + t] = enc.get_attention_mask()[t] as i64;
                }
            }
            let type_ids = vec![0i64; batch * seq_len];

            let ids_tensor = Tensor::from_array(([batch, seq_len], ids))
                .map_err(|e| warn!("Failed to create ids tensor: {}", e))
                .ok()?;
            let mask_tensor = Tensor::from_array(([batch, seq_len], mask.clone()))
                .map_err(|e| warn!("Failed to create mask tensor: {}", e))
                .ok()?;
            let type_tensor = Tensor::from_array(([batch, seq_len], type_ids))
                .map_err(|e| warn!("Failed to create type_ids tensor: {}", e))
                .ok()?;

            let mut session = self.session.lock();
            let outputs = session
                .run(ort::inputs![ids_tensor, mask_tensor, type_tensor])
                .map_err(|e| warn!("ONNX inference failed: {}", e))
                .ok()?;

            // SentenceTransformers exports emit either token embeddings
            // [batch, seq, dim] (needs pooling) or sentence embeddings [batch, dim].
            let (shape, data) = outputs[0]
                .try_extract_tensor::<f32>()
                .map_err(|e| warn!("Failed to extract output tensor: {}", e))
                .ok()?;
            let dims: Vec<i64> = shape.iter().copied().collect();

            let mut out = Vec::with_capacity(batch);
            match dims.as_slice() {
                [b, s, d] if *b as usize == batch => {
                    let (s, d) = (*s as usize, *d as usize);
                    for row in 0..batch {
                        let mut pooled = Array1::<f32>::zeros(d);
                        let mut count = 0.0f32;
                        for t in 0..s.min(seq_len) {
                            if mask[row * seq_len + t] == 0 {
                                continue;
                            }
                            let offset = (row * s + t) * d;
                            for k in 0..d {
                                pooled[k] += data[offset + k];
                            }
                            count += 1.0;
                        }
                        if count < 1.0 {
                            return None;
                        }
                        out.push(pooled / count);
                    }
                }
                [b, d] if *b as usize == batch => {
                    let d = *d as usize;
                    for row in 0..batch {
                        out.push(Array1::from_vec(data[row * d..(row + 1) * d].to_vec()));
                    }
                }
                other => {
                    warn!("Unexpected output shape: {:?}", other);
                    return None;
                }
            }

            debug!("Encoded batch of {} (seq_len={})", batch, seq_len);
            Some(out)
        }
    }

    impl EmbedderBackend for OnnxEmbedder {
        fn embed(&self, text: &str) -> Option<EmbeddingResult> {
            if let Some(cached) = self.cache.get(text) {
                return Some(EmbeddingResult {
                    embedding: cached,
                    cached: true,
                });
            }

            let embedding = self.infer_batch(&[text])?.pop()?;
            self.cache.put(text.to_string(), embedding.clone());

            Some(EmbeddingResult {
                embedding,
                cached: false,
            })
        }

        fn embed_batch(&self, texts: &[&str]) -> Vec<Option<EmbeddingResult>> {
            let mut results = Vec::with_capacity(texts.len());
            for group in texts.chunks(BATCH_SIZE) {
                match self.infer_batch(group) {
                    Some(vectors) => results.extend(vectors.into_iter().map(|embedding| {
                        Some(EmbeddingResult {
                            embedding,
                            cached: false,
                        })
                    })),
                    None => results.extend(group.iter().map(|_| None)),
                }
            }
            results
        }

        fn dimension(&self) -> usize {
            self.dimension
        }

        fn is_available(&self) -> bool {
            true
        }
    }
}

#[cfg(feature = "onnx")]
pub use inner::OnnxEmbedder;

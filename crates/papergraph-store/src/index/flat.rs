//! Exact inner-product search over a dense row matrix.
//!
//! Rows are expected to be L2-normalized, so inner product equals cosine
//! similarity. Persisted as a small little-endian binary file:
//! magic, `u32` dimension, `u64` row count, then `rows * dim` `f32` values.

use std::io::{Read, Write};
use std::path::Path;

use ndarray::{Array2, ArrayView1, Axis};
use papergraph_core::{snapshot, Error, Result};

pub(crate) const MAGIC: &[u8; 8] = b"PGFLAT01";

/// Row id returned for slots that could not be filled.
pub const NOT_FOUND: i64 = -1;

/// Flat (brute-force) inner-product index.
#[derive(Debug, Clone)]
pub struct FlatIpIndex {
    dim: usize,
    vectors: Array2<f32>,
}

impl FlatIpIndex {
    pub fn new(dim: usize) -> Self {
        Self {
            dim,
            vectors: Array2::zeros((0, dim)),
        }
    }

    pub fn dimension(&self) -> usize {
        self.dim
    }

    pub fn len(&self) -> usize {
        self.vectors.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Append rows. Dimension must match the index.
    pub fn add(&mut self, rows: &Array2<f32>) -> Result<()> {
        if rows.ncols() != self.dim {
            return Err(Error::Index(format!(
                "dimension mismatch: index={}, rows={}",
                self.dim,
                rows.ncols()
            )));
        }
        for row in rows.axis_iter(Axis(0)) {
            self.vectors
                .push(Axis(0), row)
                .map_err(|e| Error::Internal(format!("Matrix append failed: {}", e)))?;
        }
        Ok(())
    }

    /// Top-`k` rows by inner product with `query`.
    ///
    /// Always returns exactly `k` slots as `(scores, ids)`; slots beyond the
    /// number of stored rows carry `NOT_FOUND` and `f32::NEG_INFINITY`.
    pub fn search(&self, query: ArrayView1<f32>, k: usize) -> (Vec<f32>, Vec<i64>) {
        let mut scored: Vec<(usize, f32)> = if self.is_empty() || query.len() != self.dim {
            Vec::new()
        } else {
            self.vectors.dot(&query).iter().copied().enumerate().collect()
        };
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));

        let mut scores = Vec::with_capacity(k);
        let mut ids = Vec::with_capacity(k);
        for slot in 0..k {
            match scored.get(slot) {
                Some(&(i, s)) => {
                    ids.push(i as i64);
                    scores.push(s);
                }
                None => {
                    ids.push(NOT_FOUND);
                    scores.push(f32::NEG_INFINITY);
                }
            }
        }
        (scores, ids)
    }

    /// Persist the index atomically.
    pub fn write_to(&self, path: &Path) -> Result<()> {
        let mut buf: Vec<u8> = Vec::with_capacity(20 + self.vectors.len() * 4);
        buf.write_all(MAGIC)?;
        buf.write_all(&(self.dim as u32).to_le_bytes())?;
        buf.write_all(&(self.len() as u64).to_le_bytes())?;
        for v in self.vectors.iter() {
            buf.write_all(&v.to_le_bytes())?;
        }
        snapshot::write_atomic(path, &buf)
    }

    /// Read an index written by `write_to`.
    pub fn read_from(path: &Path) -> Result<Self> {
        let mut file = std::fs::File::open(path)?;
        let mut magic = [0u8; 8];
        file.read_exact(&mut magic)?;
        if &magic != MAGIC {
            return Err(Error::Index(format!("bad index header in {}", path.display())));
        }

        let mut dim_bytes = [0u8; 4];
        file.read_exact(&mut dim_bytes)?;
        let dim = u32::from_le_bytes(dim_bytes) as usize;

        let mut len_bytes = [0u8; 8];
        file.read_exact(&mut len_bytes)?;
        let rows = u64::from_le_bytes(len_bytes) as usize;

        let expected = rows
            .checked_mul(dim)
            .and_then(|n| n.checked_mul(4))
            .ok_or_else(|| {
                Error::Index(format!(
                    "bad index header in {}: {} rows of dim {}",
                    path.display(),
                    rows,
                    dim
                ))
            })?;

        let mut payload = Vec::new();
        file.read_to_end(&mut payload)?;
        if payload.len() != expected {
            return Err(Error::Index(format!(
                "truncated index {}: expected {} bytes, found {}",
                path.display(),
                expected,
                payload.len()
            )));
        }

        let data: Vec<f32> = payload
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect();
        let vectors = Array2::from_shape_vec((rows, dim), data)
            .map_err(|e| Error::Index(format!("bad index shape: {}", e)))?;
        Ok(Self { dim, vectors })
    }
}

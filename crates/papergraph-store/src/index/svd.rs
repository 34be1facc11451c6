//! Truncated SVD over sparse rows via a seeded randomized range finder.
//!
//! Halko-style: sample the range of `X` with a random test matrix, refine it
//! with a few power iterations, then solve the small problem `B = Qᵀ X`
//! exactly through a Jacobi eigendecomposition of `B Bᵀ`. Components are
//! sign-normalized so the largest-magnitude loading is positive, which
//! makes the projection reproducible for a given corpus and seed.

use ndarray::{Array1, Array2, Axis};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use super::tfidf::SparseRow;

const OVERSAMPLES: usize = 10;
const POWER_ITERATIONS: usize = 5;
const JACOBI_MAX_SWEEPS: usize = 64;

/// Fitted linear projection `x -> components · x`.
#[derive(Debug, Clone)]
pub struct TruncatedSvd {
    /// Shape `(k, n_features)`; rows are orthonormal right singular vectors.
    components: Array2<f64>,
    singular_values: Vec<f64>,
}

impl TruncatedSvd {
    /// Fit at most `n_components` components. The effective count is capped by
    /// the number of rows and features.
    pub fn fit(rows: &[SparseRow], n_features: usize, n_components: usize, seed: u64) -> Self {
        let n = rows.len();
        let k = n_components.min(n).min(n_features);
        if k == 0 {
            return Self {
                components: Array2::zeros((0, n_features)),
                singular_values: Vec::new(),
            };
        }
        let l = (k + OVERSAMPLES).min(n).min(n_features);

        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let omega = Array2::from_shape_fn((n_features, l), |_| rng.gen_range(-1.0..1.0));

        // Range finder: Q spans the dominant column space of X.
        let mut q = orthonormalize(sparse_mul(rows, &omega));
        for _ in 0..POWER_ITERATIONS {
            let z = orthonormalize(sparse_t_mul(rows, n_features, &q));
            q = orthonormalize(sparse_mul(rows, &z));
        }

        // B = Qᵀ X, shape (l, n_features).
        let mut b = Array2::<f64>::zeros((l, n_features));
        for (i, row) in rows.iter().enumerate() {
            let qi = q.row(i);
            for &(col, x) in row {
                let x = x as f64;
                for r in 0..l {
                    b[[r, col]] += qi[r] * x;
                }
            }
        }

        // B Bᵀ = U Λ Uᵀ  =>  right singular vectors Vᵀ = Λ^{-1/2} Uᵀ B.
        let gram = b.dot(&b.t());
        let (eigenvalues, eigenvectors) = symmetric_eigen(gram);

        let mut order: Vec<usize> = (0..l).collect();
        order.sort_by(|&a, &c| eigenvalues[c].total_cmp(&eigenvalues[a]));

        let mut components = Array2::<f64>::zeros((k, n_features));
        let mut singular_values = Vec::with_capacity(k);
        for (out, &idx) in order.iter().take(k).enumerate() {
            let sigma = eigenvalues[idx].max(0.0).sqrt();
            singular_values.push(sigma);
            if sigma < 1e-12 {
                continue;
            }
            let u = eigenvectors.column(idx);
            let mut v = u.dot(&b) / sigma;

            let pivot = v
                .iter()
                .copied()
                .fold(0.0f64, |acc, x| if x.abs() > acc.abs() { x } else { acc });
            if pivot < 0.0 {
                v.mapv_inplace(|x| -x);
            }
            components.row_mut(out).assign(&v);
        }

        Self {
            components,
            singular_values,
        }
    }

    /// Output dimension.
    pub fn n_components(&self) -> usize {
        self.components.nrows()
    }

    pub fn singular_values(&self) -> &[f64] {
        &self.singular_values
    }

    /// Project one sparse row.
    pub fn transform(&self, row: &SparseRow) -> Array1<f32> {
        let mut out = Array1::<f32>::zeros(self.n_components());
        for (c, comp) in self.components.axis_iter(Axis(0)).enumerate() {
            let mut acc = 0.0f64;
            for &(col, x) in row {
                acc += comp[col] * x as f64;
            }
            out[c] = acc as f32;
        }
        out
    }
}

/// `X · M` for sparse `X` (n × f) and dense `M` (f × l).
fn sparse_mul(rows: &[SparseRow], m: &Array2<f64>) -> Array2<f64> {
    let mut out = Array2::<f64>::zeros((rows.len(), m.ncols()));
    for (i, row) in rows.iter().enumerate() {
        let mut dst = out.row_mut(i);
        for &(col, x) in row {
            dst.scaled_add(x as f64, &m.row(col));
        }
    }
    out
}

/// `Xᵀ · M` for sparse `X` (n × f) and dense `M` (n × l).
fn sparse_t_mul(rows: &[SparseRow], n_features: usize, m: &Array2<f64>) -> Array2<f64> {
    let mut out = Array2::<f64>::zeros((n_features, m.ncols()));
    for (i, row) in rows.iter().enumerate() {
        let src = m.row(i);
        for &(col, x) in row {
            out.row_mut(col).scaled_add(x as f64, &src);
        }
    }
    out
}

/// Modified Gram-Schmidt over columns. Columns that collapse to zero
/// (rank deficiency) stay zero.
fn orthonormalize(mut a: Array2<f64>) -> Array2<f64> {
    let cols = a.ncols();
    for j in 0..cols {
        for p in 0..j {
            let proj = a.column(p).dot(&a.column(j));
            if proj != 0.0 {
                let prev = a.column(p).to_owned();
                a.column_mut(j).scaled_add(-proj, &prev);
            }
        }
        let norm = a.column(j).dot(&a.column(j)).sqrt();
        if norm > 1e-10 {
            a.column_mut(j).mapv_inplace(|x| x / norm);
        } else {
            a.column_mut(j).fill(0.0);
        }
    }
    a
}

/// Cyclic Jacobi eigendecomposition of a symmetric matrix.
/// Returns (eigenvalues, eigenvectors as columns).
fn symmetric_eigen(mut a: Array2<f64>) -> (Vec<f64>, Array2<f64>) {
    let n = a.nrows();
    let mut v = Array2::<f64>::eye(n);

    for _ in 0..JACOBI_MAX_SWEEPS {
        let off: f64 = (0..n)
            .flat_map(|i| (0..n).filter(move |&j| j != i).map(move |j| (i, j)))
            .map(|(i, j)| a[[i, j]] * a[[i, j]])
            .sum();
        let scale: f64 = a.iter().map(|x| x * x).sum();
        if off <= 1e-22 * scale.max(1e-300) {
            break;
        }

        for p in 0..n {
            for q in (p + 1)..n {
                let apq = a[[p, q]];
                if apq.abs() < 1e-300 {
                    continue;
                }
                let theta = (a[[q, q]] - a[[p, p]]) / (2.0 * apq);
                let t = theta.signum() / (theta.abs() + (theta * theta + 1.0).sqrt());
                let c = 1.0 / (t * t + 1.0).sqrt();
                let s = t * c;

                for k in 0..n {
                    let akp = a[[k, p]];
                    let akq = a[[k, q]];
                    a[[k, p]] = c * akp - s * akq;
                    a[[k, q]] = s * akp + c * akq;
                }
                for k in 0..n {
                    let apk = a[[p, k]];
                    let aqk = a[[q, k]];
                    a[[p, k]] = c * apk - s * aqk;
                    a[[q, k]] = s * apk + c * aqk;
                }
                for k in 0..n {
                    let vkp = v[[k, p]];
                    let vkq = v[[k, q]];
                    v[[k, p]] = c * vkp - s * vkq;
                    v[[k, q]] = s * vkp + c * vkq;
                }
            }
        }
    }

    let eigenvalues = (0..n).map(|i| a[[i, i]]).collect();
    (eigenvalues, v)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn dense_to_sparse(m: &Array2<f64>) -> Vec<SparseRow> {
        m.axis_iter(Axis(0))
            .map(|r| {
                r.iter()
                    .enumerate()
                    .filter(|(_, x)| **x != 0.0)
                    .map(|(c, &x)| (c, x as f32))
                    .collect()
            })
            .collect()
    }

    #[test]
    fn test_jacobi_diagonalizes() {
        let (vals, vecs) = symmetric_eigen(array![[2.0, 1.0], [1.0, 2.0]]);
        let mut sorted = vals.clone();
        sorted.sort_by(|a, b| a.total_cmp(b));
        assert!((sorted[0] - 1.0).abs() < 1e-9);
        assert!((sorted[1] - 3.0).abs() < 1e-9);
        // Eigenvectors are orthonormal.
        let gram = vecs.t().dot(&vecs);
        assert!((gram[[0, 0]] - 1.0).abs() < 1e-9);
        assert!(gram[[0, 1]].abs() < 1e-9);
    }

    #[test]
    fn test_singular_values_of_diagonal_matrix() {
        let m = array![[3.0, 0.0, 0.0], [0.0, 2.0, 0.0], [0.0, 0.0, 1.0]];
        let svd = TruncatedSvd::fit(&dense_to_sparse(&m), 3, 2, 42);
        assert_eq!(svd.n_components(), 2);
        assert!((svd.singular_values()[0] - 3.0).abs() < 1e-6);
        assert!((svd.singular_values()[1] - 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_projection_preserves_inner_products_at_full_rank() {
        let m = array![[1.0, 2.0, 0.0], [0.0, 1.0, 1.0], [1.0, 0.0, 3.0]];
        let rows = dense_to_sparse(&m);
        let svd = TruncatedSvd::fit(&rows, 3, 3, 42);

        let a = svd.transform(&rows[0]);
        let b = svd.transform(&rows[2]);
        // Full-rank projection is orthogonal: <a, b> == <x0, x2> == 1.
        assert!((a.dot(&b) - 1.0).abs() < 1e-4);
    }

    #[test]
    fn test_component_count_capped_by_rows() {
        let m = array![[1.0, 0.0, 2.0, 0.0]];
        let svd = TruncatedSvd::fit(&dense_to_sparse(&m), 4, 256, 42);
        assert_eq!(svd.n_components(), 1);
    }

    #[test]
    fn test_same_seed_same_projection() {
        let m = array![[1.0, 2.0, 0.0, 1.0], [0.0, 1.0, 1.0, 0.0], [2.0, 0.0, 1.0, 1.0]];
        let rows = dense_to_sparse(&m);
        let a = TruncatedSvd::fit(&rows, 4, 2, 42).transform(&rows[1]);
        let b = TruncatedSvd::fit(&rows, 4, 2, 42).transform(&rows[1]);
        assert_eq!(a, b);
    }

    #[test]
    fn test_empty_corpus() {
        let svd = TruncatedSvd::fit(&[], 0, 256, 42);
        assert_eq!(svd.n_components(), 0);
        assert_eq!(svd.transform(&Vec::new()).len(), 0);
    }
}

use core::cmp::Ordering;

use hmma::Scalar;
use tracing::{debug, warn};

use crate::config::SolverConfig;
use crate::dvec::DVec;
use crate::error::{MatrixError, Result};
use crate::matrix::Matrix;
use crate::storage::Layout;

/// Singular Value Decomposition: A = U * Σ * Vᵀ
///
/// One-sided Jacobi rotations on the columns of A (or Aᵀ for wide input).
/// Singular values come out sorted descending. Columns of `u` that belong to
/// negligible singular values are replaced by an orthonormal completion, so
/// `u` always has orthonormal columns.
#[derive(Clone, Debug)]
pub struct Svd<S> {
    /// Left singular vectors, `m x k` (thin) or `m x m` (full).
    pub u: Matrix<S>,
    /// Singular values, `k = min(m, n)` of them, descending.
    pub s: DVec<S>,
    /// Right singular vectors, `n x k` (thin) or `n x n` (full).
    pub v: Matrix<S>,
}

impl<S: Scalar> Svd<S> {
    /// Thin SVD of an m×n matrix.
    pub fn new<L: Layout>(a: &Matrix<S, L>) -> Result<Self> {
        Self::new_with(a, &SolverConfig::default())
    }

    pub fn new_with<L: Layout>(a: &Matrix<S, L>, config: &SolverConfig) -> Result<Self> {
        if a.rows() >= a.cols() {
            Self::compute_tall(a.to_dense(), config)
        } else {
            // A = (Aᵀ)ᵀ = V' Σ U'ᵀ
            let mut at = a.to_dense();
            at.transpose();
            let svd = Self::compute_tall(at, config)?;
            Ok(Svd { u: svd.v, s: svd.s, v: svd.u })
        }
    }

    /// SVD for m >= n via one-sided Jacobi.
    fn compute_tall(mut u: Matrix<S>, config: &SolverConfig) -> Result<Self> {
        let m = u.rows();
        let n = u.cols();
        debug_assert!(m >= n);

        let mut v = Matrix::<S>::identity(n);
        let tol = S::EPSILON * S::from_i32(10);
        let mut sweeps = 0;
        let mut converged = n < 2;

        while !converged {
            if sweeps == config.svd_max_sweeps {
                warn!(m, n, sweeps, "svd: Jacobi sweeps did not converge");
                return Err(MatrixError::not_solvable("svd did not converge"));
            }
            sweeps += 1;
            converged = true;

            for p in 0..n {
                for q in (p + 1)..n {
                    let mut app = S::ZERO;
                    let mut aqq = S::ZERO;
                    let mut apq = S::ZERO;
                    for i in 0..m {
                        let up = u.at(i, p);
                        let uq = u.at(i, q);
                        app += up * up;
                        aqq += uq * uq;
                        apq += up * uq;
                    }

                    // already orthogonal
                    if apq == S::ZERO || apq.abs() <= tol * (app * aqq).sqrt() {
                        continue;
                    }
                    converged = false;

                    let tau = (aqq - app) / (S::TWO * apq);
                    let t = if tau >= S::ZERO {
                        (tau + (S::ONE + tau * tau).sqrt()).recip()
                    } else {
                        -((-tau) + (S::ONE + tau * tau).sqrt()).recip()
                    };
                    let c = (S::ONE + t * t).sqrt().recip();
                    let s = t * c;

                    for i in 0..m {
                        let up = u.at(i, p);
                        let uq = u.at(i, q);
                        u.set(i, p, c * up - s * uq);
                        u.set(i, q, s * up + c * uq);
                    }
                    for i in 0..n {
                        let vp = v.at(i, p);
                        let vq = v.at(i, q);
                        v.set(i, p, c * vp - s * vq);
                        v.set(i, q, s * vp + c * vq);
                    }
                }
            }
        }
        debug!(m, n, sweeps, "svd: converged");

        // singular values are the column norms of the rotated A
        let sigma: DVec<S> = (0..n).map(|j| u.get_column(j).dot(&u.get_column(j)).sqrt()).collect();
        let order = sigma.argsort_by(|a, b| b.partial_cmp(&a).unwrap_or(Ordering::Equal));
        let s = sigma.permute(&order);

        let cutoff = S::EPSILON * S::from_usize(m) * if n > 0 { s[0] } else { S::ZERO };
        let rank = s.iter().take_while(|&&x| x > cutoff).count();
        let mut u_sorted = Matrix::from_fn(m, n, |i, j| u.at(i, order[j]));
        for j in 0..rank {
            let inv = s[j].recip();
            for x in u_sorted.column_slice_mut(j) {
                *x *= inv;
            }
        }
        complete_basis(&mut u_sorted, rank);
        let v_sorted = Matrix::from_fn(n, n, |i, j| v.at(i, order[j]));

        Ok(Svd { u: u_sorted, s, v: v_sorted })
    }

    /// Extend `u` to `m x m` and `v` to `n x n` orthogonal matrices.
    pub fn into_full(self) -> Self {
        Svd { u: widen(&self.u), s: self.s, v: widen(&self.v) }
    }

    /// Σ shaped to fit between `u` and `vᵀ`: `k x k` for the thin form,
    /// `m x n` once [`into_full`](Self::into_full) has been applied.
    pub fn sigma(&self) -> Matrix<S> {
        Matrix::from_fn(self.u.cols(), self.v.cols(), |i, j| if i == j { self.s[i] } else { S::ZERO })
    }

    pub fn vt(&self) -> Matrix<S> {
        let mut vt = self.v.clone();
        vt.transpose();
        vt
    }

    /// Number of singular values above `tol`.
    pub fn rank(&self, tol: S) -> usize {
        self.s.iter().filter(|&&s| s > tol).count()
    }

    /// Pseudoinverse: A⁺ = V Σ⁺ Uᵀ
    pub fn pseudoinverse(&self, tol: S) -> Matrix<S> {
        let k = self.s.len();
        let s_inv = DVec::from_fn(k, |i| if self.s[i] > tol { self.s[i].recip() } else { S::ZERO });
        Matrix::from_fn(self.v.rows(), self.u.rows(), |i, j| {
            let mut sum = S::ZERO;
            for l in 0..k {
                sum += self.v.at(i, l) * s_inv[l] * self.u.at(j, l);
            }
            sum
        })
    }

    /// U * diag(s) * Vᵀ
    pub fn reconstruct(&self) -> Matrix<S> {
        let k = self.s.len();
        Matrix::from_fn(self.u.rows(), self.v.rows(), |i, j| {
            let mut sum = S::ZERO;
            for l in 0..k {
                sum += self.u.at(i, l) * self.s[l] * self.v.at(j, l);
            }
            sum
        })
    }
}

/// Overwrite columns `from..` of `q` with unit vectors orthogonal to all
/// earlier columns. Columns `..from` must already be orthonormal.
fn complete_basis<S: Scalar>(q: &mut Matrix<S>, from: usize) {
    let m = q.rows();
    for j in from..q.cols() {
        let mut best: Option<(S, Vec<S>)> = None;
        for e in 0..m {
            let mut v = vec![S::ZERO; m];
            v[e] = S::ONE;
            // two passes of Gram-Schmidt
            for _ in 0..2 {
                for p in 0..j {
                    let col = q.column_slice(p);
                    let d = col.iter().zip(&v).fold(S::ZERO, |acc, (&a, &b)| acc + a * b);
                    for (x, &c) in v.iter_mut().zip(col) {
                        *x -= d * c;
                    }
                }
            }
            let norm = v.iter().fold(S::ZERO, |acc, &x| acc + x * x).sqrt();
            if best.as_ref().map_or(true, |(b, _)| norm > *b) {
                best = Some((norm, v));
            }
        }
        if let Some((norm, v)) = best {
            for (dst, x) in q.column_slice_mut(j).iter_mut().zip(v) {
                *dst = x / norm;
            }
        }
    }
}

/// Square orthogonal matrix whose leading columns are `q`.
fn widen<S: Scalar>(q: &Matrix<S>) -> Matrix<S> {
    let (m, k) = q.shape();
    if k >= m {
        return q.clone();
    }
    let mut full = Matrix::zeros(m, m);
    for j in 0..k {
        full.column_slice_mut(j).copy_from_slice(q.column_slice(j));
    }
    complete_basis(&mut full, k);
    full
}

impl<S: Scalar, L: Layout> Matrix<S, L> {
    /// `(U, Σ, V)` with `U * Σ * Vᵀ = A`. With `full_size_s` the factors are
    /// `m x m`, `m x n` and `n x n`; otherwise `m x k`, `k x k` and `n x k`.
    pub fn svd(&self, full_size_s: bool) -> Result<(Matrix<S>, Matrix<S>, Matrix<S>)> {
        let mut svd = Svd::new(self)?;
        if full_size_s {
            svd = svd.into_full();
        }
        let sigma = svd.sigma();
        Ok((svd.u, sigma, svd.v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::MatExpr;

    #[test]
    fn svd_identity() {
        let a = Matrix::<f64>::identity(3);
        let svd = Svd::new(&a).unwrap();
        for i in 0..3 {
            assert!((svd.s[i] - 1.0).abs() < 1e-10);
        }
    }

    #[test]
    fn svd_reconstruct() {
        let a = Matrix::from_fn(3, 2, |i, j| (i * 2 + j + 1) as f64);
        let recon = Svd::new(&a).unwrap().reconstruct();
        for i in 0..3 {
            for j in 0..2 {
                assert!(
                    (recon.at(i, j) - a.at(i, j)).abs() < 1e-8,
                    "mismatch at ({}, {}): {} vs {}",
                    i,
                    j,
                    recon.at(i, j),
                    a.at(i, j)
                );
            }
        }
    }

    #[test]
    fn svd_rank_deficient() {
        let r1 = Matrix::from_rows(&[[1.0, 2.0], [2.0, 4.0], [3.0, 6.0]]).unwrap();
        let svd = Svd::new(&r1).unwrap();
        assert!(svd.rank(1e-10) == 1, "rank should be 1, got {}", svd.rank(1e-10));
        let utu = (!&svd.u * &svd.u).materialize();
        assert!(utu.approx_eq(&Matrix::<f64>::identity(2), 1e-12));
    }

    #[test]
    fn svd_wide_matrix() {
        let a = Matrix::from_fn(2, 3, |i, j| (i * 3 + j + 1) as f64);
        let (u, s, v) = a.svd(false).unwrap();
        assert_eq!((u.shape(), s.shape(), v.shape()), ((2, 2), (2, 2), (3, 2)));
        assert!((&u * &s * !&v).approx_eq(&a, 1e-10));
    }

    #[test]
    fn full_size_factors_are_square() {
        let a = Matrix::from_fn(5, 3, |i, j| ((i + 1) * (j + 2)) as f64 + if i == j { 1.0 } else { 0.0 });
        let (u, s, v) = a.svd(true).unwrap();
        assert_eq!((u.shape(), s.shape(), v.shape()), ((5, 5), (5, 3), (3, 3)));
        assert!((!&u * &u).approx_eq(&Matrix::<f64>::identity(5), 1e-10));
        assert!((&u * &s * !&v).approx_eq(&a, 1e-10));
    }

    #[test]
    fn pseudoinverse() {
        let a = Matrix::from_rows(&[[1.0, 0.0], [0.0, 1.0], [0.0, 0.0]]).unwrap();
        let pinv = Svd::new(&a).unwrap().pseudoinverse(1e-10);
        let prod = (&pinv * &a).materialize();
        assert!(prod.approx_eq(&Matrix::<f64>::identity(2), 1e-8));
    }

    #[test]
    fn zero_matrix_does_not_produce_nan() {
        let a = Matrix::<f64>::zeros(3, 2);
        let svd = Svd::new(&a).unwrap();
        assert!(svd.s.iter().all(|&x| x == 0.0));
        assert!(svd.u.as_slice().iter().all(|x| x.is_finite()));
    }
}

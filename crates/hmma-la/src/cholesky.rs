use hmma::Scalar;
use tracing::warn;

use crate::config::SolverConfig;
use crate::dvec::DVec;
use crate::error::{MatrixError, Result};
use crate::matrix::Matrix;
use crate::storage::Layout;

/// Cholesky decomposition: A = L * Lᵀ for symmetric positive definite matrices.
#[derive(Clone, Debug)]
pub struct Cholesky<S> {
    l: Matrix<S>,
}

impl<S: Scalar> Cholesky<S> {
    /// Fails with `NotSquare` for non-square input and `NotSolvable` when the
    /// matrix is not symmetric positive definite.
    pub fn new<L: Layout>(a: &Matrix<S, L>) -> Result<Self> {
        let n = a.require_square()?;
        let cfg = SolverConfig::default();
        let tol = cfg.eq_tol::<S>() * S::ONE.max(a.amax());
        if !a.is_symmetric_within(tol) {
            return Err(MatrixError::not_solvable("cholesky: matrix is not symmetric"));
        }
        let mut l = Matrix::zeros(n, n);

        for j in 0..n {
            let mut sum = S::ZERO;
            for k in 0..j {
                sum += l.at(j, k) * l.at(j, k);
            }
            let diag = a.at(j, j) - sum;
            if diag <= S::ZERO {
                warn!(n, column = j, "cholesky: matrix is not positive definite");
                return Err(MatrixError::not_solvable("cholesky: matrix is not positive definite"));
            }
            let ljj = diag.sqrt();
            l.set(j, j, ljj);
            let ljj_inv = ljj.recip();

            for i in (j + 1)..n {
                let mut sum = S::ZERO;
                for k in 0..j {
                    sum += l.at(i, k) * l.at(j, k);
                }
                l.set(i, j, (a.at(i, j) - sum) * ljj_inv);
            }
        }

        Ok(Self { l })
    }

    /// The lower-triangular factor L.
    pub fn l(&self) -> &Matrix<S> { &self.l }

    /// The upper-triangular factor R = Lᵀ, so that A = Rᵀ * R.
    pub fn r(&self) -> Matrix<S> {
        let mut r = self.l.clone();
        r.transpose();
        r
    }

    /// Solve Ax = b via L Lᵀ x = b.
    pub fn solve(&self, b: &DVec<S>) -> DVec<S> {
        let n = self.l.rows();
        debug_assert_eq!(b.len(), n);

        // L y = b
        let mut y = DVec::zeros(n);
        for i in 0..n {
            let mut sum = b[i];
            for j in 0..i {
                sum -= self.l.at(i, j) * y[j];
            }
            y[i] = sum / self.l.at(i, i);
        }

        // Lᵀ x = y
        let mut x = DVec::zeros(n);
        for i in (0..n).rev() {
            let mut sum = y[i];
            for j in (i + 1)..n {
                sum -= self.l.at(j, i) * x[j];
            }
            x[i] = sum / self.l.at(i, i);
        }

        x
    }

    /// Determinant = product of diagonal².
    pub fn det(&self) -> S {
        let mut d = S::ONE;
        for i in 0..self.l.rows() {
            let l = self.l.at(i, i);
            d *= l * l;
        }
        d
    }
}

impl<S: Scalar, L: Layout> Matrix<S, L> {
    /// Cholesky factor. With `right` the upper factor R (`A = Rᵀ * R`),
    /// otherwise the lower factor L (`A = L * Lᵀ`).
    pub fn chod(&self, right: bool) -> Result<Matrix<S>> {
        let chol = Cholesky::new(self)?;
        Ok(if right { chol.r() } else { chol.l().clone() })
    }
}

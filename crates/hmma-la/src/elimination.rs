//! Gaussian elimination with partial pivoting.
//!
//! One reduction routine backs `determinant`, `inverse`, `rref`, `rank` and
//! `solve_se`; the cofactor family (`get_minor`, `cofactor`, `adjoint`,
//! `determinant_laplace`) is built on top of it.

use hmma::Scalar;
use tracing::{debug, warn};

use crate::config::SolverConfig;
use crate::error::{MatrixError, Result};
use crate::expr::MatExpr;
use crate::matrix::Matrix;
use crate::storage::Layout;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Form {
    /// Zeros below each pivot only.
    Echelon,
    /// Unit pivots with zeros above and below.
    Reduced,
}

#[derive(Clone, Copy, Debug)]
pub(crate) struct Reduction<S> {
    pub rank: usize,
    pub swaps: usize,
    /// Product of the pivots as found, before any normalization.
    pub pivot_product: S,
}

/// Row index in `from..rows` with the largest magnitude in `col`.
pub(crate) fn partial_pivot<S: Scalar>(m: &Matrix<S>, col: usize, from: usize) -> usize {
    let column = m.column_slice(col);
    let mut best = from;
    let mut best_val = S::NEG_INFINITY;
    for (r, &v) in column.iter().enumerate().skip(from) {
        let a = v.abs();
        if a > best_val {
            best_val = a;
            best = r;
        }
    }
    best
}

/// Largest magnitude in the first `cols` columns.
fn coeff_max<S: Scalar>(m: &Matrix<S>, cols: usize) -> S {
    let mut max = S::ZERO;
    for &v in &m.as_slice()[..m.rows() * cols] {
        max = max.max(v.abs());
    }
    max
}

/// Reduce `work` in place, pivoting on its first `coeff_cols` columns and
/// carrying any remaining columns along.
///
/// A candidate pivot with magnitude at or below `tol` marks its column as
/// dependent; the column is zeroed from the current pivot row down and
/// skipped.
pub(crate) fn reduce<S: Scalar>(work: &mut Matrix<S>, coeff_cols: usize, tol: S, form: Form) -> Reduction<S> {
    let rows = work.rows();
    let total = work.cols();
    let mut lead = 0;
    let mut swaps = 0;
    let mut pivot_product = S::ONE;

    for col in 0..coeff_cols {
        if lead == rows {
            break;
        }
        let p = partial_pivot(work, col, lead);
        if work.at(p, col).abs() <= tol {
            for r in lead..rows {
                work.set(r, col, S::ZERO);
            }
            continue;
        }
        if p != lead {
            work.swap_rows(p, lead);
            swaps += 1;
        }
        let pivot = work.at(lead, col);
        pivot_product *= pivot;

        if form == Form::Reduced {
            let inv = pivot.recip();
            for c in col..total {
                let v = work.at(lead, c);
                work.set(lead, c, v * inv);
            }
            work.set(lead, col, S::ONE);
        }

        let pivot = work.at(lead, col);
        let first = if form == Form::Reduced { 0 } else { lead + 1 };
        for r in first..rows {
            if r == lead {
                continue;
            }
            let factor = work.at(r, col) / pivot;
            if factor == S::ZERO {
                continue;
            }
            for c in (col + 1)..total {
                let v = work.at(r, c) - factor * work.at(lead, c);
                work.set(r, c, v);
            }
            work.set(r, col, S::ZERO);
        }
        lead += 1;
    }

    Reduction { rank: lead, swaps, pivot_product }
}

/// `[a | b]` as one dense matrix.
fn augment<S: Scalar, L: Layout, M: MatExpr<S>>(a: &Matrix<S, L>, b: &M) -> Matrix<S> {
    let n = a.cols();
    Matrix::from_fn(a.rows(), n + b.cols(), |r, c| if c < n { a.at(r, c) } else { b.eval(r, c - n) })
}

impl<S: Scalar, L: Layout> Matrix<S, L> {
    pub(crate) fn require_square(&self) -> Result<usize> {
        if self.is_square() {
            Ok(self.rows())
        } else {
            Err(MatrixError::not_square(self.rows(), self.cols()))
        }
    }

    pub fn determinant(&self) -> Result<S> {
        self.determinant_with(&SolverConfig::default())
    }

    /// Determinant by elimination. Exactly zero when the matrix is
    /// rank-deficient at the configured pivot tolerance.
    pub fn determinant_with(&self, config: &SolverConfig) -> Result<S> {
        let n = self.require_square()?;
        if n == 0 {
            return Ok(S::ONE);
        }
        let mut work = self.to_dense();
        let tol = config.pivot_tol(n, coeff_max(&work, n));
        let red = reduce(&mut work, n, tol, Form::Echelon);
        if red.rank < n {
            debug!(n, rank = red.rank, "determinant: rank deficient");
            return Ok(S::ZERO);
        }
        let sign = if red.swaps % 2 == 0 { S::ONE } else { -S::ONE };
        Ok(sign * red.pivot_product)
    }

    pub fn inverse(&self) -> Result<Matrix<S>> {
        self.inverse_with(&SolverConfig::default())
    }

    /// Gauss-Jordan inverse of `[A | I]`.
    pub fn inverse_with(&self, config: &SolverConfig) -> Result<Matrix<S>> {
        let n = self.require_square()?;
        let mut work = augment(self, &Matrix::<S>::identity(n));
        let tol = config.pivot_tol(n, coeff_max(&work, n));
        let red = reduce(&mut work, n, tol, Form::Reduced);
        if red.rank < n {
            warn!(n, rank = red.rank, "inverse: singular matrix");
            return Err(MatrixError::Singular);
        }
        Ok(work.submatrix(0, n, n, n))
    }

    /// Replace the matrix by its inverse.
    pub fn invert(&mut self) -> Result<()> {
        let inv = self.inverse()?;
        self.assign(&inv)
    }

    pub fn rref(&self) -> (Matrix<S>, usize) {
        self.rref_with(&SolverConfig::default())
    }

    /// Row-reduced echelon form and the rank it reveals.
    pub fn rref_with(&self, config: &SolverConfig) -> (Matrix<S>, usize) {
        let mut work = self.to_dense();
        let cols = work.cols();
        let tol = config.pivot_tol(work.rows().max(cols), coeff_max(&work, cols));
        let red = reduce(&mut work, cols, tol, Form::Reduced);
        (work, red.rank)
    }

    pub fn rank(&self) -> usize {
        self.rank_with(&SolverConfig::default())
    }

    pub fn rank_with(&self, config: &SolverConfig) -> usize {
        let mut work = self.to_dense();
        let cols = work.cols();
        let tol = config.pivot_tol(work.rows().max(cols), coeff_max(&work, cols));
        reduce(&mut work, cols, tol, Form::Echelon).rank
    }

    /// True for non-square matrices and for square ones without full rank.
    pub fn is_singular(&self) -> bool {
        !self.is_square() || self.rank() < self.rows()
    }

    pub fn solve_se<L2: Layout>(&self, rhs: &Matrix<S, L2>) -> Result<Matrix<S>> {
        self.solve_se_with(rhs, &SolverConfig::default())
    }

    /// Solve `A X = B` for every column of `B`.
    pub fn solve_se_with<L2: Layout>(&self, rhs: &Matrix<S, L2>, config: &SolverConfig) -> Result<Matrix<S>> {
        let n = self.require_square()?;
        if rhs.rows() != n {
            return Err(MatrixError::not_solvable(format!(
                "right-hand side has {} rows, system has {n}",
                rhs.rows()
            )));
        }
        let mut work = augment(self, rhs);
        let tol = config.pivot_tol(n, coeff_max(&work, n));
        let red = reduce(&mut work, n, tol, Form::Reduced);
        if red.rank < n {
            warn!(n, rank = red.rank, "solve_se: system has no unique solution");
            return Err(MatrixError::not_solvable("coefficient matrix is singular"));
        }
        Ok(work.submatrix(0, n, n, rhs.cols()))
    }

    /// Copy without row `row` and column `col`.
    pub fn get_minor(&self, row: usize, col: usize) -> Matrix<S> {
        debug_assert!(row < self.rows() && col < self.cols());
        Matrix::from_fn(self.rows() - 1, self.cols() - 1, |r, c| {
            let r = if r < row { r } else { r + 1 };
            let c = if c < col { c } else { c + 1 };
            self.at(r, c)
        })
    }

    /// Signed minor `(-1)^(row+col) * det(minor(row, col))`.
    pub fn cofactor(&self, row: usize, col: usize) -> Result<S> {
        self.require_square()?;
        let det = self.get_minor(row, col).determinant()?;
        Ok(if (row + col) % 2 == 0 { det } else { -det })
    }

    /// Transposed cofactor matrix, so `A * adj(A) = det(A) * I`.
    pub fn adjoint(&self) -> Result<Matrix<S>> {
        let n = self.require_square()?;
        if n == 1 {
            return Ok(Matrix::new(1, 1, S::ONE));
        }
        let mut adj = Matrix::zeros(n, n);
        for r in 0..n {
            for c in 0..n {
                adj.set(c, r, self.cofactor(r, c)?);
            }
        }
        Ok(adj)
    }

    /// Determinant by cofactor expansion along the first row. Factorial
    /// cost; meant for small matrices and cross-checks.
    pub fn determinant_laplace(&self) -> Result<S> {
        let n = self.require_square()?;
        Ok(match n {
            0 => S::ONE,
            1 => self.at(0, 0),
            2 => self.at(0, 0) * self.at(1, 1) - self.at(0, 1) * self.at(1, 0),
            _ => {
                let mut det = S::ZERO;
                for c in 0..n {
                    let a = self.at(0, c);
                    if a == S::ZERO {
                        continue;
                    }
                    let minor = self.get_minor(0, c).determinant_laplace()?;
                    det += if c % 2 == 0 { a * minor } else { -(a * minor) };
                }
                det
            }
        })
    }

    /// `A * Aᵀ == Aᵀ * A`.
    pub fn is_normal(&self) -> bool {
        if !self.is_square() {
            return false;
        }
        let scale = self.amax();
        let tol = SolverConfig::default().eq_tol::<S>() * S::ONE.max(scale * scale);
        (self * !self).approx_eq(&(!self * self), tol)
    }

    /// Transpose equals inverse. Fails with `Singular` when there is no
    /// inverse to compare against.
    pub fn is_orthogonal(&self) -> Result<bool> {
        if !self.is_square() {
            return Ok(false);
        }
        let inv = self.inverse()?;
        Ok(inv.approx_eq(&!self, SolverConfig::default().eq_tol()))
    }

    /// Orthogonal with determinant 1.
    pub fn is_special_orthogonal(&self) -> Result<bool> {
        if !self.is_orthogonal()? {
            return Ok(false);
        }
        let tol: S = SolverConfig::default().eq_tol();
        Ok((self.determinant()? - S::ONE).abs() <= tol)
    }
}

//! Column statistics: each column is a variable, each row an observation.

use hmma::Scalar;
use tracing::warn;

use crate::error::{MatrixError, Result};
use crate::expr::MatExpr;
use crate::matrix::Matrix;
use crate::storage::Layout;

impl<S: Scalar, L: Layout> Matrix<S, L> {
    /// `cols x cols` covariance matrix. The unbiased estimate divides by
    /// `rows - 1`, the biased one by `rows`.
    pub fn covariance(&self, unbiased: bool) -> Result<Matrix<S>> {
        let (rows, cols) = self.shape();
        let observations = if unbiased { rows.saturating_sub(1) } else { rows };
        if observations == 0 {
            warn!(rows, unbiased, "covariance: not enough observations");
            return Err(MatrixError::not_solvable(format!("covariance of {rows} observation(s)")));
        }

        let mean = self.col_mean().materialize();
        let centered = Matrix::from_fn(rows, cols, |r, c| self.at(r, c) - mean.at(0, c));
        let scale = S::from_usize(observations).recip();
        Ok((!&centered * &centered).scaled(scale).materialize())
    }

    /// Pearson correlation coefficients between columns.
    pub fn correlation(&self) -> Result<Matrix<S>> {
        let cov = self.covariance(true)?;
        let n = cov.rows();
        let sd = cov.diagonal().iter().map(|&v| v.sqrt()).collect::<Vec<_>>();
        if let Some(col) = sd.iter().position(|&s| s == S::ZERO) {
            warn!(column = col, "correlation: column has zero variance");
            return Err(MatrixError::not_solvable(format!("correlation: column {col} has zero variance")));
        }
        Ok(Matrix::from_fn(n, n, |i, j| if i == j { S::ONE } else { cov.at(i, j) / (sd[i] * sd[j]) }))
    }
}

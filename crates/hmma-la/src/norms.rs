use hmma::Scalar;

use crate::error::Result;
use crate::matrix::Matrix;
use crate::storage::Layout;
use crate::svd::Svd;

impl<S: Scalar, L: Layout> Matrix<S, L> {
    /// Frobenius norm: square root of the sum of squared cells.
    pub fn norm(&self) -> S {
        let mut sum = S::ZERO;
        for line in self.iter_cols() {
            for x in line {
                sum += x * x;
            }
        }
        sum.sqrt()
    }

    /// Spectral norm: the largest singular value.
    pub fn max_norm(&self) -> Result<S> {
        if self.is_empty() {
            return Ok(S::ZERO);
        }
        let svd = Svd::new(self)?;
        Ok(svd.s.iter().copied().fold(S::ZERO, S::max))
    }

    /// Largest absolute column sum.
    pub fn col_norm(&self) -> S {
        self.iter_cols().map(|c| c.iter().fold(S::ZERO, |acc, x| acc + x.abs())).fold(S::ZERO, S::max)
    }

    /// Largest absolute row sum.
    pub fn row_norm(&self) -> S {
        self.iter_rows().map(|r| r.iter().fold(S::ZERO, |acc, x| acc + x.abs())).fold(S::ZERO, S::max)
    }

    /// `‖A‖ · ‖A⁻¹‖` in the Frobenius norm.
    pub fn condition(&self) -> Result<S> {
        let inv = self.inverse()?;
        Ok(self.norm() * inv.norm())
    }
}

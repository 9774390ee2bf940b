use hmma::Scalar;
use tracing::{debug, warn};

use crate::config::SolverConfig;
use crate::eigen::EigenSort;
use crate::error::{MatrixError, Result};
use crate::expr::MatExpr;
use crate::matrix::Matrix;
use crate::storage::Layout;

/// `x^n`, rejecting results that would be complex or infinite.
///
/// `|x| <= zero_tol` counts as zero.
fn real_power<S: Scalar>(x: S, n: S, zero_tol: S) -> Result<S> {
    let x = if x.abs() <= zero_tol { S::ZERO } else { x };
    if x == S::ZERO && n < S::ZERO {
        warn!(exponent = n.to_f64(), "power: zero eigenvalue with negative exponent");
        Err(MatrixError::Singular)
    } else if n.is_integral() {
        Ok(x.powf(n))
    } else if x < S::ZERO {
        warn!(base = x.to_f64(), exponent = n.to_f64(), "power: negative base with fractional exponent");
        Err(MatrixError::not_solvable("power: negative eigenvalue with fractional exponent"))
    } else {
        Ok(x.powf(n))
    }
}

impl<S: Scalar, L: Layout> Matrix<S, L> {
    /// `A^n` for real `n`.
    ///
    /// With `is_diag` the matrix is taken to be diagonal and each diagonal
    /// entry is raised directly. Otherwise `A = V Λ V⁻¹` is formed from the
    /// eigen decomposition and `V Λⁿ V⁻¹` returned. Eigenvalues within
    /// `eq_tolerance * max(1, max|λ|)` of zero are taken as zero.
    ///
    /// Fails with `Singular` for a zero eigenvalue (or diagonal entry) and a
    /// negative `n`, and with `NotSolvable` when the result would be complex
    /// or `V` cannot be inverted.
    pub fn power(&self, n: S, is_diag: bool) -> Result<Matrix<S>> {
        self.power_with(n, is_diag, &SolverConfig::default())
    }

    pub fn power_with(&self, n: S, is_diag: bool, config: &SolverConfig) -> Result<Matrix<S>> {
        let size = self.require_square()?;
        if is_diag {
            let mut out = Matrix::zeros(size, size);
            for i in 0..size {
                out.set(i, i, real_power(self.at(i, i), n, S::ZERO)?);
            }
            return Ok(out);
        }

        let space = self.eigen_space_with(EigenSort::None, config)?;
        if !space.is_real() {
            warn!(n = size, "power: complex eigenvalues");
            return Err(MatrixError::not_solvable("power: matrix has complex eigenvalues"));
        }
        let zero_tol = config.eq_tol::<S>() * space.values.amax().max(S::ONE);
        let mut lambda = Matrix::zeros(size, size);
        for i in 0..size {
            lambda.set(i, i, real_power(space.values[i], n, zero_tol)?);
        }
        let v_inv = space.vectors.inverse_with(config).map_err(|err| match err {
            MatrixError::Singular => {
                warn!(n = size, "power: eigenvectors are not independent");
                MatrixError::not_solvable("power: matrix is not diagonalizable")
            }
            other => other,
        })?;
        debug!(n = size, exponent = n.to_f64(), "power: eigen reconstruction");
        Ok((&space.vectors * &lambda * &v_inv).materialize())
    }

    /// Replace the matrix by `A^n`. A symmetric layout only keeps the
    /// upper triangle of the result.
    pub fn power_in_place(&mut self, n: S, is_diag: bool) -> Result<()> {
        let result = self.power(n, is_diag)?;
        self.assign(&result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Symmetric;

    #[test]
    fn diagonal_fast_path() {
        let a = Matrix::from_diagonal(&[4.0, 9.0, 16.0]);
        let r = a.power(0.5, true).unwrap();
        assert_eq!(r.diagonal().as_slice(), &[2.0, 3.0, 4.0]);
        assert!(r.is_diagonal());
    }

    #[test]
    fn negative_diagonal_fractional_exponent() {
        let a = Matrix::from_diagonal(&[4.0, -1.0]);
        assert!(matches!(a.power(0.5, true), Err(MatrixError::NotSolvable(_))));
        let sq = a.power(2.0, true).unwrap();
        assert_eq!(sq.diagonal().as_slice(), &[16.0, 1.0]);
    }

    #[test]
    fn square_root_of_spd_matrix() {
        let a = Matrix::<f64, Symmetric>::symmetric_from_fn(3, |r, c| [[5.0, 2.0, 0.0], [2.0, 5.0, 1.0], [0.0, 1.0, 4.0]][r][c]);
        let root = a.power(0.5, false).unwrap();
        assert!((&root * &root).approx_eq(&a, 1e-10));
    }

    #[test]
    fn integer_power_matches_product() {
        let a = Matrix::from_rows(&[[2.0, 1.0], [0.0, 3.0]]).unwrap();
        let cube = a.power(3.0, false).unwrap();
        let expected = (&a * &a * &a).materialize();
        assert!(cube.approx_eq(&expected, 1e-9), "{cube}");
    }

    #[test]
    fn complex_spectrum_is_rejected() {
        let rot = Matrix::from_rows(&[[0.0, -1.0], [1.0, 0.0]]).unwrap();
        assert!(matches!(rot.power(2.0, false), Err(MatrixError::NotSolvable(_))));
    }

    #[test]
    fn negative_exponent_of_zero_diagonal_is_singular() {
        let a = Matrix::from_diagonal(&[1.0, 0.0]);
        assert!(matches!(a.power(-1.0, true), Err(MatrixError::Singular)));
        assert!(matches!(a.power(-0.5, true), Err(MatrixError::Singular)));
        let inv = Matrix::from_diagonal(&[2.0, 4.0]).power(-1.0, true).unwrap();
        assert_eq!(inv.diagonal().as_slice(), &[0.5, 0.25]);
    }

    #[test]
    fn negative_exponent_of_singular_matrix_is_singular() {
        let a = Matrix::from_rows(&[[1.0, 0.0], [0.0, 0.0]]).unwrap();
        assert!(matches!(a.power(-1.0, false), Err(MatrixError::Singular)));
        let s = Matrix::<f64, Symmetric>::symmetric_from_fn(2, |_, _| 1.0);
        assert!(matches!(s.power(-2.0, false), Err(MatrixError::Singular)));
    }

    #[test]
    fn square_root_of_rank_deficient_psd_matrix() {
        // B diag(1, 1, 0) B with B symmetric and well conditioned
        let b = Matrix::from_rows(&[[2.0, 1.0, 0.5], [1.0, 3.0, -1.0], [0.5, -1.0, 4.0]]).unwrap();
        let d = Matrix::from_diagonal(&[1.0, 1.0, 0.0]);
        let a = (&b * &d * &b).materialize();
        let root = a.power(0.5, false).unwrap();
        assert!((&root * &root).approx_eq(&a, 1e-9), "{root}");
    }

    #[test]
    fn in_place_keeps_layout() {
        let mut a = Matrix::<f64, Symmetric>::symmetric_from_fn(2, |r, c| if r == c { 2.0 } else { 1.0 });
        a.power_in_place(2.0, false).unwrap();
        assert!((a.at(0, 0) - 5.0).abs() < 1e-10);
        assert!((a.at(1, 0) - 4.0).abs() < 1e-10);
    }
}

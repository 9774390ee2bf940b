//! Numerical tuning knobs shared by the solvers.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use hmma::Scalar;

/// Tolerances and iteration budgets used by the elimination core and the
/// iterative decompositions.
///
/// Every algorithm has a plain entry point that uses
/// [`SolverConfig::default()`] and a `*_with` variant taking an explicit
/// config.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct SolverConfig {
    /// Pivots with magnitude below
    /// `EPSILON * pivot_factor * max(rows, cols) * max|a_ij|` count as zero.
    pub pivot_factor: f64,
    /// Maximum QL sweeps per eigenvalue on the symmetric path.
    pub symmetric_max_iter: usize,
    /// Maximum Francis steps per deflation is `schur_max_iter_factor * n`.
    pub schur_max_iter_factor: usize,
    /// Maximum one-sided Jacobi sweeps for the SVD.
    pub svd_max_sweeps: usize,
    /// Absolute tolerance for the structural predicates (`is_symmetric`,
    /// `is_identity`, ...).
    pub eq_tolerance: f64,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            pivot_factor: 8.0,
            symmetric_max_iter: 30,
            schur_max_iter_factor: 30,
            svd_max_sweeps: 60,
            eq_tolerance: 1e-10,
        }
    }
}

impl SolverConfig {
    pub(crate) fn eq_tol<S: Scalar>(&self) -> S {
        S::from_f64(self.eq_tolerance)
    }

    /// Rank-revealing threshold for a matrix of the given extent.
    pub(crate) fn pivot_tol<S: Scalar>(&self, dim: usize, max_abs: S) -> S {
        S::EPSILON * S::from_f64(self.pivot_factor) * S::from_usize(dim.max(1)) * max_abs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pivot_tolerance_scales_with_size_and_magnitude() {
        let cfg = SolverConfig::default();
        let small: f64 = cfg.pivot_tol(2, 1.0);
        let big: f64 = cfg.pivot_tol(8, 64.0);
        assert!(big > small);
        assert!((small - f64::EPSILON * 16.0).abs() < 1e-30);
        assert_eq!(cfg.pivot_tol::<f64>(4, 0.0), 0.0);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn partial_config_fills_defaults() {
        let cfg: SolverConfig = serde_json::from_str(r#"{ "eq_tolerance": 1e-6 }"#).unwrap();
        assert_eq!(cfg.eq_tolerance, 1e-6);
        assert_eq!(cfg.symmetric_max_iter, 30);
    }
}

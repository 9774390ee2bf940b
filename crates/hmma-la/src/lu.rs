use hmma::Scalar;
use tracing::warn;

use crate::config::SolverConfig;
use crate::dvec::DVec;
use crate::elimination::partial_pivot;
use crate::error::{MatrixError, Result};
use crate::matrix::Matrix;
use crate::storage::Layout;

/// LU decomposition with partial pivoting: PA = LU
///
/// Factorization always completes. A column whose best pivot is negligible
/// is left in place and the decomposition is flagged singular, so `l()` and
/// `u()` still reproduce `PA` while `solve` refuses to divide by zero.
#[derive(Clone, Debug)]
pub struct Lu<S> {
    /// Combined L (unit lower, implicit diagonal) and U (upper).
    lu: Matrix<S>,
    /// Row `i` of PA is row `piv[i]` of A.
    piv: Vec<usize>,
    swaps: usize,
    singular: bool,
}

impl<S: Scalar> Lu<S> {
    pub fn new<L: Layout>(a: &Matrix<S, L>) -> Result<Self> {
        Self::new_with(a, &SolverConfig::default())
    }

    pub fn new_with<L: Layout>(a: &Matrix<S, L>, config: &SolverConfig) -> Result<Self> {
        let n = a.require_square()?;
        let mut lu = a.to_dense();
        let mut piv: Vec<usize> = (0..n).collect();
        let mut swaps = 0;
        let mut singular = false;
        let tol = config.pivot_tol(n, lu.amax());

        for k in 0..n {
            let p = partial_pivot(&lu, k, k);
            if lu.at(p, k).abs() <= tol {
                // nothing to eliminate; residue below the diagonal is noise
                for v in &mut lu.column_slice_mut(k)[k + 1..] {
                    *v = S::ZERO;
                }
                singular = true;
                continue;
            }
            if p != k {
                lu.swap_rows(k, p);
                piv.swap(k, p);
                swaps += 1;
            }

            let pivot_inv = lu.at(k, k).recip();
            for v in &mut lu.column_slice_mut(k)[k + 1..] {
                *v *= pivot_inv;
            }

            for j in (k + 1)..n {
                let ukj = lu.at(k, j);
                if ukj == S::ZERO {
                    continue;
                }
                for i in (k + 1)..n {
                    let v = lu.at(i, j) - lu.at(i, k) * ukj;
                    lu.set(i, j, v);
                }
            }
        }

        Ok(Self { lu, piv, swaps, singular })
    }

    #[inline]
    pub fn is_singular(&self) -> bool { self.singular }

    /// Unit lower-triangular factor.
    pub fn l(&self) -> Matrix<S> {
        let n = self.lu.rows();
        Matrix::from_fn(n, n, |i, j| {
            if i == j {
                S::ONE
            } else if i > j {
                self.lu.at(i, j)
            } else {
                S::ZERO
            }
        })
    }

    /// Upper-triangular factor.
    pub fn u(&self) -> Matrix<S> {
        let n = self.lu.rows();
        Matrix::from_fn(n, n, |i, j| if i <= j { self.lu.at(i, j) } else { S::ZERO })
    }

    /// Row permutation P with `P * A = L * U`.
    pub fn permutation(&self) -> Matrix<S> {
        let n = self.piv.len();
        Matrix::from_fn(n, n, |i, j| if self.piv[i] == j { S::ONE } else { S::ZERO })
    }

    /// `Pᵀ * L`, so that `permuted_l() * u() = A` without a separate P.
    pub fn permuted_l(&self) -> Matrix<S> {
        let l = self.l();
        let n = l.rows();
        let mut out = Matrix::zeros(n, n);
        for (i, &src) in self.piv.iter().enumerate() {
            out.set_row(src, l.get_row(i));
        }
        out
    }

    pub fn det(&self) -> S {
        if self.singular {
            return S::ZERO;
        }
        let mut d = if self.swaps % 2 == 0 { S::ONE } else { -S::ONE };
        for i in 0..self.lu.rows() {
            d *= self.lu.at(i, i);
        }
        d
    }

    /// Solve Ax = b.
    pub fn solve(&self, b: &DVec<S>) -> Result<DVec<S>> {
        if self.singular {
            return Err(MatrixError::Singular);
        }
        let n = self.lu.rows();
        debug_assert_eq!(b.len(), n);

        let mut x = DVec::from_fn(n, |i| b[self.piv[i]]);

        // L y = Pb
        for i in 1..n {
            let mut sum = x[i];
            for j in 0..i {
                sum -= self.lu.at(i, j) * x[j];
            }
            x[i] = sum;
        }

        // U x = y
        for i in (0..n).rev() {
            let mut sum = x[i];
            for j in (i + 1)..n {
                sum -= self.lu.at(i, j) * x[j];
            }
            x[i] = sum / self.lu.at(i, i);
        }

        Ok(x)
    }

    /// Solve AX = B column by column.
    pub fn solve_mat(&self, b: &Matrix<S>) -> Result<Matrix<S>> {
        let mut out = Matrix::zeros(b.rows(), b.cols());
        for j in 0..b.cols() {
            let x = self.solve(&DVec::from_slice(b.column_slice(j)))?;
            out.column_slice_mut(j).copy_from_slice(x.as_slice());
        }
        Ok(out)
    }

    pub fn inverse(&self) -> Result<Matrix<S>> {
        self.solve_mat(&Matrix::identity(self.lu.rows()))
    }
}

impl<S: Scalar, L: Layout> Matrix<S, L> {
    /// LU decomposition as `(L, U)` with `L * U = A`. The returned `L` has
    /// the row permutation folded in, so it is lower triangular only up to
    /// a row reordering.
    pub fn lud(&self) -> Result<(Matrix<S>, Matrix<S>)> {
        let lu = Lu::new(self)?;
        if lu.is_singular() {
            warn!(n = self.rows(), "lud: matrix is singular, U has a zero pivot");
        }
        Ok((lu.permuted_l(), lu.u()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::MatExpr;
    use crate::storage::Symmetric;

    #[test]
    fn solve_mat_agrees_with_elimination() {
        let a = Matrix::from_rows(&[[2.0, 3.0, 2.0], [3.0, 2.0, 3.0], [4.0, -2.0, 2.0]]).unwrap();
        let rhs = Matrix::from_rows(&[[13.0, 1.0], [17.0, 0.0], [12.0, -1.0]]).unwrap();
        let lu = Lu::new(&a).unwrap();
        let x = lu.solve_mat(&rhs).unwrap();
        assert!(x.approx_eq(&a.solve_se(&rhs).unwrap(), 1e-12), "{x}");
        assert!((lu.det() - 10.0).abs() < 1e-12);
    }

    #[test]
    fn factors_reproduce_input() {
        let a = Matrix::from_rows(&[[1.0, 2.0, 3.0], [4.0, 5.0, 6.0], [7.0, 8.0, 10.0]]).unwrap();
        let lu = Lu::new(&a).unwrap();
        let pa = (&lu.permutation() * &a).materialize();
        let l_times_u = (&lu.l() * &lu.u()).materialize();
        assert!(pa.approx_eq(&l_times_u, 1e-12));

        let (l, u) = a.lud().unwrap();
        assert!(u.is_upper_triangular());
        assert!((&l * &u).approx_eq(&a, 1e-12), "L*U:\n{}", (&l * &u).materialize());
    }

    #[test]
    fn packed_input_inverts() {
        let s = Matrix::<f64, Symmetric>::symmetric_from_fn(3, |r, c| if r == c { 4.0 } else { 1.0 + (r + c) as f64 });
        let lu = Lu::new(&s).unwrap();
        assert!((lu.det() - s.determinant().unwrap()).abs() < 1e-10);
        let inv = lu.inverse().unwrap();
        assert!((&s * &inv).approx_eq(&Matrix::<f64>::identity(3), 1e-10));
        assert!(inv.approx_eq(&s.inverse().unwrap(), 1e-12));
    }

    #[test]
    fn singular_still_factors() {
        let a = Matrix::from_rows(&[[1.0, 2.0], [2.0, 4.0]]).unwrap();
        let lu = Lu::new(&a).unwrap();
        assert!(lu.is_singular());
        assert_eq!(lu.det(), 0.0);
        assert!(matches!(lu.solve(&DVec::zeros(2)), Err(MatrixError::Singular)));
        let (l, u) = a.lud().unwrap();
        assert!((&l * &u).approx_eq(&a, 1e-12));
    }

    #[test]
    fn rejects_non_square() {
        assert!(matches!(Matrix::<f64>::zeros(2, 3).lud(), Err(MatrixError::NotSquare { .. })));
    }
}

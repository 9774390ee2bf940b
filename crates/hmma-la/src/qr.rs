use hmma::Scalar;

use crate::dvec::DVec;
use crate::error::Result;
use crate::matrix::Matrix;
use crate::storage::Layout;

/// QR decomposition via Householder reflections: A = Q * R
///
/// Works for any shape. With `k = min(rows, cols)`, `q()` is the thin
/// `rows x k` factor and `r()` is `k x cols`.
#[derive(Clone, Debug)]
pub struct Qr<S> {
    /// Householder vectors stored below diagonal + R above.
    qr: Matrix<S>,
    /// Diagonal of R.
    r_diag: Vec<S>,
    /// Whether column k carries a reflector.
    reflected: Vec<bool>,
}

impl<S: Scalar> Qr<S> {
    pub fn new<L: Layout>(a: &Matrix<S, L>) -> Self {
        let m = a.rows();
        let n = a.cols();
        let k_max = m.min(n);
        let mut qr = a.to_dense();
        let mut r_diag = Vec::with_capacity(k_max);
        let mut reflected = Vec::with_capacity(k_max);

        for k in 0..k_max {
            // scaled by the largest entry so tiny columns neither underflow
            // nor get skipped
            let mut scale = S::ZERO;
            for i in k..m {
                scale = scale.max(qr.at(i, k).abs());
            }
            let mut norm = S::ZERO;
            if scale > S::ZERO {
                let mut norm_sq = S::ZERO;
                for i in k..m {
                    let x = qr.at(i, k) / scale;
                    norm_sq += x * x;
                }
                norm = scale * norm_sq.sqrt();
            }

            if norm > S::ZERO {
                if qr.at(k, k) > S::ZERO {
                    norm = -norm;
                }

                for i in k..m {
                    let v = qr.at(i, k) / (-norm);
                    qr.set(i, k, v);
                }
                let v = qr.at(k, k) + S::ONE;
                qr.set(k, k, v);

                for j in (k + 1)..n {
                    let mut s = S::ZERO;
                    for i in k..m {
                        s += qr.at(i, k) * qr.at(i, j);
                    }
                    s = -s / qr.at(k, k);
                    for i in k..m {
                        let v = qr.at(i, j) + s * qr.at(i, k);
                        qr.set(i, j, v);
                    }
                }
                reflected.push(true);
            } else {
                reflected.push(false);
            }

            r_diag.push(norm);
        }

        Self { qr, r_diag, reflected }
    }

    /// Upper-trapezoidal `k x cols` factor.
    pub fn r(&self) -> Matrix<S> {
        let n = self.qr.cols();
        let k = self.r_diag.len();
        Matrix::from_fn(k, n, |i, j| {
            if i == j {
                self.r_diag[i]
            } else if j > i {
                self.qr.at(i, j)
            } else {
                S::ZERO
            }
        })
    }

    /// Thin orthonormal `rows x k` factor.
    pub fn q(&self) -> Matrix<S> {
        let m = self.qr.rows();
        let k = self.r_diag.len();
        let mut q = Matrix::identity(m);

        for j in (0..k).rev() {
            if !self.reflected[j] {
                continue;
            }
            for col in j..m {
                let mut s = S::ZERO;
                for i in j..m {
                    s += self.qr.at(i, j) * q.at(i, col);
                }
                s = -s / self.qr.at(j, j);
                for i in j..m {
                    let v = q.at(i, col) + s * self.qr.at(i, j);
                    q.set(i, col, v);
                }
            }
        }

        q.submatrix(0, 0, m, k)
    }

    /// Solve least-squares: min ||Ax - b||.
    pub fn solve(&self, b: &DVec<S>) -> DVec<S> {
        let m = self.qr.rows();
        let n = self.qr.cols();
        let k_max = self.r_diag.len();
        debug_assert_eq!(b.len(), m);

        // Qᵀ b
        let mut x = b.clone();
        for k in 0..k_max {
            if !self.reflected[k] {
                continue;
            }
            let mut s = S::ZERO;
            for i in k..m {
                s += self.qr.at(i, k) * x[i];
            }
            s = -s / self.qr.at(k, k);
            for i in k..m {
                x[i] += s * self.qr.at(i, k);
            }
        }

        // R back-substitution; dependent columns get zero weight
        let tol = S::EPSILON * S::from_usize(m.max(n)) * self.r_diag.iter().fold(S::ZERO, |a, &d| a.max(d.abs()));
        let mut result = DVec::zeros(n);
        for i in (0..k_max).rev() {
            let mut sum = x[i];
            for j in (i + 1)..n {
                sum -= self.qr.at(i, j) * result[j];
            }
            result[i] = if self.r_diag[i].abs() <= tol { S::ZERO } else { sum / self.r_diag[i] };
        }

        result
    }
}

impl<S: Scalar, L: Layout> Matrix<S, L> {
    /// Householder QR as `(Q, R)` with `Q * R = A`.
    pub fn qrd(&self) -> Result<(Matrix<S>, Matrix<S>)> {
        let qr = Qr::new(self);
        Ok((qr.q(), qr.r()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::MatExpr;

    #[test]
    fn qr_identity() {
        let a = Matrix::<f64>::identity(3);
        let qr = Qr::new(&a);
        let q = qr.q();
        let r = qr.r();
        for i in 0..3 {
            assert!(q.at(i, i).abs() > 0.99, "Q diagonal should be ±1");
            assert!(r.at(i, i).abs() > 0.99, "R diagonal should be ±1");
        }
    }

    #[test]
    fn solve_overdetermined() {
        // A = [1; 1], b = [1; 3] -> least squares: x = 2
        let a = Matrix::new(2, 1, 1.0_f64);
        let b = DVec::from_slice(&[1.0, 3.0]);
        let x = Qr::new(&a).solve(&b);
        assert!((x[0] - 2.0).abs() < 1e-10);
    }

    #[test]
    fn qr_reconstruct() {
        let a = Matrix::from_fn(3, 2, |i, j| (i * 2 + j + 1) as f64);
        let (q, r) = a.qrd().unwrap();
        assert_eq!(q.shape(), (3, 2));
        assert_eq!(r.shape(), (2, 2));
        let recon = (&q * &r).materialize();
        for i in 0..3 {
            for j in 0..2 {
                assert!(
                    (recon.at(i, j) - a.at(i, j)).abs() < 1e-10,
                    "mismatch at ({}, {}): {} vs {}",
                    i,
                    j,
                    recon.at(i, j),
                    a.at(i, j)
                );
            }
        }
        let qtq = (!&q * &q).materialize();
        assert!(qtq.approx_eq(&Matrix::<f64>::identity(2), 1e-12));
    }

    #[test]
    fn tiny_scale_reconstructs() {
        for scale in [1e-17, 1e-160, 1e150] {
            let a = Matrix::from_column_major(2, 2, vec![0.0, scale, scale, 2.0 * scale]).unwrap();
            let (q, r) = a.qrd().unwrap();
            let recon = (&q * &r).materialize();
            for (got, want) in recon.as_slice().iter().zip(a.as_slice()) {
                assert!((got - want).abs() <= 1e-12 * scale, "{scale}: {got} vs {want}");
            }
        }
    }

    #[test]
    fn wide_and_zero_columns() {
        let a = Matrix::from_rows(&[[0.0, 1.0, 2.0], [0.0, 3.0, 4.0]]).unwrap();
        let (q, r) = a.qrd().unwrap();
        assert_eq!(r.shape(), (2, 3));
        assert!((&q * &r).approx_eq(&a, 1e-12));
    }
}

//! Eigenvalues and eigenvectors.
//!
//! Symmetric input takes the Householder tridiagonalization plus implicit
//! QL path and yields real eigenvalues with orthonormal eigenvectors.
//! Everything else is reduced to Hessenberg form and iterated to real Schur
//! form with Francis double-shift steps; complex eigenvalues come out as
//! conjugate pairs.

use core::cmp::Ordering;

use hmma::Scalar;
use tracing::{debug, warn};

use crate::config::SolverConfig;
use crate::dvec::DVec;
use crate::error::{MatrixError, Result};
use crate::matrix::Matrix;
use crate::storage::Layout;

/// Ordering applied to eigenvalues (by real part) and their vectors.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum EigenSort {
    /// Order produced by the iteration.
    #[default]
    None,
    Ascending,
    Descending,
}

/// Eigen decomposition `A * V = V * D`.
///
/// For a conjugate pair at positions `k`, `k + 1` (with `imaginary[k] > 0`),
/// column `k` of `vectors` holds the real part and column `k + 1` the
/// imaginary part of the eigenvector for `values[k] + i * imaginary[k]`.
#[derive(Clone, Debug)]
pub struct EigenSpace<S> {
    /// Real parts of the eigenvalues.
    pub values: DVec<S>,
    /// Imaginary parts; all zero for symmetric input.
    pub imaginary: DVec<S>,
    /// Eigenvectors as columns.
    pub vectors: Matrix<S>,
}

impl<S: Scalar> EigenSpace<S> {
    fn empty() -> Self {
        Self { values: DVec::zeros(0), imaginary: DVec::zeros(0), vectors: Matrix::zeros(0, 0) }
    }

    /// True when no eigenvalue has an imaginary part.
    pub fn is_real(&self) -> bool {
        self.imaginary.iter().all(|&x| x == S::ZERO)
    }

    /// Real and imaginary parts of eigenvector `k`.
    pub fn complex_vector(&self, k: usize) -> (DVec<S>, DVec<S>) {
        let n = self.vectors.rows();
        let col = |j: usize| DVec::from_slice(self.vectors.column_slice(j));
        let im = self.imaginary[k];
        if im > S::ZERO {
            (col(k), col(k + 1))
        } else if im < S::ZERO {
            let neg = DVec::from_fn(n, |i| -self.vectors.at(i, k));
            (col(k - 1), neg)
        } else {
            (col(k), DVec::zeros(n))
        }
    }

    /// Real block-diagonal D with `A * V = V * D`: eigenvalues on the
    /// diagonal and a 2x2 block `[re im; -im re]` per conjugate pair.
    pub fn block_diagonal(&self) -> Matrix<S> {
        let n = self.values.len();
        let mut d = Matrix::zeros(n, n);
        for i in 0..n {
            d.set(i, i, self.values[i]);
            let im = self.imaginary[i];
            if im > S::ZERO {
                d.set(i, i + 1, im);
            } else if im < S::ZERO {
                d.set(i, i - 1, im);
            }
        }
        d
    }

    /// Reorder by real part. Conjugate pairs move together.
    fn sorted(self, order: EigenSort) -> Self {
        if order == EigenSort::None {
            return self;
        }
        let n = self.values.len();
        // (key, first index, width)
        let mut units: Vec<(S, usize, usize)> = Vec::with_capacity(n);
        let mut k = 0;
        while k < n {
            let width = if self.imaginary[k] > S::ZERO && k + 1 < n { 2 } else { 1 };
            units.push((self.values[k], k, width));
            k += width;
        }
        units.sort_by(|a, b| {
            let ord = a.0.partial_cmp(&b.0).unwrap_or(Ordering::Equal);
            if order == EigenSort::Descending { ord.reverse() } else { ord }
        });
        let perm: Vec<usize> = units.iter().flat_map(|&(_, start, width)| start..start + width).collect();
        Self {
            values: self.values.permute(&perm),
            imaginary: self.imaginary.permute(&perm),
            vectors: Matrix::from_fn(n, n, |i, j| self.vectors.at(i, perm[j])),
        }
    }
}

impl<S: Scalar, L: Layout> Matrix<S, L> {
    pub fn eigen_space(&self, sort: EigenSort) -> Result<EigenSpace<S>> {
        self.eigen_space_with(sort, &SolverConfig::default())
    }

    /// Eigenvalues and eigenvectors, choosing the symmetric or the general
    /// path from the matrix contents.
    pub fn eigen_space_with(&self, sort: EigenSort, config: &SolverConfig) -> Result<EigenSpace<S>> {
        let n = self.require_square()?;
        if n == 0 {
            return Ok(EigenSpace::empty());
        }
        let tol = config.eq_tol::<S>() * S::ONE.max(self.amax());
        let space = if self.is_symmetric_within(tol) {
            debug!(n, "eigen_space: symmetric path");
            symmetric(self, config)?
        } else {
            debug!(n, "eigen_space: general path");
            general(self, config)?
        };
        Ok(space.sorted(sort))
    }
}

fn symmetric<S: Scalar, L: Layout>(a: &Matrix<S, L>, config: &SolverConfig) -> Result<EigenSpace<S>> {
    let n = a.rows();
    let mut v = a.to_dense();
    let mut d = vec![S::ZERO; n];
    let mut e = vec![S::ZERO; n];
    tred2(&mut v, &mut d, &mut e);
    tql2(&mut v, &mut d, &mut e, config.symmetric_max_iter)?;
    Ok(EigenSpace { values: DVec::from_vec(d), imaginary: DVec::zeros(n), vectors: v })
}

fn general<S: Scalar, L: Layout>(a: &Matrix<S, L>, config: &SolverConfig) -> Result<EigenSpace<S>> {
    let n = a.rows();
    let mut h = a.to_dense();
    let mut v = Matrix::identity(n);
    let mut d = vec![S::ZERO; n];
    let mut e = vec![S::ZERO; n];
    orthes(&mut h, &mut v);
    hqr2(&mut h, &mut v, &mut d, &mut e, config.schur_max_iter_factor * n.max(2))?;
    normalize_columns(&mut v, &e);
    Ok(EigenSpace { values: DVec::from_vec(d), imaginary: DVec::from_vec(e), vectors: v })
}

/// Scale real eigenvectors to unit length and complex pairs to unit
/// combined length.
fn normalize_columns<S: Scalar>(v: &mut Matrix<S>, e: &[S]) {
    let n = v.cols();
    let mut k = 0;
    while k < n {
        let width = if e[k] > S::ZERO && k + 1 < n { 2 } else { 1 };
        let mut norm_sq = S::ZERO;
        for j in k..k + width {
            for &x in v.column_slice(j) {
                norm_sq += x * x;
            }
        }
        let norm = norm_sq.sqrt();
        if norm > S::ZERO {
            for j in k..k + width {
                for x in v.column_slice_mut(j) {
                    *x /= norm;
                }
            }
        }
        k += width;
    }
}

/// Householder reduction of the symmetric matrix in `v` to tridiagonal
/// form. On return `d` is the diagonal, `e[1..]` the sub-diagonal and `v`
/// the accumulated orthogonal transformation.
fn tred2<S: Scalar>(v: &mut Matrix<S>, d: &mut [S], e: &mut [S]) {
    let n = v.rows();
    for j in 0..n {
        d[j] = v[(n - 1, j)];
    }

    for i in (1..n).rev() {
        let mut scale = S::ZERO;
        let mut h = S::ZERO;
        for k in 0..i {
            scale += d[k].abs();
        }
        if scale == S::ZERO {
            e[i] = d[i - 1];
            for j in 0..i {
                d[j] = v[(i - 1, j)];
                v[(i, j)] = S::ZERO;
                v[(j, i)] = S::ZERO;
            }
        } else {
            for k in 0..i {
                d[k] /= scale;
                h += d[k] * d[k];
            }
            let mut f = d[i - 1];
            let mut g = h.sqrt();
            if f > S::ZERO {
                g = -g;
            }
            e[i] = scale * g;
            h -= f * g;
            d[i - 1] = f - g;
            for j in 0..i {
                e[j] = S::ZERO;
            }

            for j in 0..i {
                f = d[j];
                v[(j, i)] = f;
                g = e[j] + v[(j, j)] * f;
                for k in (j + 1)..i {
                    g += v[(k, j)] * d[k];
                    e[k] += v[(k, j)] * f;
                }
                e[j] = g;
            }
            f = S::ZERO;
            for j in 0..i {
                e[j] /= h;
                f += e[j] * d[j];
            }
            let hh = f / (h + h);
            for j in 0..i {
                e[j] -= hh * d[j];
            }
            for j in 0..i {
                f = d[j];
                g = e[j];
                for k in j..i {
                    v[(k, j)] -= f * e[k] + g * d[k];
                }
                d[j] = v[(i - 1, j)];
                v[(i, j)] = S::ZERO;
            }
        }
        d[i] = h;
    }

    // accumulate transformations
    for i in 0..n - 1 {
        v[(n - 1, i)] = v[(i, i)];
        v[(i, i)] = S::ONE;
        let h = d[i + 1];
        if h != S::ZERO {
            for k in 0..=i {
                d[k] = v[(k, i + 1)] / h;
            }
            for j in 0..=i {
                let mut g = S::ZERO;
                for k in 0..=i {
                    g += v[(k, i + 1)] * v[(k, j)];
                }
                for k in 0..=i {
                    v[(k, j)] -= g * d[k];
                }
            }
        }
        for k in 0..=i {
            v[(k, i + 1)] = S::ZERO;
        }
    }
    for j in 0..n {
        d[j] = v[(n - 1, j)];
        v[(n - 1, j)] = S::ZERO;
    }
    v[(n - 1, n - 1)] = S::ONE;
    e[0] = S::ZERO;
}

/// Implicit QL iteration on the tridiagonal (`d`, `e`) produced by
/// [`tred2`], accumulating rotations into `v`.
fn tql2<S: Scalar>(v: &mut Matrix<S>, d: &mut [S], e: &mut [S], max_iter: usize) -> Result<()> {
    let n = d.len();
    for i in 1..n {
        e[i - 1] = e[i];
    }
    e[n - 1] = S::ZERO;

    let eps = S::EPSILON;
    let mut f = S::ZERO;
    let mut tst1 = S::ZERO;

    for l in 0..n {
        tst1 = tst1.max(d[l].abs() + e[l].abs());
        // e[n - 1] is zero, so this stops by n - 1
        let mut m = l;
        while m < n - 1 && e[m].abs() > eps * tst1 {
            m += 1;
        }

        if m > l {
            let mut iter = 0;
            loop {
                iter += 1;
                if iter > max_iter {
                    warn!(n, index = l, max_iter, "eigen_space: QL iteration did not converge");
                    return Err(MatrixError::not_solvable("symmetric eigenvalue iteration did not converge"));
                }

                // implicit shift
                let mut g = d[l];
                let mut p = (d[l + 1] - g) / (S::TWO * e[l]);
                let mut r = p.hypot(S::ONE);
                if p < S::ZERO {
                    r = -r;
                }
                d[l] = e[l] / (p + r);
                d[l + 1] = e[l] * (p + r);
                let dl1 = d[l + 1];
                let mut h = g - d[l];
                for di in d.iter_mut().skip(l + 2) {
                    *di -= h;
                }
                f += h;

                p = d[m];
                let mut c = S::ONE;
                let mut c2 = c;
                let mut c3 = c;
                let el1 = e[l + 1];
                let mut s = S::ZERO;
                let mut s2 = S::ZERO;
                for i in (l..m).rev() {
                    c3 = c2;
                    c2 = c;
                    s2 = s;
                    g = c * e[i];
                    h = c * p;
                    r = p.hypot(e[i]);
                    e[i + 1] = s * r;
                    s = e[i] / r;
                    c = p / r;
                    p = c * d[i] - s * g;
                    d[i + 1] = h + s * (c * g + s * d[i]);

                    for k in 0..n {
                        h = v[(k, i + 1)];
                        v[(k, i + 1)] = s * v[(k, i)] + c * h;
                        v[(k, i)] = c * v[(k, i)] - s * h;
                    }
                }
                p = -s * s2 * c3 * el1 * e[l] / dl1;
                e[l] = s * p;
                d[l] = c * p;

                if e[l].abs() <= eps * tst1 {
                    break;
                }
            }
            debug!(index = l, iter, "eigen_space: QL converged");
        }
        d[l] += f;
        e[l] = S::ZERO;
    }
    Ok(())
}

/// Orthogonal reduction of `h` to upper Hessenberg form, accumulating the
/// transformation into `v` (which must start as the identity).
fn orthes<S: Scalar>(h: &mut Matrix<S>, v: &mut Matrix<S>) {
    let n = h.rows();
    let high = n - 1;
    let mut ort = vec![S::ZERO; n];

    for m in 1..high {
        let mut scale = S::ZERO;
        for i in m..=high {
            scale += h[(i, m - 1)].abs();
        }
        if scale == S::ZERO {
            continue;
        }

        let mut hh = S::ZERO;
        for i in (m..=high).rev() {
            ort[i] = h[(i, m - 1)] / scale;
            hh += ort[i] * ort[i];
        }
        let mut g = hh.sqrt();
        if ort[m] > S::ZERO {
            g = -g;
        }
        hh -= ort[m] * g;
        ort[m] -= g;

        // H = (I - u uᵀ / h) H (I - u uᵀ / h)
        for j in m..n {
            let mut f = S::ZERO;
            for i in (m..=high).rev() {
                f += ort[i] * h[(i, j)];
            }
            f /= hh;
            for i in m..=high {
                h[(i, j)] -= f * ort[i];
            }
        }
        for i in 0..=high {
            let mut f = S::ZERO;
            for j in (m..=high).rev() {
                f += ort[j] * h[(i, j)];
            }
            f /= hh;
            for j in m..=high {
                h[(i, j)] -= f * ort[j];
            }
        }
        ort[m] *= scale;
        h[(m, m - 1)] = scale * g;
    }

    for m in (1..high).rev() {
        if h[(m, m - 1)] == S::ZERO {
            continue;
        }
        for i in (m + 1)..=high {
            ort[i] = h[(i, m - 1)];
        }
        for j in m..=high {
            let mut g = S::ZERO;
            for i in m..=high {
                g += ort[i] * v[(i, j)];
            }
            // double division avoids possible underflow
            g = (g / ort[m]) / h[(m, m - 1)];
            for i in m..=high {
                v[(i, j)] += g * ort[i];
            }
        }
    }
}

/// Complex division `(xr + i xi) / (yr + i yi)`.
fn cdiv<S: Scalar>(xr: S, xi: S, yr: S, yi: S) -> (S, S) {
    if yr.abs() > yi.abs() {
        let r = yi / yr;
        let d = yr + r * yi;
        ((xr + r * xi) / d, (xi - r * xr) / d)
    } else {
        let r = yr / yi;
        let d = yi + r * yr;
        ((r * xr + xi) / d, (r * xi - xr) / d)
    }
}

/// Reduce the Hessenberg matrix `h` to real Schur form, writing eigenvalues
/// to (`d`, `e`) and back-substituting eigenvectors into `v`.
#[allow(unused_assignments)]
fn hqr2<S: Scalar>(h: &mut Matrix<S>, v: &mut Matrix<S>, d: &mut [S], e: &mut [S], max_iter: usize) -> Result<()> {
    let nn = h.rows();
    let low = 0;
    let high = nn - 1;
    let eps = S::EPSILON;
    let mut exshift = S::ZERO;
    let (mut p, mut q, mut r, mut s, mut z) = (S::ZERO, S::ZERO, S::ZERO, S::ZERO, S::ZERO);
    let (mut t, mut w, mut x, mut y) = (S::ZERO, S::ZERO, S::ZERO, S::ZERO);

    let mut norm = S::ZERO;
    for i in 0..nn {
        for j in i.saturating_sub(1)..nn {
            norm += h[(i, j)].abs();
        }
    }

    // outer loop over eigenvalue index
    let mut top = nn as isize - 1;
    let mut iter = 0;
    while top >= low as isize {
        let n = top as usize;

        // look for single small sub-diagonal element
        let mut l = n;
        while l > low {
            s = h[(l - 1, l - 1)].abs() + h[(l, l)].abs();
            if s == S::ZERO {
                s = norm;
            }
            if h[(l, l - 1)].abs() < eps * s {
                break;
            }
            l -= 1;
        }

        if l == n {
            // one root found
            h[(n, n)] = h[(n, n)] + exshift;
            d[n] = h[(n, n)];
            e[n] = S::ZERO;
            top -= 1;
            iter = 0;
        } else if l + 1 == n {
            // two roots found
            w = h[(n, n - 1)] * h[(n - 1, n)];
            p = (h[(n - 1, n - 1)] - h[(n, n)]) * S::HALF;
            q = p * p + w;
            z = q.abs().sqrt();
            h[(n, n)] = h[(n, n)] + exshift;
            h[(n - 1, n - 1)] = h[(n - 1, n - 1)] + exshift;
            x = h[(n, n)];

            if q >= S::ZERO {
                // real pair
                z = if p >= S::ZERO { p + z } else { p - z };
                d[n - 1] = x + z;
                d[n] = d[n - 1];
                if z != S::ZERO {
                    d[n] = x - w / z;
                }
                e[n - 1] = S::ZERO;
                e[n] = S::ZERO;
                x = h[(n, n - 1)];
                s = x.abs() + z.abs();
                p = x / s;
                q = z / s;
                r = (p * p + q * q).sqrt();
                p /= r;
                q /= r;

                // row modification
                for j in (n - 1)..nn {
                    z = h[(n - 1, j)];
                    h[(n - 1, j)] = q * z + p * h[(n, j)];
                    h[(n, j)] = q * h[(n, j)] - p * z;
                }
                // column modification
                for i in 0..=n {
                    z = h[(i, n - 1)];
                    h[(i, n - 1)] = q * z + p * h[(i, n)];
                    h[(i, n)] = q * h[(i, n)] - p * z;
                }
                // accumulate transformations
                for i in low..=high {
                    z = v[(i, n - 1)];
                    v[(i, n - 1)] = q * z + p * v[(i, n)];
                    v[(i, n)] = q * v[(i, n)] - p * z;
                }
            } else {
                // complex pair
                d[n - 1] = x + p;
                d[n] = x + p;
                e[n - 1] = z;
                e[n] = -z;
            }
            top -= 2;
            iter = 0;
        } else {
            // no convergence yet; form shift
            x = h[(n, n)];
            y = S::ZERO;
            w = S::ZERO;
            if l < n {
                y = h[(n - 1, n - 1)];
                w = h[(n, n - 1)] * h[(n - 1, n)];
            }

            // exceptional shifts
            if iter == 10 {
                exshift += x;
                for i in low..=n {
                    h[(i, i)] = h[(i, i)] - x;
                }
                s = h[(n, n - 1)].abs() + h[(n - 1, n - 2)].abs();
                x = S::from_f64(0.75) * s;
                y = x;
                w = S::from_f64(-0.4375) * s * s;
            }
            if iter == 30 {
                s = (y - x) * S::HALF;
                s = s * s + w;
                if s > S::ZERO {
                    s = s.sqrt();
                    if y < x {
                        s = -s;
                    }
                    s = x - w / ((y - x) * S::HALF + s);
                    for i in low..=n {
                        h[(i, i)] = h[(i, i)] - s;
                    }
                    exshift += s;
                    x = S::from_f64(0.964);
                    y = x;
                    w = x;
                }
            }

            iter += 1;
            if iter > max_iter {
                warn!(n = nn, index = n, max_iter, "eigen_space: Schur iteration did not converge");
                return Err(MatrixError::not_solvable("general eigenvalue iteration did not converge"));
            }

            // look for two consecutive small sub-diagonal elements
            let mut m = n - 2;
            loop {
                z = h[(m, m)];
                r = x - z;
                s = y - z;
                p = (r * s - w) / h[(m + 1, m)] + h[(m, m + 1)];
                q = h[(m + 1, m + 1)] - z - r - s;
                r = h[(m + 2, m + 1)];
                s = p.abs() + q.abs() + r.abs();
                p /= s;
                q /= s;
                r /= s;
                if m == l {
                    break;
                }
                let lhs = h[(m, m - 1)].abs() * (q.abs() + r.abs());
                let rhs = eps * (p.abs() * (h[(m - 1, m - 1)].abs() + z.abs() + h[(m + 1, m + 1)].abs()));
                if lhs < rhs {
                    break;
                }
                m -= 1;
            }

            for i in (m + 2)..=n {
                h[(i, i - 2)] = S::ZERO;
                if i > m + 2 {
                    h[(i, i - 3)] = S::ZERO;
                }
            }

            // double QR step on rows l..=n and columns m..=n
            for k in m..n {
                let notlast = k + 1 != n;
                if k != m {
                    p = h[(k, k - 1)];
                    q = h[(k + 1, k - 1)];
                    r = if notlast { h[(k + 2, k - 1)] } else { S::ZERO };
                    x = p.abs() + q.abs() + r.abs();
                    if x == S::ZERO {
                        continue;
                    }
                    p /= x;
                    q /= x;
                    r /= x;
                }

                s = (p * p + q * q + r * r).sqrt();
                if p < S::ZERO {
                    s = -s;
                }
                if s == S::ZERO {
                    continue;
                }
                if k != m {
                    h[(k, k - 1)] = -s * x;
                } else if l != m {
                    h[(k, k - 1)] = -h[(k, k - 1)];
                }
                p += s;
                x = p / s;
                y = q / s;
                z = r / s;
                q /= p;
                r /= p;

                // row modification
                for j in k..nn {
                    p = h[(k, j)] + q * h[(k + 1, j)];
                    if notlast {
                        p += r * h[(k + 2, j)];
                        h[(k + 2, j)] = h[(k + 2, j)] - p * z;
                    }
                    h[(k, j)] = h[(k, j)] - p * x;
                    h[(k + 1, j)] = h[(k + 1, j)] - p * y;
                }
                // column modification
                for i in 0..=n.min(k + 3) {
                    p = x * h[(i, k)] + y * h[(i, k + 1)];
                    if notlast {
                        p += z * h[(i, k + 2)];
                        h[(i, k + 2)] = h[(i, k + 2)] - p * r;
                    }
                    h[(i, k)] = h[(i, k)] - p;
                    h[(i, k + 1)] = h[(i, k + 1)] - p * q;
                }
                // accumulate transformations
                for i in low..=high {
                    p = x * v[(i, k)] + y * v[(i, k + 1)];
                    if notlast {
                        p += z * v[(i, k + 2)];
                        v[(i, k + 2)] = v[(i, k + 2)] - p * r;
                    }
                    v[(i, k)] = v[(i, k)] - p;
                    v[(i, k + 1)] = v[(i, k + 1)] - p * q;
                }
            }
        }
    }

    // back-substitute to find vectors of upper triangular form
    if norm == S::ZERO {
        return Ok(());
    }

    for n in (0..nn).rev() {
        p = d[n];
        q = e[n];

        if q == S::ZERO {
            // real vector
            let mut l = n;
            h[(n, n)] = S::ONE;
            for i in (0..n).rev() {
                w = h[(i, i)] - p;
                r = S::ZERO;
                for j in l..=n {
                    r += h[(i, j)] * h[(j, n)];
                }
                if e[i] < S::ZERO {
                    z = w;
                    s = r;
                    continue;
                }
                l = i;
                if e[i] == S::ZERO {
                    h[(i, n)] = if w != S::ZERO { -r / w } else { -r / (eps * norm) };
                } else {
                    // solve real equations
                    x = h[(i, i + 1)];
                    y = h[(i + 1, i)];
                    q = (d[i] - p) * (d[i] - p) + e[i] * e[i];
                    t = (x * s - z * r) / q;
                    h[(i, n)] = t;
                    h[(i + 1, n)] = if x.abs() > z.abs() { (-r - w * t) / x } else { (-s - y * t) / z };
                }

                // overflow control
                t = h[(i, n)].abs();
                if (eps * t) * t > S::ONE {
                    for j in i..=n {
                        h[(j, n)] = h[(j, n)] / t;
                    }
                }
            }
        } else if q < S::ZERO {
            // complex vector; last component imaginary so matrix is triangular
            let mut l = n - 1;
            if h[(n, n - 1)].abs() > h[(n - 1, n)].abs() {
                h[(n - 1, n - 1)] = q / h[(n, n - 1)];
                h[(n - 1, n)] = -(h[(n, n)] - p) / h[(n, n - 1)];
            } else {
                let (cr, ci) = cdiv(S::ZERO, -h[(n - 1, n)], h[(n - 1, n - 1)] - p, q);
                h[(n - 1, n - 1)] = cr;
                h[(n - 1, n)] = ci;
            }
            h[(n, n - 1)] = S::ZERO;
            h[(n, n)] = S::ONE;

            for i in (0..n - 1).rev() {
                let mut ra = S::ZERO;
                let mut sa = S::ZERO;
                for j in l..=n {
                    ra += h[(i, j)] * h[(j, n - 1)];
                    sa += h[(i, j)] * h[(j, n)];
                }
                w = h[(i, i)] - p;

                if e[i] < S::ZERO {
                    z = w;
                    r = ra;
                    s = sa;
                    continue;
                }
                l = i;
                if e[i] == S::ZERO {
                    let (cr, ci) = cdiv(-ra, -sa, w, q);
                    h[(i, n - 1)] = cr;
                    h[(i, n)] = ci;
                } else {
                    // solve complex equations
                    x = h[(i, i + 1)];
                    y = h[(i + 1, i)];
                    let mut vr = (d[i] - p) * (d[i] - p) + e[i] * e[i] - q * q;
                    let vi = (d[i] - p) * S::TWO * q;
                    if vr == S::ZERO && vi == S::ZERO {
                        vr = eps * norm * (w.abs() + q.abs() + x.abs() + y.abs() + z.abs());
                    }
                    let (cr, ci) = cdiv(x * r - z * ra + q * sa, x * s - z * sa - q * ra, vr, vi);
                    h[(i, n - 1)] = cr;
                    h[(i, n)] = ci;
                    if x.abs() > z.abs() + q.abs() {
                        h[(i + 1, n - 1)] = (-ra - w * h[(i, n - 1)] + q * h[(i, n)]) / x;
                        h[(i + 1, n)] = (-sa - w * h[(i, n)] - q * h[(i, n - 1)]) / x;
                    } else {
                        let (cr, ci) = cdiv(-r - y * h[(i, n - 1)], -s - y * h[(i, n)], z, q);
                        h[(i + 1, n - 1)] = cr;
                        h[(i + 1, n)] = ci;
                    }
                }

                // overflow control
                t = h[(i, n - 1)].abs().max(h[(i, n)].abs());
                if (eps * t) * t > S::ONE {
                    for j in i..=n {
                        h[(j, n - 1)] = h[(j, n - 1)] / t;
                        h[(j, n)] = h[(j, n)] / t;
                    }
                }
            }
        }
    }

    // back transformation to eigenvectors of the original matrix
    for j in (low..nn).rev() {
        for i in low..=high {
            z = S::ZERO;
            for k in low..=j.min(high) {
                z += v[(i, k)] * h[(k, j)];
            }
            v[(i, j)] = z;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::MatExpr;
    use crate::storage::Symmetric;

    /// ‖A V - V D‖ small relative to ‖A‖.
    fn assert_decomposes<L: Layout>(a: &Matrix<f64, L>, space: &EigenSpace<f64>, tol: f64) {
        let d = space.block_diagonal();
        let av = (a * &space.vectors).materialize();
        let vd = (&space.vectors * &d).materialize();
        let scale = a.amax().max(1.0);
        assert!(av.approx_eq(&vd, tol * scale), "A*V != V*D\nAV:\n{av}VD:\n{vd}");
    }

    #[test]
    fn diagonal_matrix() {
        let a = Matrix::from_diagonal(&[3.0, 1.0, 2.0]);
        let space = a.eigen_space(EigenSort::Ascending).unwrap();
        assert_eq!(space.values.as_slice(), &[1.0, 2.0, 3.0]);
        assert!(space.is_real());
    }

    #[test]
    fn symmetric_2x2() {
        let a = Matrix::from_rows(&[[2.0, 1.0], [1.0, 2.0]]).unwrap();
        let space = a.eigen_space(EigenSort::Ascending).unwrap();
        assert!((space.values[0] - 1.0).abs() < 1e-12);
        assert!((space.values[1] - 3.0).abs() < 1e-12);
        assert_decomposes(&a, &space, 1e-12);
    }

    #[test]
    fn symmetric_vectors_are_orthonormal() {
        let a = Matrix::<f64, Symmetric>::symmetric_from_fn(6, |r, c| 1.0 / (r + c + 1) as f64);
        let space = a.eigen_space(EigenSort::Descending).unwrap();
        let vtv = (!&space.vectors * &space.vectors).materialize();
        assert!(vtv.approx_eq(&Matrix::<f64>::identity(6), 1e-12));
        assert_decomposes(&a, &space, 1e-12);
        for k in 1..6 {
            assert!(space.values[k - 1] >= space.values[k]);
        }
    }

    #[test]
    fn rotation_has_conjugate_pair() {
        let a = Matrix::from_rows(&[[0.0, -1.0], [1.0, 0.0]]).unwrap();
        let space = a.eigen_space(EigenSort::None).unwrap();
        assert!(!space.is_real());
        assert!(space.values[0].abs() < 1e-12 && space.values[1].abs() < 1e-12);
        assert!((space.imaginary[0].abs() - 1.0).abs() < 1e-12);
        assert_eq!(space.imaginary[0], -space.imaginary[1]);
        assert_decomposes(&a, &space, 1e-12);
    }

    #[test]
    fn complex_vector_satisfies_eigen_equation() {
        let a = Matrix::from_rows(&[[1.0, 2.0, 0.0], [-2.0, 1.0, 0.0], [0.0, 0.0, 3.0]]).unwrap();
        let space = a.eigen_space(EigenSort::Descending).unwrap();
        assert_decomposes(&a, &space, 1e-10);
        assert!((space.values[0] - 3.0).abs() < 1e-10);
        let k = (0..3).find(|&k| space.imaginary[k] > 0.0).unwrap();
        let (re, im) = space.complex_vector(k);
        let (lr, li) = (space.values[k], space.imaginary[k]);
        for i in 0..3 {
            let mut ar = 0.0;
            let mut ai = 0.0;
            for j in 0..3 {
                ar += a.at(i, j) * re[j];
                ai += a.at(i, j) * im[j];
            }
            assert!((ar - (lr * re[i] - li * im[i])).abs() < 1e-10);
            assert!((ai - (lr * im[i] + li * re[i])).abs() < 1e-10);
        }
    }

    #[test]
    fn non_symmetric_real_spectrum() {
        let a = Matrix::from_fn(5, 5, |r, c| (r * 5 + c + 1) as f64);
        let space = a.eigen_space(EigenSort::Descending).unwrap();
        assert!(space.is_real());
        assert_decomposes(&a, &space, 1e-9);
        let trace: f64 = space.values.iter().sum();
        assert!((trace - 65.0).abs() < 1e-9);
    }

    #[test]
    fn rejects_non_square() {
        assert!(matches!(
            Matrix::<f64>::zeros(2, 3).eigen_space(EigenSort::None),
            Err(MatrixError::NotSquare { .. })
        ));
    }

    #[test]
    fn iteration_budget_is_enforced() {
        let a = Matrix::from_fn(6, 6, |r, c| ((r * 7 + c * 3) % 11) as f64 - 5.0);
        let cfg = SolverConfig { schur_max_iter_factor: 0, ..SolverConfig::default() };
        assert!(matches!(a.eigen_space_with(EigenSort::None, &cfg), Err(MatrixError::NotSolvable(_))));
    }
}

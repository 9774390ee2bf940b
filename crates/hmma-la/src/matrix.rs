use core::fmt;
use core::ops::{Index, IndexMut};
use std::io;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use hmma::Scalar;

use crate::config::SolverConfig;
use crate::dvec::DVec;
use crate::error::{MatrixError, Result};
use crate::storage::{Axis, Dense, Layout, Storage, Symmetric};
use crate::view::Line;

/// A rows x cols matrix over a [`Layout`].
///
/// `Matrix<S>` is dense and column-major. `Matrix<S, Symmetric>` packs the
/// upper triangle and rejects non-square shapes. Algorithms accept either
/// layout and return dense results.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Matrix<S, L = Dense> {
    store: Storage<S, L>,
}

/// Dense column-major matrix.
pub type DMatrix<S = f64> = Matrix<S, Dense>;

/// Packed symmetric matrix.
pub type SMatrix<S = f64> = Matrix<S, Symmetric>;

impl<S: Scalar, L: Layout> Matrix<S, L> {
    /// `rows x cols` matrix with every element set to `fill`.
    pub fn try_new(rows: usize, cols: usize, fill: S) -> Result<Self> {
        Ok(Self { store: Storage::new(rows, cols, fill)? })
    }

    /// Build element-wise. For packed layouts `f` is only asked for `row <= col`.
    pub fn try_from_fn(rows: usize, cols: usize, f: impl Fn(usize, usize) -> S) -> Result<Self> {
        let mut m = Self::try_new(rows, cols, S::ZERO)?;
        for c in 0..cols {
            let last = if L::SYMMETRIC { c + 1 } else { rows };
            for r in 0..last {
                *m.store.at_mut(r, c) = f(r, c);
            }
        }
        Ok(m)
    }

    /// The 0x0 matrix.
    pub fn empty() -> Self {
        Self { store: Storage::empty() }
    }

    #[inline]
    pub fn rows(&self) -> usize { self.store.rows() }

    #[inline]
    pub fn cols(&self) -> usize { self.store.cols() }

    #[inline]
    pub fn shape(&self) -> (usize, usize) { (self.rows(), self.cols()) }

    #[inline]
    pub fn is_square(&self) -> bool { self.rows() == self.cols() }

    #[inline]
    pub fn is_empty(&self) -> bool { self.store.is_empty() }

    #[inline]
    pub fn storage(&self) -> &Storage<S, L> { &self.store }

    /// Element (row, col). Indices are unchecked in release builds.
    #[inline]
    pub fn at(&self, row: usize, col: usize) -> S { self.store.at(row, col) }

    #[inline]
    pub fn at_mut(&mut self, row: usize, col: usize) -> &mut S { self.store.at_mut(row, col) }

    #[inline]
    pub fn set(&mut self, row: usize, col: usize, value: S) {
        *self.store.at_mut(row, col) = value;
    }

    /// Reshape keeping the overlapping top-left block; new cells get `fill`.
    pub fn resize(&mut self, rows: usize, cols: usize, fill: S) -> Result<()> {
        self.store.resize(rows, cols, fill)
    }

    pub fn clear(&mut self) {
        self.store.clear();
    }

    pub fn swap(&mut self, other: &mut Self) {
        self.store.swap(&mut other.store);
    }

    pub fn get_row(&self, row: usize) -> Line<'_, S> {
        self.store.line(Axis::Row, row)
    }

    pub fn get_column(&self, col: usize) -> Line<'_, S> {
        self.store.line(Axis::Column, col)
    }

    pub fn iter_rows(&self) -> impl Iterator<Item = Line<'_, S>> + '_ {
        (0..self.rows()).map(move |r| self.get_row(r))
    }

    pub fn iter_cols(&self) -> impl Iterator<Item = Line<'_, S>> + '_ {
        (0..self.cols()).map(move |c| self.get_column(c))
    }

    /// Overwrite a row. `data` must yield at least `cols()` values.
    pub fn set_row(&mut self, row: usize, data: impl IntoIterator<Item = S>) {
        let cols = self.cols();
        let mut n = 0;
        for (c, v) in data.into_iter().take(cols).enumerate() {
            self.set(row, c, v);
            n += 1;
        }
        debug_assert_eq!(n, cols, "set_row: short input");
    }

    /// Overwrite a column. `data` must yield at least `rows()` values.
    pub fn set_column(&mut self, col: usize, data: impl IntoIterator<Item = S>) {
        let rows = self.rows();
        let mut n = 0;
        for (r, v) in data.into_iter().take(rows).enumerate() {
            self.set(r, col, v);
            n += 1;
        }
        debug_assert_eq!(n, rows, "set_column: short input");
    }

    /// `self[row][c] = op(self[row][c], data[c])` for every column.
    pub fn row_operation(&mut self, row: usize, data: impl IntoIterator<Item = S>, op: impl Fn(S, S) -> S) {
        let cols = self.cols();
        for (c, v) in data.into_iter().take(cols).enumerate() {
            let cell = self.at_mut(row, c);
            *cell = op(*cell, v);
        }
    }

    /// `self[r][col] = op(self[r][col], data[r])` for every row.
    pub fn column_operation(&mut self, col: usize, data: impl IntoIterator<Item = S>, op: impl Fn(S, S) -> S) {
        let rows = self.rows();
        for (r, v) in data.into_iter().take(rows).enumerate() {
            let cell = self.at_mut(r, col);
            *cell = op(*cell, v);
        }
    }

    pub fn scale_row(&mut self, row: usize, factor: S, op: impl Fn(S, S) -> S) {
        for c in 0..self.cols() {
            let cell = self.at_mut(row, c);
            *cell = op(*cell, factor);
        }
    }

    pub fn scale_column(&mut self, col: usize, factor: S, op: impl Fn(S, S) -> S) {
        for r in 0..self.rows() {
            let cell = self.at_mut(r, col);
            *cell = op(*cell, factor);
        }
    }

    /// Apply `op(element, factor)` to every stored element.
    pub fn scale(&mut self, factor: S, op: impl Fn(S, S) -> S) {
        for x in self.store.as_mut_slice() {
            *x = op(*x, factor);
        }
    }

    /// Copy into a dense matrix.
    pub fn to_dense(&self) -> Matrix<S> {
        Matrix::from_fn(self.rows(), self.cols(), |r, c| self.at(r, c))
    }

    /// Transpose in place. A no-op for packed symmetric storage.
    pub fn transpose(&mut self) {
        if L::SYMMETRIC {
            return;
        }
        let Ok(t) = Self::try_from_fn(self.cols(), self.rows(), |r, c| self.at(c, r)) else {
            return;
        };
        *self = t;
    }

    /// Overwrite with the identity. Fails on non-square shapes.
    pub fn set_identity(&mut self) -> Result<()> {
        if !self.is_square() {
            return Err(MatrixError::not_square(self.rows(), self.cols()));
        }
        for c in 0..self.cols() {
            for r in 0..self.rows() {
                self.set(r, c, if r == c { S::ONE } else { S::ZERO });
            }
        }
        Ok(())
    }

    pub fn trace(&self) -> Result<S> {
        if !self.is_square() {
            return Err(MatrixError::not_square(self.rows(), self.cols()));
        }
        let mut s = S::ZERO;
        for i in 0..self.rows() {
            s += self.at(i, i);
        }
        Ok(s)
    }

    pub fn diagonal(&self) -> DVec<S> {
        DVec::from_fn(self.rows().min(self.cols()), |i| self.at(i, i))
    }

    /// Largest absolute element.
    pub fn amax(&self) -> S {
        let mut m = S::ZERO;
        for &x in self.store.as_slice() {
            m = m.max(x.abs());
        }
        m
    }

    /// Write the matrix row by row, elements separated by one space and
    /// each row terminated by `\n`.
    pub fn dump<W: io::Write>(&self, out: &mut W) -> io::Result<()> {
        write!(out, "{self}")
    }

    fn all_cells(&self, pred: impl Fn(usize, usize, S) -> bool) -> bool {
        (0..self.cols()).all(|c| (0..self.rows()).all(|r| pred(r, c, self.at(r, c))))
    }

    pub fn is_diagonal(&self) -> bool {
        let tol: S = SolverConfig::default().eq_tol();
        self.is_square() && self.all_cells(|r, c, v| r == c || v.abs() <= tol)
    }

    /// Diagonal with one repeated, non-zero diagonal value.
    pub fn is_scalar(&self) -> bool {
        let tol: S = SolverConfig::default().eq_tol();
        if !self.is_diagonal() || self.is_empty() {
            return false;
        }
        let d = self.at(0, 0);
        d.abs() > tol && (1..self.rows()).all(|i| (self.at(i, i) - d).abs() <= tol)
    }

    pub fn is_identity(&self) -> bool {
        let tol: S = SolverConfig::default().eq_tol();
        self.is_square()
            && self.all_cells(|r, c, v| {
                let want = if r == c { S::ONE } else { S::ZERO };
                (v - want).abs() <= tol
            })
    }

    pub fn is_null(&self) -> bool {
        let tol: S = SolverConfig::default().eq_tol();
        self.store.as_slice().iter().all(|v| v.abs() <= tol)
    }

    pub fn is_symmetric(&self) -> bool {
        self.is_symmetric_within(SolverConfig::default().eq_tol())
    }

    pub(crate) fn is_symmetric_within(&self, tol: S) -> bool {
        if L::SYMMETRIC {
            return true;
        }
        self.is_square() && self.all_cells(|r, c, v| r <= c || (v - self.at(c, r)).abs() <= tol)
    }

    pub fn is_skew_symmetric(&self) -> bool {
        let tol: S = SolverConfig::default().eq_tol();
        self.is_square() && self.all_cells(|r, c, v| (v + self.at(c, r)).abs() <= tol)
    }

    pub fn is_upper_triangular(&self) -> bool {
        let tol: S = SolverConfig::default().eq_tol();
        self.is_square() && self.all_cells(|r, c, v| r <= c || v.abs() <= tol)
    }

    pub fn is_lower_triangular(&self) -> bool {
        let tol: S = SolverConfig::default().eq_tol();
        self.is_square() && self.all_cells(|r, c, v| r >= c || v.abs() <= tol)
    }
}

impl<S: Scalar> Matrix<S, Dense> {
    pub fn new(rows: usize, cols: usize, fill: S) -> Self {
        Self { store: Storage::dense(rows, cols, fill) }
    }

    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self::new(rows, cols, S::ZERO)
    }

    pub fn identity(n: usize) -> Self {
        Self::from_fn(n, n, |i, j| if i == j { S::ONE } else { S::ZERO })
    }

    /// Build from `f(row, col)`, evaluated in column-major order.
    pub fn from_fn(rows: usize, cols: usize, f: impl Fn(usize, usize) -> S) -> Self {
        let mut data = Vec::with_capacity(rows * cols);
        for c in 0..cols {
            for r in 0..rows {
                data.push(f(r, c));
            }
        }
        Self { store: Storage::dense_from_vec(rows, cols, data) }
    }

    /// Wrap an existing column-major buffer.
    pub fn from_column_major(rows: usize, cols: usize, data: Vec<S>) -> Result<Self> {
        Ok(Self { store: Storage::from_column_major(rows, cols, data)? })
    }

    /// Build from row-major `values`; `values.len()` must equal `rows * cols`.
    pub fn from_row_major(rows: usize, cols: usize, values: &[S]) -> Result<Self> {
        if rows.checked_mul(cols) != Some(values.len()) {
            return Err(MatrixError::Format(format!("{rows}x{cols} does not match {} elements", values.len())));
        }
        Ok(Self::from_fn(rows, cols, |r, c| values[r * cols + c]))
    }

    /// Build from a slice of equally long rows.
    pub fn from_rows<R: AsRef<[S]>>(rows: &[R]) -> Result<Self> {
        let cols = rows.first().map_or(0, |r| r.as_ref().len());
        if let Some(bad) = rows.iter().find(|r| r.as_ref().len() != cols) {
            return Err(MatrixError::Shape { expected: (rows.len(), cols), got: (rows.len(), bad.as_ref().len()) });
        }
        Ok(Self::from_fn(rows.len(), cols, |r, c| rows[r].as_ref()[c]))
    }

    pub fn from_diagonal(diag: &[S]) -> Self {
        let n = diag.len();
        Self::from_fn(n, n, |i, j| if i == j { diag[i] } else { S::ZERO })
    }

    /// Raw column-major data.
    #[inline]
    pub fn as_slice(&self) -> &[S] { self.store.as_slice() }

    #[inline]
    pub fn column_slice(&self, col: usize) -> &[S] { self.store.column_slice(col) }

    #[inline]
    pub fn column_slice_mut(&mut self, col: usize) -> &mut [S] { self.store.column_slice_mut(col) }

    pub fn swap_rows(&mut self, a: usize, b: usize) {
        if a == b {
            return;
        }
        let rows = self.rows();
        let data = self.store.as_mut_slice();
        for c in 0..data.len() / rows.max(1) {
            data.swap(c * rows + a, c * rows + b);
        }
    }

    pub fn swap_columns(&mut self, a: usize, b: usize) {
        if a == b {
            return;
        }
        for r in 0..self.rows() {
            let va = self.at(r, a);
            let vb = self.at(r, b);
            self.set(r, a, vb);
            self.set(r, b, va);
        }
    }

    /// Copy of the block starting at (row, col).
    pub fn submatrix(&self, row: usize, col: usize, rows: usize, cols: usize) -> Self {
        Self::from_fn(rows, cols, |i, j| self.at(row + i, col + j))
    }
}

impl<S: Scalar> Matrix<S, Symmetric> {
    /// `n x n` packed symmetric matrix filled with `fill`.
    pub fn symmetric(n: usize, fill: S) -> Self {
        Self { store: Storage::symmetric(n, fill) }
    }

    /// Build from `f(row, col)`, asked only for `row <= col`.
    pub fn symmetric_from_fn(n: usize, f: impl Fn(usize, usize) -> S) -> Self {
        let mut m = Self::symmetric(n, S::ZERO);
        for c in 0..n {
            for r in 0..=c {
                m.set(r, c, f(r, c));
            }
        }
        m
    }
}

impl<S: Scalar> Default for Matrix<S, Dense> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<S: Scalar, L: Layout> Index<(usize, usize)> for Matrix<S, L> {
    type Output = S;
    #[inline]
    fn index(&self, (row, col): (usize, usize)) -> &S {
        self.store.at_ref(row, col)
    }
}

impl<S: Scalar, L: Layout> IndexMut<(usize, usize)> for Matrix<S, L> {
    #[inline]
    fn index_mut(&mut self, (row, col): (usize, usize)) -> &mut S {
        self.store.at_mut(row, col)
    }
}

impl<S: Scalar, L: Layout> fmt::Display for Matrix<S, L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for row in self.iter_rows() {
            let mut first = true;
            for v in row {
                if !first {
                    f.write_str(" ")?;
                }
                write!(f, "{v}")?;
                first = false;
            }
            f.write_str("\n")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counting(rows: usize, cols: usize) -> Matrix<f64> {
        Matrix::from_fn(rows, cols, |r, c| (r * cols + c + 1) as f64)
    }

    #[test]
    fn construction_and_access() {
        let mut m = Matrix::<f64>::new(2, 3, 1.5);
        assert_eq!(m.shape(), (2, 3));
        assert_eq!(m.at(1, 2), 1.5);
        m[(1, 2)] = 4.0;
        assert_eq!(m.at(1, 2), 4.0);
        assert_eq!(m.as_slice()[5], 4.0);
    }

    #[test]
    fn symmetric_construction() {
        assert!(matches!(
            Matrix::<f64, Symmetric>::try_new(3, 2, 0.0),
            Err(MatrixError::NotSquare { rows: 3, cols: 2 })
        ));
        let mut s = Matrix::<f64, Symmetric>::symmetric(3, 0.0);
        s.set(2, 1, 5.0);
        assert_eq!(s.at(1, 2), 5.0);
        assert!(s.is_symmetric());
    }

    #[test]
    fn rows_and_columns() {
        let m = counting(3, 3);
        assert_eq!(m.get_row(1).to_vec(), vec![4.0, 5.0, 6.0]);
        assert_eq!(m.get_column(2).to_vec(), vec![3.0, 6.0, 9.0]);
        let sums: Vec<f64> = m.iter_cols().map(|c| c.iter().sum()).collect();
        assert_eq!(sums, vec![12.0, 15.0, 18.0]);
    }

    #[test]
    fn row_and_column_operations() {
        let mut m = counting(2, 2);
        m.row_operation(0, [10.0, 20.0], |a, b| a + b);
        assert_eq!(m.get_row(0).to_vec(), vec![11.0, 22.0]);
        m.column_operation(1, [2.0, 2.0], |a, b| a * b);
        assert_eq!(m.get_column(1).to_vec(), vec![44.0, 8.0]);
        m.scale_row(1, 0.5, |a, k| a * k);
        assert_eq!(m.get_row(1).to_vec(), vec![1.5, 4.0]);
        m.set_column(0, [0.0, 0.0]);
        assert_eq!(m.get_column(0).to_vec(), vec![0.0, 0.0]);
        m.scale(3.0, |a, k| a + k);
        assert_eq!(m.get_row(0).to_vec(), vec![3.0, 47.0]);
    }

    #[test]
    fn transpose_in_place() {
        let mut m = counting(2, 3);
        m.transpose();
        assert_eq!(m.shape(), (3, 2));
        assert_eq!(m.get_row(0).to_vec(), vec![1.0, 4.0]);
        assert_eq!(m.get_row(2).to_vec(), vec![3.0, 6.0]);
    }

    #[test]
    fn identity_and_trace() {
        let mut m = counting(3, 3);
        assert_eq!(m.trace().unwrap(), 15.0);
        m.set_identity().unwrap();
        assert!(m.is_identity());
        assert!(m.is_diagonal());
        assert!(m.is_scalar());
        let mut r = counting(2, 3);
        assert!(matches!(r.set_identity(), Err(MatrixError::NotSquare { .. })));
        assert!(r.trace().is_err());
    }

    #[test]
    fn structural_predicates() {
        let upper = Matrix::from_rows(&[[1.0, 2.0], [0.0, 3.0]]).unwrap();
        assert!(upper.is_upper_triangular());
        assert!(!upper.is_lower_triangular());
        let skew = Matrix::from_rows(&[[0.0, 2.0], [-2.0, 0.0]]).unwrap();
        assert!(skew.is_skew_symmetric());
        assert!(!skew.is_symmetric());
        assert!(Matrix::<f64>::zeros(2, 3).is_null());
        assert!(!Matrix::<f64>::zeros(2, 2).is_scalar());
    }

    #[test]
    fn from_rows_rejects_ragged_input() {
        let rows: Vec<Vec<f64>> = vec![vec![1.0, 2.0], vec![3.0]];
        assert!(matches!(Matrix::from_rows(&rows), Err(MatrixError::Shape { .. })));
    }

    #[test]
    fn dump_is_space_separated() {
        let m = Matrix::from_rows(&[[1.0, 2.5], [-3.0, 4.0]]).unwrap();
        let mut out = Vec::new();
        m.dump(&mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "1 2.5\n-3 4\n");
    }

    #[test]
    fn swap_rows_and_matrices() {
        let mut a = counting(2, 2);
        a.swap_rows(0, 1);
        assert_eq!(a.get_row(0).to_vec(), vec![3.0, 4.0]);
        let mut b = Matrix::<f64>::zeros(1, 1);
        a.swap(&mut b);
        assert_eq!(a.shape(), (1, 1));
        assert_eq!(b.shape(), (2, 2));
    }
}

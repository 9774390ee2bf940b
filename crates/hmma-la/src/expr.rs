//! Lazy matrix expressions.
//!
//! `&a + &b`, `&a - &b`, `&a * &b` and `!&a` (transpose) build small
//! expression nodes instead of temporaries. Nothing is computed until the
//! expression is materialized or assigned into a matrix; each cell is then
//! evaluated exactly once, in column-major order.
//!
//! ```
//! use hmma_la::{Matrix, MatExpr};
//!
//! let a = Matrix::from_rows(&[[1.0, 2.0], [3.0, 4.0]]).unwrap();
//! let b = Matrix::<f64>::identity(2);
//! let c = (&a * &b + &a).materialize();
//! assert_eq!(c.at(1, 0), 6.0);
//! ```

use core::marker::PhantomData;
use core::ops::{Add, Div, Mul, Neg, Not, Sub};

use hmma::Scalar;

use crate::error::{MatrixError, Result};
use crate::matrix::Matrix;
use crate::storage::Layout;

/// Logical extent of a matrix or expression.
pub trait Shape {
    fn rows(&self) -> usize;
    fn cols(&self) -> usize;

    fn shape(&self) -> (usize, usize) {
        (self.rows(), self.cols())
    }
}

/// A matrix-valued expression that can be evaluated cell by cell.
pub trait MatExpr<S: Scalar>: Shape {
    /// Value of cell (row, col).
    fn eval(&self, row: usize, col: usize) -> S;

    /// Column-major walk over every cell.
    fn cells(&self) -> Cells<'_, Self, S>
    where
        Self: Sized,
    {
        Cells { expr: self, row: 0, col: 0, _scalar: PhantomData }
    }

    /// Evaluate into a new dense matrix.
    fn materialize(&self) -> Matrix<S> {
        Matrix::from_fn(self.rows(), self.cols(), |r, c| self.eval(r, c))
    }

    /// Resize `target` to this shape and fill it. Packed targets only
    /// receive the upper triangle.
    fn assign_to<L: Layout>(&self, target: &mut Matrix<S, L>) -> Result<()> {
        let (rows, cols) = self.shape();
        target.resize(rows, cols, S::ZERO)?;
        for c in 0..cols {
            let last = if L::SYMMETRIC { c + 1 } else { rows };
            for r in 0..last {
                target.set(r, c, self.eval(r, c));
            }
        }
        Ok(())
    }

    /// Exact equality: same shape and identical cells.
    fn equals<R: MatExpr<S>>(&self, other: &R) -> bool {
        self.approx_eq(other, S::ZERO)
    }

    /// Same shape and every cell within `tol`.
    fn approx_eq<R: MatExpr<S>>(&self, other: &R, tol: S) -> bool {
        if self.shape() != other.shape() {
            return false;
        }
        (0..self.cols()).all(|c| (0..self.rows()).all(|r| (self.eval(r, c) - other.eval(r, c)).abs() <= tol))
    }

    fn t(self) -> Transpose<Self>
    where
        Self: Sized,
    {
        Transpose::new(self)
    }

    fn scaled(self, factor: S) -> Scale<Self, S>
    where
        Self: Sized,
    {
        Scale { inner: self, factor }
    }

    /// 1 x cols row of column means.
    fn col_mean(self) -> ColMean<Self>
    where
        Self: Sized,
    {
        ColMean { inner: self }
    }

    /// `self * rhs⁻¹`. The inverse goes into a fresh temporary, `rhs` is
    /// left untouched.
    fn divide<R: MatExpr<S>>(self, rhs: R) -> Result<Product<Self, Matrix<S>>>
    where
        Self: Sized,
    {
        let inv = rhs.materialize().inverse()?;
        if self.cols() != inv.rows() {
            return Err(MatrixError::Shape { expected: (self.cols(), self.cols()), got: inv.shape() });
        }
        Ok(Product::new(self, inv))
    }
}

impl<E: Shape + ?Sized> Shape for &E {
    #[inline]
    fn rows(&self) -> usize { (**self).rows() }
    #[inline]
    fn cols(&self) -> usize { (**self).cols() }
}

impl<S: Scalar, E: MatExpr<S> + ?Sized> MatExpr<S> for &E {
    #[inline]
    fn eval(&self, row: usize, col: usize) -> S { (**self).eval(row, col) }
}

impl<S: Scalar, L: Layout> Shape for Matrix<S, L> {
    #[inline]
    fn rows(&self) -> usize { Matrix::rows(self) }
    #[inline]
    fn cols(&self) -> usize { Matrix::cols(self) }
}

impl<S: Scalar, L: Layout> MatExpr<S> for Matrix<S, L> {
    #[inline]
    fn eval(&self, row: usize, col: usize) -> S { self.at(row, col) }
}

/// Column-major iterator over the cells of an expression.
pub struct Cells<'e, E: ?Sized, S> {
    expr: &'e E,
    row: usize,
    col: usize,
    _scalar: PhantomData<S>,
}

impl<E: MatExpr<S>, S: Scalar> Iterator for Cells<'_, E, S> {
    type Item = S;

    fn next(&mut self) -> Option<S> {
        let (rows, cols) = self.expr.shape();
        if rows == 0 || self.col >= cols {
            return None;
        }
        let v = self.expr.eval(self.row, self.col);
        self.row += 1;
        if self.row == rows {
            self.row = 0;
            self.col += 1;
        }
        Some(v)
    }
}

/// Element-wise binary operator.
pub trait ElementOp: Copy {
    fn apply<S: Scalar>(a: S, b: S) -> S;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct Plus;

#[derive(Clone, Copy, Debug, Default)]
pub struct Minus;

impl ElementOp for Plus {
    #[inline]
    fn apply<S: Scalar>(a: S, b: S) -> S { a + b }
}

impl ElementOp for Minus {
    #[inline]
    fn apply<S: Scalar>(a: S, b: S) -> S { a - b }
}

/// `lhs op rhs`, cell by cell.
#[derive(Clone, Copy, Debug)]
pub struct Elementwise<A, B, O> {
    lhs: A,
    rhs: B,
    _op: O,
}

impl<A: Shape, B: Shape, O: ElementOp> Elementwise<A, B, O> {
    pub fn new(lhs: A, rhs: B, op: O) -> Self {
        debug_assert_eq!(lhs.shape(), rhs.shape(), "element-wise operands differ in shape");
        Self { lhs, rhs, _op: op }
    }
}

impl<A: Shape, B: Shape, O> Shape for Elementwise<A, B, O> {
    fn rows(&self) -> usize { self.lhs.rows() }
    fn cols(&self) -> usize { self.lhs.cols() }
}

impl<S: Scalar, A: MatExpr<S>, B: MatExpr<S>, O: ElementOp> MatExpr<S> for Elementwise<A, B, O> {
    #[inline]
    fn eval(&self, row: usize, col: usize) -> S {
        O::apply(self.lhs.eval(row, col), self.rhs.eval(row, col))
    }
}

/// Matrix product; each cell is a row-by-column dot product.
#[derive(Clone, Copy, Debug)]
pub struct Product<A, B> {
    lhs: A,
    rhs: B,
}

impl<A: Shape, B: Shape> Product<A, B> {
    pub fn new(lhs: A, rhs: B) -> Self {
        debug_assert_eq!(lhs.cols(), rhs.rows(), "product operands are not conformable");
        Self { lhs, rhs }
    }
}

impl<A: Shape, B: Shape> Shape for Product<A, B> {
    fn rows(&self) -> usize { self.lhs.rows() }
    fn cols(&self) -> usize { self.rhs.cols() }
}

impl<S: Scalar, A: MatExpr<S>, B: MatExpr<S>> MatExpr<S> for Product<A, B> {
    fn eval(&self, row: usize, col: usize) -> S {
        let mut sum = S::ZERO;
        for k in 0..self.lhs.cols() {
            sum += self.lhs.eval(row, k) * self.rhs.eval(k, col);
        }
        sum
    }
}

#[derive(Clone, Copy, Debug)]
pub struct Transpose<E> {
    inner: E,
}

impl<E: Shape> Transpose<E> {
    pub fn new(inner: E) -> Self {
        Self { inner }
    }
}

impl<E: Shape> Shape for Transpose<E> {
    fn rows(&self) -> usize { self.inner.cols() }
    fn cols(&self) -> usize { self.inner.rows() }
}

impl<S: Scalar, E: MatExpr<S>> MatExpr<S> for Transpose<E> {
    #[inline]
    fn eval(&self, row: usize, col: usize) -> S { self.inner.eval(col, row) }
}

#[derive(Clone, Copy, Debug)]
pub struct ColMean<E> {
    inner: E,
}

impl<E: Shape> Shape for ColMean<E> {
    fn rows(&self) -> usize { 1 }
    fn cols(&self) -> usize { self.inner.cols() }
}

impl<S: Scalar, E: MatExpr<S>> MatExpr<S> for ColMean<E> {
    fn eval(&self, _row: usize, col: usize) -> S {
        let n = self.inner.rows();
        let mut sum = S::ZERO;
        for r in 0..n {
            sum += self.inner.eval(r, col);
        }
        sum / S::from_usize(n)
    }
}

#[derive(Clone, Copy, Debug)]
pub struct Scale<E, S> {
    inner: E,
    factor: S,
}

impl<E: Shape, S> Shape for Scale<E, S> {
    fn rows(&self) -> usize { self.inner.rows() }
    fn cols(&self) -> usize { self.inner.cols() }
}

impl<S: Scalar, E: MatExpr<S>> MatExpr<S> for Scale<E, S> {
    #[inline]
    fn eval(&self, row: usize, col: usize) -> S { self.inner.eval(row, col) * self.factor }
}

macro_rules! impl_expr_ops {
    ([$($gen:tt)*] $ty:ty) => {
        impl<$($gen)*, Rhs: Shape> Add<Rhs> for $ty {
            type Output = Elementwise<Self, Rhs, Plus>;
            fn add(self, rhs: Rhs) -> Self::Output { Elementwise::new(self, rhs, Plus) }
        }

        impl<$($gen)*, Rhs: Shape> Sub<Rhs> for $ty {
            type Output = Elementwise<Self, Rhs, Minus>;
            fn sub(self, rhs: Rhs) -> Self::Output { Elementwise::new(self, rhs, Minus) }
        }

        impl<$($gen)*, Rhs: Shape> Mul<Rhs> for $ty {
            type Output = Product<Self, Rhs>;
            fn mul(self, rhs: Rhs) -> Self::Output { Product::new(self, rhs) }
        }

        impl<$($gen)*> Not for $ty {
            type Output = Transpose<Self>;
            fn not(self) -> Self::Output { Transpose::new(self) }
        }
    };
}

impl_expr_ops!([A: Shape, B: Shape, O: ElementOp] Elementwise<A, B, O>);
impl_expr_ops!([A: Shape, B: Shape] Product<A, B>);
impl_expr_ops!([E: Shape] Transpose<E>);
impl_expr_ops!([E: Shape] ColMean<E>);
impl_expr_ops!([E: Shape, T] Scale<E, T>);
impl_expr_ops!(['a, S: Scalar, L: Layout] &'a Matrix<S, L>);

impl<'a, S: Scalar, L: Layout> Neg for &'a Matrix<S, L> {
    type Output = Scale<Self, S>;
    fn neg(self) -> Self::Output { Scale { inner: self, factor: -S::ONE } }
}

/// `&a / b` is `&a * b⁻¹`; fails with `Singular` when `b` has no inverse.
impl<'a, S: Scalar, L: Layout, R: MatExpr<S>> Div<R> for &'a Matrix<S, L> {
    type Output = Result<Product<&'a Matrix<S, L>, Matrix<S>>>;
    fn div(self, rhs: R) -> Self::Output { self.divide(rhs) }
}

impl<S: Scalar, L: Layout, L2: Layout> PartialEq<Matrix<S, L2>> for Matrix<S, L> {
    fn eq(&self, other: &Matrix<S, L2>) -> bool {
        self.equals(other)
    }
}

impl<S: Scalar, L: Layout> Matrix<S, L> {
    /// Evaluate `expr` into this matrix, resizing as needed.
    pub fn assign<E: MatExpr<S>>(&mut self, expr: E) -> Result<()> {
        expr.assign_to(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Symmetric;

    fn counting(rows: usize, cols: usize) -> Matrix<f64> {
        Matrix::from_fn(rows, cols, |r, c| (r * cols + c) as f64)
    }

    #[test]
    fn sum_and_difference() {
        let a = counting(2, 3);
        let b = Matrix::new(2, 3, 1.0);
        let s = (&a + &b).materialize();
        assert_eq!(s.get_row(1).to_vec(), vec![4.0, 5.0, 6.0]);
        let d = (&a - &b - &b).materialize();
        assert_eq!(d.at(0, 0), -2.0);
    }

    #[test]
    fn product_matches_hand_computation() {
        let a = Matrix::from_fn(2, 3, |i, j| (i * 3 + j + 1) as f64);
        let b = Matrix::from_fn(3, 2, |i, j| (i * 2 + j + 1) as f64);
        let c = (&a * &b).materialize();
        // [1 2 3] * [1 2]   = [22 28]
        // [4 5 6]   [3 4]     [49 64]
        //           [5 6]
        assert_eq!(c.shape(), (2, 2));
        assert_eq!(c.as_slice(), &[22.0, 49.0, 28.0, 64.0]);
    }

    #[test]
    fn transpose_expression() {
        let a = counting(2, 3);
        let t = !&a;
        assert_eq!(t.shape(), (3, 2));
        assert_eq!(t.eval(2, 1), a.at(1, 2));
        let gram = (&a * !&a).materialize();
        assert!(gram.is_symmetric());
    }

    #[test]
    fn nested_expression_evaluates_lazily() {
        let a = counting(3, 3);
        let i = Matrix::<f64>::identity(3);
        let e = (&a + &i) * &i - &a;
        assert!(e.equals(&i));
    }

    #[test]
    fn column_mean() {
        let a = counting(3, 2);
        let m = (&a).col_mean().materialize();
        assert_eq!(m.shape(), (1, 2));
        assert_eq!(m.as_slice(), &[2.0, 3.0]);
    }

    #[test]
    fn assign_resizes_target() {
        let a = counting(2, 2);
        let mut out = Matrix::<f64>::zeros(5, 1);
        out.assign(&a + &a).unwrap();
        assert_eq!(out.shape(), (2, 2));
        assert_eq!(out.at(1, 1), 6.0);
    }

    #[test]
    fn assign_into_symmetric_checks_shape() {
        let a = counting(2, 3);
        let mut s = Matrix::<f64, Symmetric>::symmetric(2, 0.0);
        assert!(matches!(s.assign(&a), Err(MatrixError::NotSquare { .. })));
        let g = &a * !&a;
        s.assign(g).unwrap();
        assert_eq!(s.at(1, 0), g.eval(1, 0));
    }

    #[test]
    fn division_leaves_divisor_intact() {
        let a = Matrix::from_rows(&[[2.0, 3.0], [1.0, 4.0]]).unwrap();
        let b = a.clone();
        let q = (&a / &b).unwrap().materialize();
        assert!(q.approx_eq(&Matrix::<f64>::identity(2), 1e-12));
        assert_eq!(a, b);
        let singular = Matrix::from_rows(&[[1.0, 2.0], [2.0, 4.0]]).unwrap();
        assert!(matches!(&a / &singular, Err(MatrixError::Singular)));
    }

    #[test]
    fn equality_checks_shape_first() {
        let a = Matrix::<f64>::zeros(2, 3);
        let b = Matrix::<f64>::zeros(3, 2);
        assert!(a != b);
        assert_eq!(a, Matrix::<f64>::zeros(2, 3));
    }

    #[test]
    fn negation_and_scaling() {
        let a = counting(2, 2);
        assert!((-&a).equals(&(&a).scaled(-1.0)));
        let cells: Vec<f64> = (&a).scaled(2.0).cells().collect();
        assert_eq!(cells, vec![0.0, 4.0, 2.0, 6.0]);
    }
}

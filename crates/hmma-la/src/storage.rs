//! Storage strategies behind [`Matrix`](crate::Matrix).
//!
//! [`Dense`] keeps every element column-major, element (row, col) at
//! `data[col * rows + row]`. [`Symmetric`] keeps only the upper triangle,
//! packed column by column, so element (i, j) with `i <= j` lives at
//! `j * (j + 1) / 2 + i` and (j, i) aliases the same slot.

use core::fmt;
use core::marker::PhantomData;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{MatrixError, Result};
use crate::view::{Line, Packed, Strided};

/// Which kind of line a view addresses.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Axis {
    Row,
    Column,
}

/// Addressing rules for a storage strategy.
pub trait Layout: Copy + Default + fmt::Debug + Send + Sync + 'static {
    /// True when (i, j) and (j, i) share a slot.
    const SYMMETRIC: bool;

    /// Reject shapes this layout cannot hold.
    fn check_shape(rows: usize, cols: usize) -> Result<()>;

    /// Number of stored elements for a `rows x cols` matrix.
    fn buffer_len(rows: usize, cols: usize) -> usize;

    /// Slot of element (row, col).
    fn offset(rows: usize, cols: usize, row: usize, col: usize) -> usize;

    /// Row or column `index` as a borrowed view.
    fn line<S: Copy>(data: &[S], rows: usize, cols: usize, axis: Axis, index: usize) -> Line<'_, S>;
}

/// Full column-major storage: `as_slice()` yields column 0 first, then
/// column 1, and so on. Columns are contiguous and rows have stride `rows`.
/// Use [`Matrix::from_row_major`](crate::Matrix::from_row_major) or
/// [`Matrix::from_rows`](crate::Matrix::from_rows) to build from row-ordered
/// data.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Dense;

/// Packed upper-triangle storage for square symmetric matrices.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Symmetric;

#[inline]
pub(crate) fn packed_offset(row: usize, col: usize) -> usize {
    let (i, j) = if row <= col { (row, col) } else { (col, row) };
    j * (j + 1) / 2 + i
}

impl Layout for Dense {
    const SYMMETRIC: bool = false;

    fn check_shape(_rows: usize, _cols: usize) -> Result<()> { Ok(()) }

    #[inline]
    fn buffer_len(rows: usize, cols: usize) -> usize { rows * cols }

    #[inline]
    fn offset(rows: usize, _cols: usize, row: usize, col: usize) -> usize {
        col * rows + row
    }

    fn line<S: Copy>(data: &[S], rows: usize, cols: usize, axis: Axis, index: usize) -> Line<'_, S> {
        match axis {
            Axis::Column => {
                debug_assert!(index < cols);
                Line::Strided(Strided::new_unchecked(data, index * rows, 1, rows))
            }
            Axis::Row => {
                debug_assert!(index < rows);
                Line::Strided(Strided::new_unchecked(data, index, rows, cols))
            }
        }
    }
}

impl Layout for Symmetric {
    const SYMMETRIC: bool = true;

    fn check_shape(rows: usize, cols: usize) -> Result<()> {
        if rows == cols {
            Ok(())
        } else {
            Err(MatrixError::not_square(rows, cols))
        }
    }

    #[inline]
    fn buffer_len(rows: usize, _cols: usize) -> usize { rows * (rows + 1) / 2 }

    #[inline]
    fn offset(_rows: usize, _cols: usize, row: usize, col: usize) -> usize {
        packed_offset(row, col)
    }

    fn line<S: Copy>(data: &[S], rows: usize, _cols: usize, _axis: Axis, index: usize) -> Line<'_, S> {
        debug_assert!(index < rows);
        Line::Packed(Packed::new(data, index, rows))
    }
}

/// Owned element buffer plus its logical shape.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Storage<S, L = Dense> {
    data: Vec<S>,
    rows: usize,
    cols: usize,
    layout: PhantomData<L>,
}

impl<S: Copy, L: Layout> Storage<S, L> {
    /// Allocate a `rows x cols` buffer with every element set to `fill`.
    pub fn new(rows: usize, cols: usize, fill: S) -> Result<Self> {
        L::check_shape(rows, cols)?;
        Ok(Self { data: vec![fill; L::buffer_len(rows, cols)], rows, cols, layout: PhantomData })
    }

    /// Zero-sized storage.
    pub fn empty() -> Self {
        Self { data: Vec::new(), rows: 0, cols: 0, layout: PhantomData }
    }

    #[inline]
    pub fn rows(&self) -> usize { self.rows }

    #[inline]
    pub fn cols(&self) -> usize { self.cols }

    /// Number of stored elements, not `rows * cols` for packed layouts.
    #[inline]
    pub fn len(&self) -> usize { self.data.len() }

    #[inline]
    pub fn is_empty(&self) -> bool { self.rows == 0 || self.cols == 0 }

    #[inline]
    pub fn as_slice(&self) -> &[S] { &self.data }

    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [S] { &mut self.data }

    #[inline]
    fn slot(&self, row: usize, col: usize) -> usize {
        debug_assert!(row < self.rows && col < self.cols, "({row}, {col}) out of {}x{}", self.rows, self.cols);
        L::offset(self.rows, self.cols, row, col)
    }

    #[inline]
    pub fn at(&self, row: usize, col: usize) -> S {
        self.data[self.slot(row, col)]
    }

    #[inline]
    pub fn at_ref(&self, row: usize, col: usize) -> &S {
        &self.data[self.slot(row, col)]
    }

    #[inline]
    pub fn at_mut(&mut self, row: usize, col: usize) -> &mut S {
        let k = self.slot(row, col);
        &mut self.data[k]
    }

    /// Change the shape, keeping the overlapping top-left block and setting
    /// every new element to `fill`.
    pub fn resize(&mut self, rows: usize, cols: usize, fill: S) -> Result<()> {
        L::check_shape(rows, cols)?;
        if rows == self.rows && cols == self.cols {
            return Ok(());
        }
        let mut data = vec![fill; L::buffer_len(rows, cols)];
        let keep_rows = rows.min(self.rows);
        let keep_cols = cols.min(self.cols);
        for c in 0..keep_cols {
            // packed layouts only store r <= c
            let last = if L::SYMMETRIC { keep_rows.min(c + 1) } else { keep_rows };
            for r in 0..last {
                data[L::offset(rows, cols, r, c)] = self.data[L::offset(self.rows, self.cols, r, c)];
            }
        }
        self.data = data;
        self.rows = rows;
        self.cols = cols;
        Ok(())
    }

    /// Release the buffer and become 0x0.
    pub fn clear(&mut self) {
        self.data = Vec::new();
        self.rows = 0;
        self.cols = 0;
    }

    #[inline]
    pub fn line(&self, axis: Axis, index: usize) -> Line<'_, S> {
        L::line(&self.data, self.rows, self.cols, axis, index)
    }

    pub fn swap(&mut self, other: &mut Self) {
        core::mem::swap(self, other);
    }
}

impl<S: Copy> Storage<S, Dense> {
    pub(crate) fn dense(rows: usize, cols: usize, fill: S) -> Self {
        Self { data: vec![fill; rows * cols], rows, cols, layout: PhantomData }
    }

    pub(crate) fn dense_from_vec(rows: usize, cols: usize, data: Vec<S>) -> Self {
        debug_assert_eq!(data.len(), rows * cols);
        Self { data, rows, cols, layout: PhantomData }
    }

    /// Wrap a column-major buffer.
    pub fn from_column_major(rows: usize, cols: usize, data: Vec<S>) -> Result<Self> {
        if data.len() != rows * cols {
            return Err(MatrixError::Format(format!(
                "expected {} elements for {rows}x{cols}, got {}",
                rows * cols,
                data.len()
            )));
        }
        Ok(Self { data, rows, cols, layout: PhantomData })
    }

    /// Contiguous column slice.
    #[inline]
    pub fn column_slice(&self, col: usize) -> &[S] {
        let start = col * self.rows;
        &self.data[start..start + self.rows]
    }

    #[inline]
    pub fn column_slice_mut(&mut self, col: usize) -> &mut [S] {
        let start = col * self.rows;
        &mut self.data[start..start + self.rows]
    }
}

impl<S: Copy> Storage<S, Symmetric> {
    pub(crate) fn symmetric(n: usize, fill: S) -> Self {
        Self { data: vec![fill; n * (n + 1) / 2], rows: n, cols: n, layout: PhantomData }
    }
}

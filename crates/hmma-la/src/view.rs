//! Borrowed row/column views over matrix storage.
//!
//! A dense column is a contiguous run, a dense row is a strided run, and any
//! line of a packed symmetric matrix walks the triangle through the packing
//! formula. All three are exposed through [`Line`].

use core::iter::FusedIterator;

use hmma::Scalar;

use crate::error::{MatrixError, Result};
use crate::storage::packed_offset;

/// Read-only run of `len` elements starting at `offset`, stepping `stride`.
#[derive(Clone, Copy, Debug)]
pub struct Strided<'a, S> {
    data: &'a [S],
    offset: usize,
    stride: usize,
    len: usize,
}

impl<'a, S: Copy> Strided<'a, S> {
    /// Checked constructor. Fails when the stride is zero or the last element
    /// would fall outside `data`.
    pub fn new(data: &'a [S], offset: usize, stride: usize, len: usize) -> Result<Self> {
        let fits = len == 0 || offset + (len - 1) * stride < data.len();
        if stride == 0 || !fits {
            return Err(MatrixError::Range { offset, stride, len, buffer: data.len() });
        }
        Ok(Self { data, offset, stride, len })
    }

    /// Constructor for ranges the caller has already validated.
    pub(crate) fn new_unchecked(data: &'a [S], offset: usize, stride: usize, len: usize) -> Self {
        debug_assert!(len == 0 || offset + (len - 1) * stride < data.len());
        Self { data, offset, stride, len }
    }

    #[inline]
    pub fn len(&self) -> usize { self.len }

    #[inline]
    pub fn is_empty(&self) -> bool { self.len == 0 }

    #[inline]
    pub fn stride(&self) -> usize { self.stride }

    /// Element `k` of the run.
    #[inline]
    pub fn get(&self, k: usize) -> S {
        debug_assert!(k < self.len);
        self.data[self.offset + k * self.stride]
    }

    pub fn iter(&self) -> LineIter<'a, S> {
        Line::Strided(*self).into_iter()
    }
}

/// One row or column of a packed symmetric matrix.
#[derive(Clone, Copy, Debug)]
pub struct Packed<'a, S> {
    data: &'a [S],
    fixed: usize,
    len: usize,
}

impl<'a, S: Copy> Packed<'a, S> {
    pub(crate) fn new(data: &'a [S], fixed: usize, len: usize) -> Self {
        Self { data, fixed, len }
    }

    #[inline]
    pub fn len(&self) -> usize { self.len }

    #[inline]
    pub fn is_empty(&self) -> bool { self.len == 0 }

    #[inline]
    pub fn get(&self, k: usize) -> S {
        debug_assert!(k < self.len);
        self.data[packed_offset(self.fixed, k)]
    }
}

/// A row or column of a matrix, independent of the storage layout.
#[derive(Clone, Copy, Debug)]
pub enum Line<'a, S> {
    Strided(Strided<'a, S>),
    Packed(Packed<'a, S>),
}

impl<'a, S: Copy> Line<'a, S> {
    #[inline]
    pub fn len(&self) -> usize {
        match self {
            Line::Strided(s) => s.len(),
            Line::Packed(p) => p.len(),
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool { self.len() == 0 }

    #[inline]
    pub fn get(&self, k: usize) -> S {
        match self {
            Line::Strided(s) => s.get(k),
            Line::Packed(p) => p.get(k),
        }
    }

    pub fn iter(&self) -> LineIter<'a, S> {
        (*self).into_iter()
    }

    pub fn to_vec(&self) -> Vec<S> {
        self.iter().collect()
    }

    /// Dot product with another line of the same length.
    pub fn dot(&self, other: &Line<'_, S>) -> S
    where
        S: Scalar,
    {
        debug_assert_eq!(self.len(), other.len());
        let mut sum = S::ZERO;
        for (a, b) in self.iter().zip(other.iter()) {
            sum += a * b;
        }
        sum
    }
}

impl<'a, S: Copy> IntoIterator for Line<'a, S> {
    type Item = S;
    type IntoIter = LineIter<'a, S>;

    fn into_iter(self) -> LineIter<'a, S> {
        let back = self.len();
        LineIter { line: self, front: 0, back }
    }
}

/// Double-ended iterator over a [`Line`].
#[derive(Clone, Debug)]
pub struct LineIter<'a, S> {
    line: Line<'a, S>,
    front: usize,
    back: usize,
}

impl<S: Copy> Iterator for LineIter<'_, S> {
    type Item = S;

    #[inline]
    fn next(&mut self) -> Option<S> {
        if self.front == self.back {
            return None;
        }
        let v = self.line.get(self.front);
        self.front += 1;
        Some(v)
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = self.back - self.front;
        (n, Some(n))
    }

    fn nth(&mut self, n: usize) -> Option<S> {
        self.front = (self.front + n).min(self.back);
        self.next()
    }
}

impl<S: Copy> DoubleEndedIterator for LineIter<'_, S> {
    #[inline]
    fn next_back(&mut self) -> Option<S> {
        if self.front == self.back {
            return None;
        }
        self.back -= 1;
        Some(self.line.get(self.back))
    }
}

impl<S: Copy> ExactSizeIterator for LineIter<'_, S> {}
impl<S: Copy> FusedIterator for LineIter<'_, S> {}

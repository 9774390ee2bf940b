use core::cmp::Ordering;
use core::ops::{Index, IndexMut, Sub};

use hmma::Scalar;

/// Heap-allocated vector of scalars.
///
/// Returned for eigenvalues, singular values and single right-hand-side
/// solves.
#[derive(Clone, Debug, PartialEq)]
pub struct DVec<S> {
    data: Vec<S>,
}

impl<S: Scalar> DVec<S> {
    #[inline]
    pub fn from_vec(data: Vec<S>) -> Self {
        Self { data }
    }

    pub fn zeros(n: usize) -> Self {
        Self { data: vec![S::ZERO; n] }
    }

    pub fn from_fn(n: usize, f: impl Fn(usize) -> S) -> Self {
        Self { data: (0..n).map(f).collect() }
    }

    pub fn from_slice(s: &[S]) -> Self {
        Self { data: s.to_vec() }
    }

    #[inline]
    pub fn len(&self) -> usize { self.data.len() }

    #[inline]
    pub fn is_empty(&self) -> bool { self.data.is_empty() }

    #[inline]
    pub fn as_slice(&self) -> &[S] { &self.data }

    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [S] { &mut self.data }

    #[inline]
    pub fn into_vec(self) -> Vec<S> { self.data }

    pub fn iter(&self) -> core::slice::Iter<'_, S> {
        self.data.iter()
    }

    pub fn dot(&self, other: &DVec<S>) -> S {
        debug_assert_eq!(self.len(), other.len(), "DVec dot: length mismatch");
        let mut sum = S::ZERO;
        for (&a, &b) in self.data.iter().zip(&other.data) {
            sum += a * b;
        }
        sum
    }

    pub fn norm(&self) -> S {
        self.dot(self).sqrt()
    }

    /// Max absolute value.
    pub fn amax(&self) -> S {
        let mut m = S::ZERO;
        for &x in &self.data {
            m = m.max(x.abs());
        }
        m
    }

    /// Stable index order that sorts the elements with `cmp`.
    pub(crate) fn argsort_by(&self, mut cmp: impl FnMut(S, S) -> Ordering) -> Vec<usize> {
        let mut idx: Vec<usize> = (0..self.len()).collect();
        idx.sort_by(|&a, &b| cmp(self.data[a], self.data[b]));
        idx
    }

    /// Reorder elements so position `k` holds the old element `order[k]`.
    pub(crate) fn permute(&self, order: &[usize]) -> Self {
        Self { data: order.iter().map(|&k| self.data[k]).collect() }
    }
}

impl<S: Scalar> Index<usize> for DVec<S> {
    type Output = S;
    #[inline]
    fn index(&self, i: usize) -> &S { &self.data[i] }
}

impl<S: Scalar> IndexMut<usize> for DVec<S> {
    #[inline]
    fn index_mut(&mut self, i: usize) -> &mut S { &mut self.data[i] }
}

impl<S: Scalar> Sub for &DVec<S> {
    type Output = DVec<S>;
    fn sub(self, rhs: &DVec<S>) -> DVec<S> {
        debug_assert_eq!(self.len(), rhs.len());
        DVec::from_fn(self.len(), |i| self[i] - rhs[i])
    }
}

impl<S> FromIterator<S> for DVec<S> {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self { data: iter.into_iter().collect() }
    }
}

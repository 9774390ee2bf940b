//! Background evaluation of the long-running operations.
//!
//! The matrix is cloned into a worker thread, so the caller keeps full use
//! of the original while the computation runs. There is no cancellation:
//! a started computation always runs to completion.

use std::panic;
use std::thread::{self, JoinHandle};

use hmma::Scalar;
use tracing::debug;

use crate::config::SolverConfig;
use crate::eigen::{EigenSort, EigenSpace};
use crate::error::Result;
use crate::matrix::Matrix;
use crate::storage::Layout;

/// Handle to a result being computed on a worker thread.
#[must_use = "the result is only available through `get`"]
#[derive(Debug)]
pub struct Pending<T> {
    handle: JoinHandle<Result<T>>,
}

impl<T: Send + 'static> Pending<T> {
    fn spawn(name: &str, job: impl FnOnce() -> Result<T> + Send + 'static) -> Result<Self> {
        let handle = thread::Builder::new().name(name.to_string()).spawn(job)?;
        Ok(Self { handle })
    }

    /// True once the worker has finished; `get` will not block.
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Block until the worker finishes. A panic on the worker is resumed on
    /// the calling thread.
    pub fn get(self) -> Result<T> {
        match self.handle.join() {
            Ok(result) => result,
            Err(payload) => panic::resume_unwind(payload),
        }
    }
}

impl<S: Scalar, L: Layout> Matrix<S, L> {
    /// [`determinant`](Self::determinant) on a worker thread.
    pub fn determinant_async(&self) -> Result<Pending<S>> {
        self.determinant_async_with(SolverConfig::default())
    }

    pub fn determinant_async_with(&self, config: SolverConfig) -> Result<Pending<S>> {
        let m = self.clone();
        debug!(rows = m.rows(), cols = m.cols(), "determinant_async: spawning worker");
        Pending::spawn("hmma-determinant", move || m.determinant_with(&config))
    }

    /// [`eigen_space`](Self::eigen_space) on a worker thread.
    pub fn eigen_space_async(&self, sort: EigenSort) -> Result<Pending<EigenSpace<S>>> {
        self.eigen_space_async_with(sort, SolverConfig::default())
    }

    pub fn eigen_space_async_with(&self, sort: EigenSort, config: SolverConfig) -> Result<Pending<EigenSpace<S>>> {
        let m = self.clone();
        debug!(rows = m.rows(), cols = m.cols(), "eigen_space_async: spawning worker");
        Pending::spawn("hmma-eigen", move || m.eigen_space_with(sort, &config))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MatrixError;
    use crate::expr::MatExpr;
    use crate::storage::Symmetric;

    #[test]
    fn determinant_matches_sync() {
        let a = Matrix::from_rows(&[[2.0, 3.0, 2.0], [3.0, 2.0, 3.0], [4.0, -2.0, 2.0]]).unwrap();
        let pending = a.determinant_async().unwrap();
        assert_eq!(pending.get().unwrap(), a.determinant().unwrap());
    }

    #[test]
    fn eigen_matches_sync() {
        let a = Matrix::<f64, Symmetric>::symmetric_from_fn(4, |r, c| (r + 2 * c) as f64);
        let pending = a.eigen_space_async(EigenSort::Ascending).unwrap();
        let sync = a.eigen_space(EigenSort::Ascending).unwrap();
        let background = pending.get().unwrap();
        assert_eq!(background.values, sync.values);
        assert!(background.vectors.equals(&sync.vectors));
    }

    #[test]
    fn errors_come_back_through_get() {
        let pending = Matrix::<f64>::zeros(2, 3).determinant_async().unwrap();
        assert!(matches!(pending.get(), Err(MatrixError::NotSquare { .. })));
    }
}

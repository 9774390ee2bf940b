//! Dense and symmetric matrices: lazy expressions, elimination,
//! decompositions, eigen analysis.
//!
//! Generic over `hmma::Scalar`. Results are always dense; the packed
//! symmetric layout is an input format that halves storage and keeps
//! `(i, j)` and `(j, i)` aliased.

mod cholesky;
mod config;
mod dvec;
mod eigen;
mod elimination;
mod error;
mod expr;
mod io;
mod lu;
mod matrix;
mod norms;
mod pending;
mod power;
mod qr;
mod stats;
mod storage;
mod svd;
mod view;

pub use cholesky::Cholesky;
pub use config::SolverConfig;
pub use dvec::DVec;
pub use eigen::{EigenSort, EigenSpace};
pub use error::{MatrixError, Result};
pub use expr::{Cells, ColMean, ElementOp, Elementwise, MatExpr, Minus, Plus, Product, Scale, Shape, Transpose};
pub use io::IoFormat;
pub use lu::Lu;
pub use matrix::{DMatrix, Matrix, SMatrix};
pub use pending::Pending;
pub use qr::Qr;
pub use storage::{Axis, Dense, Layout, Storage, Symmetric};
pub use svd::Svd;
pub use view::{Line, LineIter, Packed, Strided};

pub use hmma::Scalar;

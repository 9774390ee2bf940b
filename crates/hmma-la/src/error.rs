//! Error types for hmma-la.

use std::fmt;

/// Errors reported by matrix construction, algorithms and persistence.
#[derive(Debug)]
pub enum MatrixError {
    /// A square-only operation was given a non-square matrix, or a symmetric
    /// matrix was constructed/resized with `rows != cols`.
    NotSquare { rows: usize, cols: usize },
    /// A required pivot or determinant is zero or numerically negligible.
    Singular,
    /// The algorithm cannot produce a valid result for this input.
    NotSolvable(String),
    /// A strided view does not fit inside its backing buffer.
    Range {
        offset: usize,
        stride: usize,
        len: usize,
        buffer: usize,
    },
    /// Operands of a checked operation have incompatible shapes.
    Shape {
        expected: (usize, usize),
        got: (usize, usize),
    },
    /// Underlying I/O failure while reading or writing a matrix.
    Io(std::io::Error),
    /// Persisted matrix data is malformed.
    Format(String),
}

impl MatrixError {
    pub(crate) fn not_square(rows: usize, cols: usize) -> Self {
        Self::NotSquare { rows, cols }
    }

    pub(crate) fn not_solvable(reason: impl Into<String>) -> Self {
        Self::NotSolvable(reason.into())
    }
}

impl fmt::Display for MatrixError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotSquare { rows, cols } => {
                write!(f, "matrix is not square ({rows}x{cols})")
            }
            Self::Singular => write!(f, "matrix is singular"),
            Self::NotSolvable(reason) => write!(f, "not solvable: {reason}"),
            Self::Range { offset, stride, len, buffer } => write!(
                f,
                "strided range (offset {offset}, stride {stride}, len {len}) exceeds buffer of {buffer}"
            ),
            Self::Shape { expected, got } => write!(
                f,
                "shape mismatch: expected {}x{}, got {}x{}",
                expected.0, expected.1, got.0, got.1
            ),
            Self::Io(e) => write!(f, "io error: {e}"),
            Self::Format(msg) => write!(f, "malformed matrix data: {msg}"),
        }
    }
}

impl std::error::Error for MatrixError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for MatrixError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<csv::Error> for MatrixError {
    fn from(e: csv::Error) -> Self {
        if e.is_io_error() {
            match e.into_kind() {
                csv::ErrorKind::Io(io) => Self::Io(io),
                other => Self::Format(format!("{other:?}")),
            }
        } else {
            Self::Format(e.to_string())
        }
    }
}

impl From<safetensors::SafeTensorError> for MatrixError {
    fn from(e: safetensors::SafeTensorError) -> Self {
        Self::Format(e.to_string())
    }
}

/// Result alias used throughout hmma-la.
pub type Result<T> = core::result::Result<T, MatrixError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_messages() {
        assert_eq!(
            MatrixError::not_square(2, 3).to_string(),
            "matrix is not square (2x3)"
        );
        assert_eq!(MatrixError::Singular.to_string(), "matrix is singular");
        assert_eq!(
            MatrixError::not_solvable("too few rows").to_string(),
            "not solvable: too few rows"
        );
    }

    #[test]
    fn io_error_has_source() {
        let err: MatrixError =
            std::io::Error::new(std::io::ErrorKind::NotFound, "missing").into();
        assert!(std::error::Error::source(&err).is_some());
    }
}

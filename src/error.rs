//! Error type
use crate::array::DType;
use thiserror::Error;

/// Error from a replay pool operation.
///
/// The pool is left unmodified by any operation that returns an error.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PoolError {
    #[error("unknown field {name:?}")]
    UnknownField { name: String },
    #[error("index {index} is outside the {size} filled records")]
    OutOfRange { index: usize, size: usize },
    #[error("field {name:?} has element type {expected} but got values of type {actual}")]
    DTypeMismatch {
        name: String,
        expected: DType,
        actual: DType,
    },
    #[error("field {name:?} values of shape {actual:?} do not broadcast to {expected:?}")]
    ShapeMismatch {
        name: String,
        expected: Vec<usize>,
        actual: Vec<usize>,
    },
    #[error("invalid field {name:?}: {reason}")]
    InvalidField { name: String, reason: String },
    #[error("invalid pool state: {0}")]
    InvalidState(String),
}

//! Error types for tandem-data.

use thiserror::Error;

/// Result type for tandem-data operations.
pub type Result<T> = std::result::Result<T, DataError>;

/// Errors raised while manipulating exchange data.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DataError {
    /// A write did not match the fixed buffer length of the datum.
    #[error("data \"{data}\" holds {expected} values, got {actual}")]
    LengthMismatch {
        data: String,
        expected: usize,
        actual: usize,
    },

    /// Only predictors of order 0 and 1 exist.
    #[error("extrapolation order {0} is not supported, use 0 or 1")]
    UnsupportedExtrapolationOrder(usize),

    /// Gradient access on a datum registered without gradient storage.
    #[error("data \"{0}\" has no gradient buffer")]
    MissingGradient(String),
}

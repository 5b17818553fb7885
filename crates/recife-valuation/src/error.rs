//! Error types for valuation computations.

use thiserror::Error;

/// Result type for valuation computations.
pub type Result<T> = std::result::Result<T, ValuationError>;

/// Errors that can occur during valuation computations.
#[derive(Debug, Error)]
pub enum ValuationError {
    /// Not enough observations for an estimate
    #[error("Insufficient data: need at least {required} observations, got {actual}")]
    InsufficientData {
        /// Required number of observations
        required: usize,
        /// Actual number of observations
        actual: usize,
    },

    /// The regression is not identified
    #[error("Degenerate regression: {0}")]
    Degenerate(String),

    /// Invalid parameter
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
}

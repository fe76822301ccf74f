//! Error types for the anofox-decompose library.

use thiserror::Error;

/// Result type alias for forecast operations.
pub type Result<T> = std::result::Result<T, ForecastError>;

/// Errors that can occur while building, fitting or forecasting a model.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ForecastError {
    /// Too few valid observations remain after filtering.
    #[error("empty series: need at least {needed} valid observations, got {got}")]
    EmptySeries { needed: usize, got: usize },

    /// Invalid configuration value.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The optimizer exhausted its budget without meeting its tolerance.
    #[error("no convergence after {iterations} iterations (gradient norm {gradient_norm:.3e})")]
    Convergence { iterations: usize, gradient_norm: f64 },

    /// A holiday or capacity series does not cover the required dates.
    #[error("date range error: {0}")]
    DateRange(String),

    /// Timestamp-related error.
    #[error("timestamp error: {0}")]
    TimestampError(String),

    /// Dimension mismatch between data structures.
    #[error("dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    /// Model has not been fitted yet.
    #[error("model must be fitted before prediction")]
    FitRequired,

    /// The run was cancelled through its cancellation token.
    #[error("operation cancelled")]
    Cancelled,

    /// Computation error (e.g., numerical issues).
    #[error("computation error: {0}")]
    ComputationError(String),
}

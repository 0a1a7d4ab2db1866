//! Error types for GoFStat

use thiserror::Error;

/// GoFStat error type
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed observable interval or binning scheme
    #[error("Invalid range: {0}")]
    InvalidRange(String),

    /// Rebinning left fewer than two usable bins
    #[error("Insufficient bins: {0}")]
    InsufficientBins(String),

    /// Sample too small, or the model CDF is singular on it
    #[error("Degenerate sample: {0}")]
    DegenerateSample(String),

    /// The model oracle could not fit a dataset
    #[error("Fit did not converge: {0}")]
    FitNonConvergence(String),

    /// A supplied sampling distribution was built for another statistic
    #[error("Sampling distribution mismatch: expected {expected}, got {found}")]
    DistributionMismatch {
        /// Statistic requested by the caller.
        expected: String,
        /// Statistic the distribution was built for.
        found: String,
    },

    /// Validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Computation error
    #[error("Computation error: {0}")]
    Computation(String),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

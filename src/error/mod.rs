//! Error handling for the matching library.
//!
//! All errors are fatal to the current invocation and are surfaced before or
//! during matching; nothing is retried internally. Partial matches and
//! unmatched treated units are not errors — they are recorded in the result
//! and reported as non-fatal warnings.

use arrow::error::ArrowError;

/// Specialized error type for matching operations
#[derive(Debug, thiserror::Error)]
pub enum MatchError {
    /// Configuration value is inconsistent or out of range
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// The treatment column contains missing values
    #[error("missing data: {0}")]
    MissingData(String),

    /// The treatment column contains values outside {{0, 1}}
    #[error("non-binary treatment: {0}")]
    NonBinaryTreatment(String),

    /// No treated or no control units after partitioning
    #[error("empty pool: {0}")]
    EmptyPool(String),

    /// Covariates named in the model specification are absent or unusable
    #[error("missing covariates: {0}")]
    MissingCovariates(String),

    /// The regularized control-group covariance matrix is not positive-definite
    #[error("singular covariance: {0}")]
    SingularCovariance(String),

    /// Error surfaced from the Arrow layer
    #[error("arrow error: {0}")]
    ArrowError(#[from] ArrowError),
}

/// Result type for matching operations
pub type Result<T> = std::result::Result<T, MatchError>;

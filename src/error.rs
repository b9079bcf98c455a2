//! Error types for treebench
//!
//! Data errors are fatal to one dataset, training errors to one trial.
//! Neither ever invalidates results already collected.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Treebench error types
#[derive(Error, Debug)]
pub enum Error {
    /// Dataset file does not exist or cannot be opened
    #[error("Dataset not found: {}\nExpected a whitespace-separated file with the label in column 0", path.display())]
    DatasetNotFound {
        /// Path that was probed
        path: PathBuf,
    },

    /// Dataset file has a malformed row
    #[error("Dataset parse error in {} line {line}: {message}", path.display())]
    DatasetParse {
        /// File being parsed
        path: PathBuf,
        /// 1-based line number
        line: usize,
        /// What went wrong
        message: String,
    },

    /// Feature matrix and label vector disagree in shape
    #[error("Dataset shape mismatch: {0}")]
    ShapeMismatch(String),

    /// Invalid input or configuration
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Depth limit rejected by a classifier adapter
    #[error("Invalid max depth {0}: depth must be at least 1")]
    InvalidDepth(usize),

    /// A classifier failed while fitting
    #[error("{method} failed to fit: {reason}")]
    FitFailed {
        /// Method name
        method: String,
        /// Failure description
        reason: String,
    },

    /// Predict was called on an adapter that has not been fitted
    #[error("{0} must be fitted before predicting")]
    NotFitted(String),

    /// Requested method is not compiled into this build
    #[error("Method unavailable: {method} ({reason})")]
    MethodUnavailable {
        /// Method name
        method: String,
        /// Why it cannot be used
        reason: String,
    },

    /// Storage error (Parquet/Arrow result files)
    #[error("Storage error: {0}")]
    StorageError(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Arrow error
    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    /// Parquet error
    #[error("Parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

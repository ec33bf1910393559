use std::path::PathBuf;

use thiserror::Error;

/// Failure reading a batch file. Aborts the run before any refinement.
#[derive(Debug, Error)]
pub enum BatchInputError {
    #[error("batch file not found: {0}")]
    NotFound(PathBuf),

    #[error("missing columns {missing:?}; available columns: {available:?}")]
    MissingColumns {
        missing: Vec<String>,
        available: Vec<String>,
    },

    #[error("unsupported batch format: {0} (expected .csv or .parquet)")]
    UnsupportedFormat(PathBuf),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    #[error("parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),
}

/// Failure writing a results file.
#[derive(Debug, Error)]
pub enum BatchOutputError {
    #[error("unsupported output format: {0} (expected .csv or .parquet)")]
    UnsupportedFormat(PathBuf),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    #[error("parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),
}

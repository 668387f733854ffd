//! Error types shared across Brandwise crates

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for common operations
pub type Result<T> = std::result::Result<T, CommonError>;

#[derive(Error, Debug)]
pub enum CommonError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Corrupt state file {}: {source}", .path.display())]
    CorruptState {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Path has no parent directory: {}", .0.display())]
    NoParent(PathBuf),

    #[error("Invalid pattern: {0}")]
    Pattern(#[from] regex::Error),
}

//! Error types for ingestion, distribution and sorting
//!
//! Variants double as the operator-facing taxonomy: remote failures abort a
//! fetch, contention asks the operator to release a file, and the rest are
//! unexpected and go to the failure log.

use brandwise_common::CommonError;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for ingest operations
pub type Result<T> = std::result::Result<T, IngestError>;

#[derive(Error, Debug)]
pub enum IngestError {
    /// Transport failure or non-success HTTP status
    #[error("Network request failed: {0}. Check your internet connection and the API base URL.")]
    Http(#[from] reqwest::Error),

    /// The API answered but flagged the request as failed
    #[error("API rejected request to {endpoint}: {messages}")]
    Api { endpoint: String, messages: String },

    /// Response body did not match the expected shape
    #[error("Malformed response from {endpoint}: {source}")]
    Decode {
        endpoint: String,
        #[source]
        source: serde_json::Error,
    },

    /// A file could not be renamed or moved, usually because it is open elsewhere
    #[error("Could not move '{}': {source}. Please close the file in other applications so it can be moved, then run the command again.", .path.display())]
    Contention {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid submission time: {0}")]
    Timestamp(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("File operation failed: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Common(#[from] CommonError),
}

impl IngestError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn contention(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Contention {
            path: path.into(),
            source,
        }
    }

    /// Failures of the remote feed. The run is aborted and can simply be retried.
    pub fn is_remote(&self) -> bool {
        matches!(self, Self::Http(_) | Self::Api { .. } | Self::Decode { .. })
    }

    /// Lower-level causes beneath the one already quoted in the message,
    /// outermost first. A refused connection, for instance, only shows up here.
    pub fn causes(&self) -> Vec<String> {
        std::iter::successors(std::error::Error::source(self), |e| e.source())
            .skip(1)
            .map(ToString::to_string)
            .collect()
    }

    /// Failures whose message already tells the operator what to do.
    pub fn is_actionable(&self) -> bool {
        matches!(self, Self::Contention { .. } | Self::Config(_))
    }
}

//! Unified error types for gridfeed
//!
//! [`FeedError`] is the single error surfaced to callers of the data
//! client. Each variant maps to one failure class of the fetch pipeline so
//! callers can tell a bad credential from a dropped page or a reshaped
//! upstream payload.

use polars::prelude::PolarsError;
use thiserror::Error;

/// Error type for all gridfeed operations.
#[derive(Error, Debug)]
pub enum FeedError {
    /// Missing or rejected API credential
    #[error("Authentication error: {0}")]
    Auth(String),

    /// HTTP/transport failure or an error payload returned by the API
    #[error("Fetch error: {0}")]
    Fetch(String),

    /// A timestamp, duration or numeric field could not be interpreted
    #[error("Parse error: {0}")]
    Parse(String),

    /// Expected column or field missing from a response or table
    #[error("Schema error: {0}")]
    Schema(String),

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O errors (config files)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic errors (for wrapping external errors)
    #[error("{0}")]
    Other(String),
}

/// Convenience type alias for Results using FeedError.
pub type FeedResult<T> = Result<T, FeedError>;

impl FeedError {
    /// True for errors that came from the network side of a fetch.
    pub fn is_fetch(&self) -> bool {
        matches!(self, FeedError::Fetch(_))
    }
}

impl From<anyhow::Error> for FeedError {
    fn from(err: anyhow::Error) -> Self {
        FeedError::Other(err.to_string())
    }
}

impl From<serde_json::Error> for FeedError {
    fn from(err: serde_json::Error) -> Self {
        FeedError::Parse(err.to_string())
    }
}

// Polars raises on missing columns and shape mismatches, both of which are
// schema problems from the pipeline's point of view.
impl From<PolarsError> for FeedError {
    fn from(err: PolarsError) -> Self {
        FeedError::Schema(err.to_string())
    }
}

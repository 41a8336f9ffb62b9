//! Error types for trendwords
//!
//! Defines module-specific error types using thiserror for clear error
//! propagation.

use thiserror::Error;

/// Main error type for the trendwords service
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration resolution errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Binary encoding errors (word diffs, recovery points)
    #[error("Encode error: {0}")]
    Encode(#[from] minicbor::encode::Error<std::convert::Infallible>),

    /// Binary decoding errors (word diffs, recovery points)
    #[error("Decode error: {0}")]
    Decode(#[from] minicbor::decode::Error),

    /// File I/O errors
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience Result type using the trendwords Error
pub type Result<T> = std::result::Result<T, Error>;

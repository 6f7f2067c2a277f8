//! Error types for chorus-ap
//!
//! Defines module-specific error types using thiserror for clear error propagation.

use thiserror::Error;

/// Main error type for chorus-ap
#[derive(Error, Debug)]
pub enum Error {
    /// Audio format fields out of range
    #[error("Invalid audio format: {0}")]
    InvalidFormat(String),

    /// Container rejected while parsing (bad magic, truncated chunk, ...)
    #[error("Invalid container: {0}")]
    InvalidContainer(String),

    /// Container recognized but its contents are not supported
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// Audio decoding errors
    #[error("Audio decode error: {0}")]
    Decode(String),

    /// Audio output device errors
    #[error("Audio output error: {0}")]
    AudioOutput(String),

    /// File I/O errors
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience Result type using chorus-ap Error
pub type Result<T> = std::result::Result<T, Error>;

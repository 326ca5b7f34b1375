//! Error types for tpr-player
//!
//! Defines module-specific error types using thiserror for clear error propagation.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for tpr-player
#[derive(Error, Debug)]
pub enum Error {
    /// A recording file cannot be accessed
    #[error("cannot open recording file: {}", path.display())]
    FileOpen {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Short header/payload read, bad type code or malformed structure
    #[error("invalid recording file: {} ({reason})", path.display())]
    CorruptRecording { path: PathBuf, reason: String },

    /// Playback speed must be finite and positive
    #[error("Invalid speed: {0}")]
    InvalidSpeed(f64),

    /// Invalid state for operation
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Configuration file loading or validation errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// File I/O errors
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Errors raised by tpr-common helpers
    #[error(transparent)]
    Common(#[from] tpr_common::Error),
}

impl Error {
    /// Build a `CorruptRecording` error for `path`
    pub fn corrupt(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Error::CorruptRecording {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

/// Convenience Result type using tpr-player Error
pub type Result<T> = std::result::Result<T, Error>;

//! Transform error types.

use thiserror::Error;

/// Result type for transform operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Transform error types.
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid setup file contents.
    #[error("invalid setup: {0}")]
    InvalidSetup(String),

    /// JSON parsing error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Core library error.
    #[error("core error: {0}")]
    CoreError(#[from] trdlet_core::Error),
}

impl Error {
    /// Detector id if this is an unknown-detector error.
    #[must_use]
    pub fn unknown_detector(&self) -> Option<u16> {
        match self {
            Error::CoreError(trdlet_core::Error::UnknownDetector(det)) => Some(*det),
            _ => None,
        }
    }
}

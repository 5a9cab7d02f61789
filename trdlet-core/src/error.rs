//! Error types for trdlet-core.

use thiserror::Error;

/// Result type alias for trdlet operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for trdlet operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// No geometry entry (pad plane or frame matrix) for the detector.
    #[error("unknown detector: {0}")]
    UnknownDetector(u16),

    /// Pad row beyond the rows of the chamber's pad plane.
    #[error("pad row {row} out of range for detector {detector} ({rows} rows)")]
    PadRowOutOfRange { detector: u16, row: u8, rows: usize },

    /// Bit-field width the decoder cannot represent.
    #[error("unsupported field width: {0} bits (expected 1..=31)")]
    InvalidFieldWidth(u32),

    /// Configuration error.
    #[error("configuration error: {0}")]
    ConfigError(String),
}

//! Error types for DDS export.

use thiserror::Error;

/// Errors that can occur when writing or reading DDS files.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid DDS magic.
    #[error("invalid DDS magic: expected 'DDS ', got {0:?}")]
    InvalidMagic([u8; 4]),

    /// Invalid DDS header.
    #[error("invalid DDS header: {0}")]
    InvalidHeader(String),

    /// The texture has a layout DDS export does not cover.
    #[error("unsupported texture {name}: {reason}")]
    Unsupported { name: String, reason: String },

    /// The texture payload is shorter than its dimensions require.
    #[error("texture {name} is incomplete: expected {expected} bytes, got {actual}")]
    Incomplete {
        name: String,
        expected: usize,
        actual: usize,
    },
}

/// Result type for DDS operations.
pub type Result<T> = std::result::Result<T, Error>;

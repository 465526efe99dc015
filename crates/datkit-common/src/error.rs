//! Error types for datkit-common.

use thiserror::Error;

/// Common error type for datkit operations.
#[derive(Debug, Error)]
pub enum Error {
    /// End of buffer reached while reading a range that must be complete.
    #[error("unexpected end of buffer: needed {needed} bytes but only {available} available")]
    UnexpectedEof { needed: usize, available: usize },

    /// Value did not match expected.
    #[error("expected {field} to be {expected}, got {actual} at {position:#x}")]
    ExpectedValue {
        field: &'static str,
        expected: String,
        actual: String,
        position: usize,
    },

    /// Position arithmetic left the buffer.
    #[error("byte offset {offset} out of range for buffer of {len} bytes")]
    OffsetOutOfRange { offset: i64, len: usize },
}

/// Result type alias using the common Error type.
pub type Result<T> = std::result::Result<T, Error>;

//! Error types for DAT container decoding.

use datkit_common::ResourceId;
use thiserror::Error;

/// Errors that can occur while decoding a DAT container.
#[derive(Debug, Error)]
pub enum Error {
    /// Common library error.
    #[error("{0}")]
    Common(#[from] datkit_common::Error),

    /// The section framing or directory nesting is invalid.
    #[error("malformed container {resource} at {position:#x}: {reason}")]
    MalformedContainer {
        resource: String,
        position: usize,
        reason: String,
    },

    /// A decoder's sanity check on a correctness-critical field failed.
    #[error("unexpected value for {field} at {position:#x}: {value}")]
    UnexpectedValue {
        field: &'static str,
        value: String,
        position: usize,
    },

    /// A texture declared a compression tag this decoder does not know.
    #[error("unknown texture compression tag {0}")]
    UnknownCompression(ResourceId),

    /// An info section carried an unknown movement type.
    #[error("unknown movement type {0}")]
    UnknownMovementType(u8),

    /// The obfuscation collaborator rejected a section.
    #[error("deobfuscation failed: {0}")]
    Deobfuscation(String),

    /// A section decoder failed; carries the framing context.
    #[error("{resource}: section {tag} (type {type_code:#04x}) at {position:#x}: {source}")]
    Section {
        resource: String,
        tag: ResourceId,
        type_code: u8,
        position: usize,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    pub(crate) fn unexpected(field: &'static str, value: impl ToString, position: usize) -> Self {
        Self::UnexpectedValue {
            field,
            value: value.to_string(),
            position,
        }
    }
}

/// Result type for DAT decoding operations.
pub type Result<T> = std::result::Result<T, Error>;

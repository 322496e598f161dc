//! Codec error types

use thiserror::Error;

/// Result type for codec operations
pub type CodecResult<T> = Result<T, CodecError>;

/// Decoding failures for order-preserving encodings.
///
/// Both variants indicate on-disk corruption or an index format mismatch.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    /// The buffer does not hold a canonical varint
    #[error("malformed varint: {0}")]
    MalformedVarint(String),

    /// A composite key does not have the expected layout
    #[error("key decoding failed: {0}")]
    KeyDecoding(String),
}

impl CodecError {
    pub(crate) fn malformed(reason: impl Into<String>) -> Self {
        CodecError::MalformedVarint(reason.into())
    }

    pub(crate) fn key_decoding(reason: impl Into<String>) -> Self {
        CodecError::KeyDecoding(reason.into())
    }
}

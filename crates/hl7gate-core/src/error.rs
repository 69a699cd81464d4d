//! Codec error types.

use thiserror::Error;

/// Result type for codec operations.
pub type CodecResult<T> = Result<T, FormatError>;

/// A message that is not structurally well formed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormatError {
    /// The message does not start with the header segment name.
    #[error("invalid message: missing {expected} header")]
    MissingHeader { expected: &'static str },

    /// The message ends inside the encoding characters.
    #[error("invalid message: encoding section truncated after {available} characters")]
    TruncatedEncoding { available: usize },

    /// The character after the encoding characters is not the field separator.
    #[error("invalid message: erroneous encoding section (expected {expected:?}, found {found:?})")]
    EncodingMismatch { expected: char, found: char },
}

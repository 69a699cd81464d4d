//! Protocol error types.

use thiserror::Error;

/// Result type for protocol operations.
pub type ProtocolResult<T> = Result<T, ProtocolError>;

/// Faults detected while extracting frames from a byte stream.
///
/// All of these are recoverable: the framer resets its buffer and keeps
/// scanning.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    /// End sentinel received without a matching start sentinel.
    #[error("end of frame without start of frame ({discarded} bytes discarded)")]
    FramingViolation { discarded: usize },

    /// Accumulated frame reached the buffer limit.
    #[error("frame buffer limit of {limit} bytes reached, buffer flushed")]
    BufferOverflow { limit: usize },
}

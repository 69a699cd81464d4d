//! CLI error types.

use std::fmt;

use hl7gate_core::{FormatError, TracingError};
use hl7gate_server::{QueueError, ServerError};

/// Result type for CLI operations.
pub type CliResult<T> = Result<T, CliError>;

/// Errors that can occur in the CLI.
#[derive(Debug)]
pub enum CliError {
    /// Configuration error.
    Config(String),
    /// IO error.
    Io(std::io::Error),
    /// Message did not decode.
    Format(FormatError),
    /// JSON tree could not be read or written.
    Json(serde_json::Error),
    /// Message has no header to acknowledge.
    NoHeader,
    /// Gateway failure.
    Server(ServerError),
    /// Logging could not be initialized.
    Tracing(TracingError),
    /// Connection to a gateway failed.
    Connection(String),
    /// Request timed out.
    Timeout(String),
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "configuration error: {}", msg),
            Self::Io(err) => write!(f, "IO error: {}", err),
            Self::Format(err) => write!(f, "invalid message: {}", err),
            Self::Json(err) => write!(f, "invalid JSON tree: {}", err),
            Self::NoHeader => write!(f, "message has no MSH header"),
            Self::Server(err) => write!(f, "gateway error: {}", err),
            Self::Tracing(err) => write!(f, "logging setup failed: {}", err),
            Self::Connection(msg) => write!(f, "connection error: {}", msg),
            Self::Timeout(msg) => write!(f, "timeout: {}", msg),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            Self::Format(err) => Some(err),
            Self::Json(err) => Some(err),
            Self::Server(err) => Some(err),
            Self::Tracing(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for CliError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<FormatError> for CliError {
    fn from(err: FormatError) -> Self {
        Self::Format(err)
    }
}

impl From<serde_json::Error> for CliError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json(err)
    }
}

impl From<ServerError> for CliError {
    fn from(err: ServerError) -> Self {
        Self::Server(err)
    }
}

impl From<QueueError> for CliError {
    fn from(err: QueueError) -> Self {
        Self::Server(err.into())
    }
}

impl From<TracingError> for CliError {
    fn from(err: TracingError) -> Self {
        Self::Tracing(err)
    }
}

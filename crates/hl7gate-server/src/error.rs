//! Server error types.

use std::error::Error as StdError;
use std::io;
use std::net::SocketAddr;

use thiserror::Error;

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;

/// Result type for queue operations.
pub type QueueResult<T> = Result<T, QueueError>;

/// Boxed error returned by payload sinks and notifiers.
pub type BoxError = Box<dyn StdError + Send + Sync>;

/// Errors raised by the durable queue.
#[derive(Debug, Error)]
pub enum QueueError {
    /// The backing store rejected an operation.
    #[error("queue storage failure: {0}")]
    Storage(#[from] rusqlite::Error),

    /// Table names are spliced into SQL and must be plain identifiers.
    #[error("invalid queue table name: {name:?}")]
    InvalidTableName { name: String },

    /// The processing callback failed on an item.
    ///
    /// Items before `sequence_id` were removed; it and everything after it
    /// remain queued.
    #[error("processing failed for queue item {sequence_id}: {source}")]
    Callback {
        sequence_id: i64,
        #[source]
        source: BoxError,
    },

    /// A previous storage call panicked while holding the connection.
    #[error("queue connection lock poisoned")]
    Poisoned,

    /// A blocking storage task was cancelled or panicked.
    #[error("queue task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl QueueError {
    /// Creates an invalid table name error.
    pub fn invalid_table_name(name: impl Into<String>) -> Self {
        Self::InvalidTableName { name: name.into() }
    }

    /// Creates a callback error for the given item.
    pub fn callback(sequence_id: i64, source: impl Into<BoxError>) -> Self {
        Self::Callback {
            sequence_id,
            source: source.into(),
        }
    }
}

/// Errors that can occur in the server.
#[derive(Debug, Error)]
pub enum ServerError {
    /// IO error (socket, file, etc.).
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Durable queue error.
    #[error(transparent)]
    Queue(#[from] QueueError),

    /// Listener could not bind its endpoint.
    #[error("listener {name} failed to bind {addr}: {source}")]
    Bind {
        name: String,
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },

    /// Configuration error.
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Socket operation did not finish in time.
    #[error("Timeout during {operation}")]
    Timeout { operation: String },

    /// A background task panicked or was aborted.
    #[error("task {name} failed: {source}")]
    Task {
        name: &'static str,
        #[source]
        source: tokio::task::JoinError,
    },
}

impl ServerError {
    /// Creates a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates a timeout error.
    pub fn timeout(operation: impl Into<String>) -> Self {
        Self::Timeout {
            operation: operation.into(),
        }
    }

    /// Creates a bind error.
    pub fn bind(name: impl Into<String>, addr: SocketAddr, source: io::Error) -> Self {
        Self::Bind {
            name: name.into(),
            addr,
            source,
        }
    }
}

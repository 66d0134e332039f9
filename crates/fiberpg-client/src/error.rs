//! Client error types.
//!
//! Every failure carries a message and maps onto one of the coarse
//! [`Status`] outcomes hosts branch on. The status decides whether the
//! connection is still worth using; the message is for humans.

use thiserror::Error;

/// Errors that can occur during client operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Caller passed an argument of the wrong shape.
    #[error("usage error: {0}")]
    Usage(String),

    /// The wire library could not allocate a handle or a buffer.
    #[error("{0}")]
    Allocation(String),

    /// The connection has been closed and its handle released.
    #[error("connection closed")]
    ConnectionClosed,

    /// Establishing the connection failed.
    #[error("connection failed: {0}")]
    Connect(String),

    /// The connection broke while a statement was in flight.
    #[error("connection broken: {0}")]
    ConnectionBroken(String),

    /// The server rejected the statement. The connection is still usable.
    #[error("statement failed: {0}")]
    Statement(String),

    /// The server produced a result the client does not handle.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The calling task was cancelled while suspended.
    #[error("operation cancelled")]
    Cancelled,

    /// Another operation is already in flight on this connection.
    #[error("connection is busy with another operation")]
    Busy,

    /// Invalid configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// IO error while waiting on the socket.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Type conversion error.
    #[error("type error: {0}")]
    Type(#[from] fiberpg_types::TypeError),
}

/// Coarse outcome of an operation, as reported to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    /// The operation succeeded.
    Success,
    /// The statement failed but the connection remains usable.
    StatementFailed,
    /// The connection is broken or closed.
    ConnectionBroken,
    /// The calling task was cancelled.
    Cancelled,
}

impl Status {
    /// Get the numeric code hosts see: `1`, `0`, `-1` or `-2`.
    #[must_use]
    pub fn code(self) -> i32 {
        match self {
            Self::Success => 1,
            Self::StatementFailed => 0,
            Self::ConnectionBroken => -1,
            Self::Cancelled => -2,
        }
    }

    /// Get the status of an operation result.
    #[must_use]
    pub fn of<T>(result: &Result<T>) -> Self {
        match result {
            Ok(_) => Self::Success,
            Err(e) => e.status(),
        }
    }
}

impl Error {
    /// Map this error onto the host-visible status.
    #[must_use]
    pub fn status(&self) -> Status {
        match self {
            Self::Cancelled => Status::Cancelled,
            Self::Usage(_)
            | Self::Statement(_)
            | Self::Busy
            | Self::Config(_)
            | Self::Type(_) => Status::StatementFailed,
            Self::Allocation(_)
            | Self::ConnectionClosed
            | Self::Connect(_)
            | Self::ConnectionBroken(_)
            | Self::Protocol(_)
            | Self::Io(_) => Status::ConnectionBroken,
        }
    }

    /// Check if this error came from task cancellation.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Check if the connection should be discarded after this error.
    #[must_use]
    pub fn is_connection_unusable(&self) -> bool {
        self.status() == Status::ConnectionBroken
    }

    /// Check if this error indicates a client/server disagreement.
    #[must_use]
    pub fn is_protocol_error(&self) -> bool {
        matches!(self, Self::Protocol(_))
    }
}

/// Result type for client operations.
pub type Result<T> = std::result::Result<T, Error>;

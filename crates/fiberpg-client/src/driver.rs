//! The wire library boundary.
//!
//! The client never speaks the PostgreSQL protocol itself. It drives a
//! non-blocking wire library (libpq or anything shaped like it) through the
//! traits in this module and only decides *when* to call it, using the
//! scheduler to sleep until the socket is ready.
//!
//! Releasing a handle or a result is `Drop`. Implementations must close the
//! socket when a connection is dropped and free result memory when a result
//! is dropped.

use bytes::Bytes;
use fiberpg_types::{Oid, ParamBatch};

/// OS socket descriptor owned by a wire connection.
pub type SocketFd = i32;

/// Receiver for server notices.
pub type NoticeSink = Box<dyn Fn(&str) + Send + Sync>;

/// Coarse connection health reported by the wire library.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnStatus {
    /// Connected and usable.
    Ok,
    /// Failed or broken.
    Bad,
    /// Still establishing.
    Other,
}

/// Result of one non-blocking connection handshake step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollingStatus {
    /// Wait until the socket is readable, then poll again.
    Reading,
    /// Wait until the socket is writable, then poll again.
    Writing,
    /// Handshake complete.
    Ok,
    /// Handshake failed.
    Failed,
}

/// Status of one result produced by a statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecStatus {
    /// The query string was empty.
    EmptyQuery,
    /// A command that returns no rows completed.
    CommandOk,
    /// A query returning rows completed.
    TuplesOk,
    /// One row of a query in single-row mode.
    SingleTuple,
    /// COPY OUT started.
    CopyOut,
    /// COPY IN started.
    CopyIn,
    /// COPY BOTH started.
    CopyBoth,
    /// The server response was not understood.
    BadResponse,
    /// A non-fatal error (notice or warning).
    NonfatalError,
    /// The statement failed.
    FatalError,
    /// Pipeline synchronization point.
    PipelineSync,
    /// Pipeline aborted by an earlier error.
    PipelineAborted,
}

impl ExecStatus {
    /// Check if this result carries rows.
    #[must_use]
    pub fn has_tuples(self) -> bool {
        matches!(self, Self::TuplesOk | Self::SingleTuple)
    }

    /// Check if this result reports a failed statement.
    #[must_use]
    pub fn is_error(self) -> bool {
        matches!(self, Self::EmptyQuery | Self::NonfatalError | Self::FatalError)
    }
}

/// In-transaction status of a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionStatus {
    /// Idle, not in a transaction block.
    Idle,
    /// A command is in progress.
    Active,
    /// Idle inside a valid transaction block.
    InTransaction,
    /// Idle inside a failed transaction block.
    InError,
    /// The connection is bad.
    Unknown,
}

/// Factory for wire connections.
pub trait Driver {
    /// Connection handle type.
    type Conn: WireConnection;

    /// Begin a non-blocking connection attempt.
    ///
    /// Returns `None` when the library cannot allocate a handle. A handle
    /// whose status is already [`ConnStatus::Bad`] is returned as `Some`.
    fn connect_start(&self, conninfo: &str) -> Option<Self::Conn>;
}

/// A live wire-library connection handle.
pub trait WireConnection {
    /// Result handle type.
    type Result: WireResult;

    /// Get the coarse connection status.
    fn status(&self) -> ConnStatus;

    /// Advance the handshake by one non-blocking step.
    fn connect_poll(&mut self) -> PollingStatus;

    /// Get the socket descriptor. Can change during the handshake.
    fn socket(&self) -> SocketFd;

    /// Submit a plain statement. Returns `false` if submission failed.
    fn send_query(&mut self, sql: &str) -> bool;

    /// Submit a parameterized statement with text-format parameters.
    fn send_query_params(&mut self, sql: &str, params: &ParamBatch) -> bool;

    /// Read whatever input is available without blocking.
    fn consume_input(&mut self) -> bool;

    /// Check if fetching a result would block.
    fn is_busy(&self) -> bool;

    /// Fetch the next result; `None` once the statement is complete.
    fn get_result(&mut self) -> Option<Self::Result>;

    /// Get the in-transaction status.
    fn transaction_status(&self) -> TransactionStatus;

    /// Get the most recent error message.
    fn error_message(&self) -> String;

    /// Escape text as a quoted literal. `None` on allocation failure.
    fn escape_literal(&self, text: &[u8]) -> Option<Bytes>;

    /// Escape text as a quoted identifier. `None` on allocation failure.
    fn escape_identifier(&self, text: &[u8]) -> Option<Bytes>;

    /// Route server notices to `sink`.
    fn set_notice_sink(&mut self, sink: NoticeSink);
}

/// One result produced by a statement.
pub trait WireResult {
    /// Get the result status.
    fn status(&self) -> ExecStatus;

    /// Get the number of rows.
    fn ntuples(&self) -> usize;

    /// Get the number of columns.
    fn nfields(&self) -> usize;

    /// Get the name of a column.
    fn field_name(&self, col: usize) -> &str;

    /// Get the wire type of a column.
    fn field_type(&self, col: usize) -> Oid;

    /// Check if a value is NULL.
    fn is_null(&self, row: usize, col: usize) -> bool;

    /// Get the text of a value.
    fn value(&self, row: usize, col: usize) -> &[u8];

    /// Get the affected-row count as text; empty when not applicable.
    fn cmd_tuples(&self) -> &str;

    /// Get the command tag, e.g. `INSERT 0 3`.
    fn cmd_status(&self) -> &str;
}

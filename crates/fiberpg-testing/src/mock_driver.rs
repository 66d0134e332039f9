//! Scriptable in-memory wire library.
//!
//! [`MockDriver`] stands in for libpq. Each connection replays a scripted
//! handshake, answers statements from a table of canned responses, and
//! counts handle and result releases so tests can check that nothing leaks
//! and nothing is released twice.
//!
//! ## Example
//!
//! ```rust,ignore
//! use fiberpg_testing::mock_driver::{MockColumn, MockDriver, MockResponse};
//!
//! let driver = MockDriver::builder()
//!     .with_response(
//!         "SELECT id FROM users",
//!         MockResponse::rows(vec![MockColumn::int4("id")], vec![vec![Some("1")]]),
//!     )
//!     .build();
//! ```

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use bytes::Bytes;
use fiberpg_client::{
    ConnStatus, Driver, ExecStatus, NoticeSink, ParamBatch, PollingStatus, SocketFd,
    TransactionStatus, WireConnection, WireResult,
};
use fiberpg_types::oid::{self, Oid};
use parking_lot::Mutex;

/// Socket descriptor reported by mock connections unless configured.
pub const MOCK_FD: SocketFd = 42;

/// Column definition for mock row results.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockColumn {
    /// Column name.
    pub name: String,
    /// Wire type.
    pub oid: Oid,
}

impl MockColumn {
    /// Create a column with an explicit wire type.
    pub fn new(name: impl Into<String>, oid: Oid) -> Self {
        Self {
            name: name.into(),
            oid,
        }
    }

    /// Create an `int2` column.
    pub fn int2(name: impl Into<String>) -> Self {
        Self::new(name, oid::INT2)
    }

    /// Create an `int4` column.
    pub fn int4(name: impl Into<String>) -> Self {
        Self::new(name, oid::INT4)
    }

    /// Create an `int8` column.
    pub fn int8(name: impl Into<String>) -> Self {
        Self::new(name, oid::INT8)
    }

    /// Create a `numeric` column.
    pub fn numeric(name: impl Into<String>) -> Self {
        Self::new(name, oid::NUMERIC)
    }

    /// Create a `bool` column.
    pub fn boolean(name: impl Into<String>) -> Self {
        Self::new(name, oid::BOOL)
    }

    /// Create a `text` column.
    pub fn text(name: impl Into<String>) -> Self {
        Self::new(name, oid::TEXT)
    }
}

/// One scripted result.
///
/// Results handed out by a connection count their own release; clones kept
/// in the driver configuration do not.
#[derive(Clone)]
pub struct MockResult {
    status: ExecStatus,
    columns: Vec<MockColumn>,
    rows: Vec<Vec<Option<Bytes>>>,
    cmd_tuples: String,
    cmd_status: String,
    error: Option<String>,
    breaks_connection: bool,
    released: Option<Arc<AtomicUsize>>,
}

impl MockResult {
    fn with_status(status: ExecStatus) -> Self {
        Self {
            status,
            columns: Vec::new(),
            rows: Vec::new(),
            cmd_tuples: String::new(),
            cmd_status: String::new(),
            error: None,
            breaks_connection: false,
            released: None,
        }
    }

    /// A row result. `None` cells are NULL.
    pub fn rows(columns: Vec<MockColumn>, rows: Vec<Vec<Option<&str>>>) -> Self {
        let rows = rows
            .into_iter()
            .map(|row| {
                row.into_iter()
                    .map(|cell| cell.map(|s| Bytes::copy_from_slice(s.as_bytes())))
                    .collect()
            })
            .collect();
        Self::raw_rows(columns, rows)
    }

    /// A row result with raw byte cells.
    pub fn raw_rows(columns: Vec<MockColumn>, rows: Vec<Vec<Option<Bytes>>>) -> Self {
        let mut result = Self::with_status(ExecStatus::TuplesOk);
        result.cmd_tuples = rows.len().to_string();
        result.cmd_status = format!("SELECT {}", rows.len());
        result.columns = columns;
        result.rows = rows;
        result
    }

    /// A command result, e.g. `command("INSERT 0 3", Some(3))`.
    pub fn command(tag: impl Into<String>, affected: Option<u64>) -> Self {
        let mut result = Self::with_status(ExecStatus::CommandOk);
        result.cmd_tuples = affected.map(|n| n.to_string()).unwrap_or_default();
        result.cmd_status = tag.into();
        result
    }

    /// A statement error; the connection stays healthy.
    pub fn error(message: impl Into<String>) -> Self {
        let mut result = Self::with_status(ExecStatus::FatalError);
        result.error = Some(message.into());
        result
    }

    /// A statement error that also breaks the connection.
    pub fn fatal(message: impl Into<String>) -> Self {
        let mut result = Self::error(message);
        result.breaks_connection = true;
        result
    }

    /// The result of an empty query string.
    pub fn empty_query() -> Self {
        Self::with_status(ExecStatus::EmptyQuery)
    }

    /// A result with an arbitrary status and no content.
    pub fn status(status: ExecStatus) -> Self {
        Self::with_status(status)
    }
}

impl fmt::Debug for MockResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MockResult")
            .field("status", &self.status)
            .field("columns", &self.columns)
            .field("rows", &self.rows.len())
            .field("cmd_status", &self.cmd_status)
            .field("error", &self.error)
            .finish()
    }
}

impl Drop for MockResult {
    fn drop(&mut self) {
        if let Some(released) = &self.released {
            released.fetch_add(1, Ordering::SeqCst);
        }
    }
}

impl WireResult for MockResult {
    fn status(&self) -> ExecStatus {
        self.status
    }

    fn ntuples(&self) -> usize {
        self.rows.len()
    }

    fn nfields(&self) -> usize {
        self.columns.len()
    }

    fn field_name(&self, col: usize) -> &str {
        self.columns.get(col).map_or("", |c| c.name.as_str())
    }

    fn field_type(&self, col: usize) -> Oid {
        self.columns.get(col).map_or(oid::UNTYPED, |c| c.oid)
    }

    fn is_null(&self, row: usize, col: usize) -> bool {
        self.cell(row, col).is_none()
    }

    fn value(&self, row: usize, col: usize) -> &[u8] {
        self.cell(row, col).map_or(&[][..], |b| &b[..])
    }

    fn cmd_tuples(&self) -> &str {
        &self.cmd_tuples
    }

    fn cmd_status(&self) -> &str {
        &self.cmd_status
    }
}

impl MockResult {
    fn cell(&self, row: usize, col: usize) -> Option<&Bytes> {
        self.rows.get(row)?.get(col)?.as_ref()
    }
}

/// Scripted answer to one statement.
#[derive(Debug, Clone, Default)]
pub struct MockResponse {
    results: Vec<MockResult>,
    busy_waits: usize,
    send_failure: Option<(String, bool)>,
    consume_failure: Option<(String, bool)>,
}

impl MockResponse {
    /// Answer with a sequence of results.
    pub fn results(results: Vec<MockResult>) -> Self {
        Self {
            results,
            ..Self::default()
        }
    }

    /// Answer with one row result.
    pub fn rows(columns: Vec<MockColumn>, rows: Vec<Vec<Option<&str>>>) -> Self {
        Self::results(vec![MockResult::rows(columns, rows)])
    }

    /// Answer with one command result.
    pub fn command(tag: impl Into<String>, affected: Option<u64>) -> Self {
        Self::results(vec![MockResult::command(tag, affected)])
    }

    /// Answer with one statement error.
    pub fn error(message: impl Into<String>) -> Self {
        Self::results(vec![MockResult::error(message)])
    }

    /// Refuse to submit the statement. `broken` also breaks the connection.
    pub fn reject_send(message: impl Into<String>, broken: bool) -> Self {
        Self {
            send_failure: Some((message.into(), broken)),
            ..Self::default()
        }
    }

    /// Require `waits` readiness waits before results become available.
    #[must_use]
    pub fn with_busy_waits(mut self, waits: usize) -> Self {
        self.busy_waits = waits;
        self
    }

    /// Fail the first input read after submission.
    #[must_use]
    pub fn fail_consume(mut self, message: impl Into<String>, broken: bool) -> Self {
        self.consume_failure = Some((message.into(), broken));
        self
    }
}

/// A statement as it was submitted.
#[derive(Debug, Clone, PartialEq)]
pub struct SentQuery {
    /// Statement text.
    pub sql: String,
    /// Parameters, `None` when sent without a parameter list.
    pub params: Option<ParamBatch>,
}

/// Release and usage counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MockStats {
    /// Handles handed out by `connect_start`.
    pub handles_opened: usize,
    /// Handles dropped.
    pub handles_released: usize,
    /// Results handed out by `get_result`.
    pub results_fetched: usize,
    /// Fetched results dropped.
    pub results_released: usize,
}

impl MockStats {
    /// Get the number of handles not yet released.
    #[must_use]
    pub fn live_handles(&self) -> usize {
        self.handles_opened - self.handles_released
    }
}

struct MockConfig {
    responses: HashMap<String, MockResponse>,
    default_response: MockResponse,
    handshake: Vec<PollingStatus>,
    start_status: ConnStatus,
    start_error: String,
    handshake_error: String,
    fail_allocation: bool,
    fail_escape: bool,
    fd: SocketFd,
}

struct Shared {
    config: MockConfig,
    transaction_status: Mutex<TransactionStatus>,
    sent: Mutex<Vec<SentQuery>>,
    conninfos: Mutex<Vec<String>>,
    notice_sink: Mutex<Option<NoticeSink>>,
    handles_opened: AtomicUsize,
    handles_released: AtomicUsize,
    results_fetched: AtomicUsize,
    results_released: Arc<AtomicUsize>,
}

/// Builder for [`MockDriver`].
pub struct MockDriverBuilder {
    config: MockConfig,
}

impl MockDriverBuilder {
    /// Create a new builder with default settings.
    ///
    /// Defaults: the handshake completes after one write and one read
    /// wait, and unmatched statements answer `SELECT 0` with no rows.
    pub fn new() -> Self {
        Self {
            config: MockConfig {
                responses: HashMap::new(),
                default_response: MockResponse::rows(Vec::new(), Vec::new()),
                handshake: vec![
                    PollingStatus::Writing,
                    PollingStatus::Reading,
                    PollingStatus::Ok,
                ],
                start_status: ConnStatus::Other,
                start_error: String::new(),
                handshake_error: "could not connect to server: Connection refused".to_string(),
                fail_allocation: false,
                fail_escape: false,
                fd: MOCK_FD,
            },
        }
    }

    /// Add a response for a specific SQL statement.
    pub fn with_response(mut self, sql: impl Into<String>, response: MockResponse) -> Self {
        self.config.responses.insert(sql.into(), response);
        self
    }

    /// Set the response for unmatched statements.
    pub fn with_default_response(mut self, response: MockResponse) -> Self {
        self.config.default_response = response;
        self
    }

    /// Set the sequence of handshake step results.
    ///
    /// Once the sequence is exhausted further steps report `Ok`.
    pub fn with_handshake(mut self, steps: Vec<PollingStatus>) -> Self {
        self.config.handshake = steps;
        self
    }

    /// Make the handshake fail after the given steps with `message`.
    pub fn failing_handshake(mut self, steps: Vec<PollingStatus>, message: impl Into<String>) -> Self {
        self.config.handshake = steps;
        self.config.handshake.push(PollingStatus::Failed);
        self.config.handshake_error = message.into();
        self
    }

    /// Hand out handles that are already broken.
    pub fn broken_at_start(mut self, message: impl Into<String>) -> Self {
        self.config.start_status = ConnStatus::Bad;
        self.config.start_error = message.into();
        self
    }

    /// Fail every handle allocation.
    pub fn failing_allocation(mut self) -> Self {
        self.config.fail_allocation = true;
        self
    }

    /// Fail every escape call.
    pub fn failing_escape(mut self) -> Self {
        self.config.fail_escape = true;
        self
    }

    /// Set the socket descriptor reported by connections.
    pub fn with_fd(mut self, fd: SocketFd) -> Self {
        self.config.fd = fd;
        self
    }

    /// Build the driver.
    pub fn build(self) -> MockDriver {
        MockDriver {
            shared: Arc::new(Shared {
                config: self.config,
                transaction_status: Mutex::new(TransactionStatus::Idle),
                sent: Mutex::new(Vec::new()),
                conninfos: Mutex::new(Vec::new()),
                notice_sink: Mutex::new(None),
                handles_opened: AtomicUsize::new(0),
                handles_released: AtomicUsize::new(0),
                results_fetched: AtomicUsize::new(0),
                results_released: Arc::new(AtomicUsize::new(0)),
            }),
        }
    }
}

impl Default for MockDriverBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// In-memory wire library for tests.
///
/// Cloning shares scripts and counters.
#[derive(Clone)]
pub struct MockDriver {
    shared: Arc<Shared>,
}

impl MockDriver {
    /// Create a new builder for the mock driver.
    pub fn builder() -> MockDriverBuilder {
        MockDriverBuilder::new()
    }

    /// Get the release and usage counters.
    pub fn stats(&self) -> MockStats {
        MockStats {
            handles_opened: self.shared.handles_opened.load(Ordering::SeqCst),
            handles_released: self.shared.handles_released.load(Ordering::SeqCst),
            results_fetched: self.shared.results_fetched.load(Ordering::SeqCst),
            results_released: self.shared.results_released.load(Ordering::SeqCst),
        }
    }

    /// Get every statement submitted so far.
    pub fn sent_queries(&self) -> Vec<SentQuery> {
        self.shared.sent.lock().clone()
    }

    /// Get every conninfo string passed to `connect_start`.
    pub fn conninfos(&self) -> Vec<String> {
        self.shared.conninfos.lock().clone()
    }

    /// Set the transaction status reported by healthy connections.
    pub fn set_transaction_status(&self, status: TransactionStatus) {
        *self.shared.transaction_status.lock() = status;
    }

    /// Deliver a server notice. Returns `false` if no sink is installed.
    pub fn emit_notice(&self, message: &str) -> bool {
        match self.shared.notice_sink.lock().as_ref() {
            Some(sink) => {
                sink(message);
                true
            }
            None => false,
        }
    }
}

impl fmt::Debug for MockDriver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MockDriver")
            .field("stats", &self.stats())
            .finish()
    }
}

impl Driver for MockDriver {
    type Conn = MockConnection;

    fn connect_start(&self, conninfo: &str) -> Option<MockConnection> {
        self.shared.conninfos.lock().push(conninfo.to_string());
        let config = &self.shared.config;
        if config.fail_allocation {
            return None;
        }

        self.shared.handles_opened.fetch_add(1, Ordering::SeqCst);
        Some(MockConnection {
            shared: Arc::clone(&self.shared),
            handshake: config.handshake.iter().copied().collect(),
            status: config.start_status,
            error_message: config.start_error.clone(),
            pending: VecDeque::new(),
            busy_waits: 0,
            fresh_submission: false,
            consume_failure: None,
        })
    }
}

/// Connection handle handed out by [`MockDriver`].
pub struct MockConnection {
    shared: Arc<Shared>,
    handshake: VecDeque<PollingStatus>,
    status: ConnStatus,
    error_message: String,
    pending: VecDeque<MockResult>,
    busy_waits: usize,
    fresh_submission: bool,
    consume_failure: Option<(String, bool)>,
}

impl MockConnection {
    fn fail(&mut self, message: String, broken: bool) {
        self.error_message = message;
        if broken {
            self.status = ConnStatus::Bad;
        }
    }

    fn submit(&mut self, sql: &str, params: Option<&ParamBatch>) -> bool {
        self.shared.sent.lock().push(SentQuery {
            sql: sql.to_string(),
            params: params.cloned(),
        });

        let config = &self.shared.config;
        let response = config
            .responses
            .get(sql)
            .unwrap_or(&config.default_response)
            .clone();

        if let Some((message, broken)) = response.send_failure {
            self.fail(message, broken);
            return false;
        }

        self.error_message.clear();
        self.pending = response.results.into();
        self.busy_waits = response.busy_waits;
        self.consume_failure = response.consume_failure;
        self.fresh_submission = true;
        true
    }
}

impl Drop for MockConnection {
    fn drop(&mut self) {
        self.shared.handles_released.fetch_add(1, Ordering::SeqCst);
    }
}

impl WireConnection for MockConnection {
    type Result = MockResult;

    fn status(&self) -> ConnStatus {
        self.status
    }

    fn connect_poll(&mut self) -> PollingStatus {
        let step = self.handshake.pop_front().unwrap_or(PollingStatus::Ok);
        match step {
            PollingStatus::Ok => self.status = ConnStatus::Ok,
            PollingStatus::Failed => {
                let message = self.shared.config.handshake_error.clone();
                self.fail(message, true);
            }
            PollingStatus::Reading | PollingStatus::Writing => {}
        }
        step
    }

    fn socket(&self) -> SocketFd {
        self.shared.config.fd
    }

    fn send_query(&mut self, sql: &str) -> bool {
        self.submit(sql, None)
    }

    fn send_query_params(&mut self, sql: &str, params: &ParamBatch) -> bool {
        self.submit(sql, Some(params))
    }

    fn consume_input(&mut self) -> bool {
        if let Some((message, broken)) = self.consume_failure.take() {
            self.fail(message, broken);
            return false;
        }
        // The read right after submission never completes a wait.
        if self.fresh_submission {
            self.fresh_submission = false;
        } else {
            self.busy_waits = self.busy_waits.saturating_sub(1);
        }
        true
    }

    fn is_busy(&self) -> bool {
        self.busy_waits > 0
    }

    fn get_result(&mut self) -> Option<MockResult> {
        let mut result = self.pending.pop_front()?;
        if let Some(message) = &result.error {
            let message = message.clone();
            let broken = result.breaks_connection;
            self.fail(message, broken);
        }
        self.shared.results_fetched.fetch_add(1, Ordering::SeqCst);
        result.released = Some(Arc::clone(&self.shared.results_released));
        Some(result)
    }

    fn transaction_status(&self) -> TransactionStatus {
        if self.status == ConnStatus::Bad {
            TransactionStatus::Unknown
        } else {
            *self.shared.transaction_status.lock()
        }
    }

    fn error_message(&self) -> String {
        self.error_message.clone()
    }

    fn escape_literal(&self, text: &[u8]) -> Option<Bytes> {
        if self.shared.config.fail_escape {
            return None;
        }
        let text = String::from_utf8_lossy(text);
        let mut out = String::with_capacity(text.len() + 3);
        if text.contains('\\') {
            out.push_str(" E");
        }
        out.push('\'');
        for c in text.chars() {
            match c {
                '\'' => out.push_str("''"),
                '\\' => out.push_str("\\\\"),
                c => out.push(c),
            }
        }
        out.push('\'');
        Some(Bytes::from(out))
    }

    fn escape_identifier(&self, text: &[u8]) -> Option<Bytes> {
        if self.shared.config.fail_escape {
            return None;
        }
        let text = String::from_utf8_lossy(text);
        Some(Bytes::from(format!("\"{}\"", text.replace('"', "\"\""))))
    }

    fn set_notice_sink(&mut self, sink: NoticeSink) {
        *self.shared.notice_sink.lock() = Some(sink);
    }
}

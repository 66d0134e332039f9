//! Statement execution and the result stream.
//!
//! A statement is submitted once and then drained: consume input, wait for
//! readability while the handle is busy, fetch the next result, classify it
//! and release it, until the wire library reports no more results.
//!
//! Row results are decoded until the first command, error or unexpected
//! result decides the outcome. Everything after that is still fetched, so
//! the protocol stream is fully consumed, but released unread.

use std::collections::HashSet;
use std::sync::Arc;

use fiberpg_types::{DecimalPolicy, Oid, decode_column};
use tracing::Instrument;

use crate::connection::{Connection, connection_failure};
use crate::driver::{ExecStatus, WireConnection, WireResult};
use crate::error::{Error, Result};
use crate::instrumentation::{DB_SYSTEM, attributes, extract_operation, span_names};
use crate::poll::{Poller, ensure_not_cancelled};
use crate::query::Query;
use crate::result::{CommandStatus, QueryOutput, ResultSet, Row};
use crate::scheduler::{Interest, Scheduler};
use crate::state::QueryPhase;

/// Message reported for result statuses the client does not handle.
pub const UNWANTED_STATUS: &str = "unwanted execution result status";

impl<C: WireConnection> Connection<C> {
    /// Execute a statement and collect its results.
    ///
    /// Without parameters the statement is sent as-is and may contain
    /// several `;`-separated commands. With parameters it is sent as one
    /// parameterized statement with text-format values.
    ///
    /// # Errors
    ///
    /// - [`Error::Statement`] when the server rejects the statement; the
    ///   connection stays usable.
    /// - [`Error::ConnectionBroken`] when the connection broke.
    /// - [`Error::Protocol`] for an unexpected result status.
    /// - [`Error::Cancelled`] when the task was cancelled while waiting.
    ///   Remaining results are left unread.
    /// - [`Error::Busy`] when another operation is in flight.
    pub async fn execute<S: Scheduler>(
        &self,
        scheduler: &S,
        query: impl Into<Query>,
    ) -> Result<QueryOutput> {
        let query = query.into();
        let _in_flight = self.begin_operation()?;

        let span = tracing::debug_span!(
            span_names::EXECUTE,
            db.system = DB_SYSTEM,
            db.operation = extract_operation(query.sql()),
            db.statement = %self.config().sanitization.sanitize(query.sql()),
            db.rows_affected = tracing::field::Empty,
        );

        let result = self.run_query(scheduler, query).instrument(span.clone()).await;
        match &result {
            Ok(output) => {
                span.record(attributes::DB_ROWS_AFFECTED, output.rows_affected());
            }
            Err(e) => {
                let _enter = span.enter();
                tracing::debug!(error = %e, status = e.status().code(), "statement failed");
            }
        }
        result
    }

    async fn run_query<S: Scheduler>(&self, scheduler: &S, query: Query) -> Result<QueryOutput> {
        query.validate()?;
        self.ensure_ready()?;

        // The policy, and any cast it owns, is dropped when this call returns.
        let (sql, params, mut policy) = query.into_parts();

        ensure_not_cancelled(scheduler)?;
        let fd = self.with_handle(|conn| {
            let sent = match &params {
                Some(batch) => conn.send_query_params(&sql, batch),
                None => conn.send_query(&sql),
            };
            if sent {
                Ok(conn.socket())
            } else {
                Err(connection_failure(conn))
            }
        })??;
        tracing::trace!(
            fd,
            params = params.as_ref().map_or(0, |p| p.len()),
            policy = policy.name(),
            "statement submitted"
        );

        let poller = Poller::new(scheduler, self.config().wait_timeout);
        let mut collector = ResultCollector::new(&mut policy);

        loop {
            ensure_not_cancelled(scheduler)?;
            let ready = self.with_handle(|conn| {
                if conn.consume_input() {
                    Ok(!conn.is_busy())
                } else {
                    Err(connection_failure(conn))
                }
            })??;
            if !ready {
                poller.wait(fd, Interest::Readable).await?;
                continue;
            }

            let fetched = self.with_handle(|conn| {
                conn.get_result().map(|result| {
                    let failure = result
                        .status()
                        .is_error()
                        .then(|| result_failure(conn, result.status()));
                    (result, failure)
                })
            })?;

            match fetched {
                Some((result, failure)) => collector.accept(result, failure),
                None => break,
            }
        }

        collector.finish()
    }
}

fn result_failure<C: WireConnection>(conn: &C, status: ExecStatus) -> Error {
    match connection_failure(conn) {
        Error::Statement(message) if message.is_empty() && status == ExecStatus::EmptyQuery => {
            Error::Statement("empty query".into())
        }
        other => other,
    }
}

/// Folds fetched results into the call outcome.
struct ResultCollector<'p> {
    policy: &'p mut DecimalPolicy,
    phase: QueryPhase,
    sets: Vec<ResultSet>,
    command: Option<CommandStatus>,
    failure: Option<Error>,
    discarded: usize,
}

impl<'p> ResultCollector<'p> {
    fn new(policy: &'p mut DecimalPolicy) -> Self {
        Self {
            policy,
            phase: QueryPhase::Collecting,
            sets: Vec::new(),
            command: None,
            failure: None,
            discarded: 0,
        }
    }

    /// Classify one result. The result is released on return.
    fn accept<R: WireResult>(&mut self, result: R, failure: Option<Error>) {
        let status = result.status();

        if !self.phase.is_collecting() {
            self.discarded += 1;
            tracing::trace!(?status, "discarding result");
            return;
        }

        match status {
            ExecStatus::TuplesOk | ExecStatus::SingleTuple => {
                let set = decode_result_set(&result, self.sets.len() + 1, self.policy);
                tracing::trace!(index = set.index(), rows = set.len(), "result set decoded");
                self.sets.push(set);
            }
            ExecStatus::CommandOk => {
                let command = CommandStatus::from_wire(result.cmd_tuples(), result.cmd_status());
                tracing::trace!(message = %command.message, rows = command.rows_affected, "command complete");
                self.command = Some(command);
                self.phase = QueryPhase::Discarding;
            }
            ExecStatus::EmptyQuery | ExecStatus::NonfatalError | ExecStatus::FatalError => {
                let error = failure.unwrap_or_else(|| Error::Statement(String::new()));
                tracing::trace!(?status, error = %error, "statement error");
                self.failure = Some(error);
                self.phase = QueryPhase::Discarding;
            }
            other => {
                tracing::debug!(status = ?other, "unexpected result status");
                self.failure = Some(Error::Protocol(UNWANTED_STATUS.into()));
                self.phase = QueryPhase::Discarding;
            }
        }
    }

    fn finish(self) -> Result<QueryOutput> {
        if self.discarded > 0 {
            tracing::debug!(discarded = self.discarded, "drained results after outcome was decided");
        }
        match self.failure {
            Some(error) => Err(error),
            None => Ok(QueryOutput::new(self.sets, self.command)),
        }
    }
}

/// Decode every row of a row-returning result.
fn decode_result_set<R: WireResult>(
    result: &R,
    index: usize,
    policy: &mut DecimalPolicy,
) -> ResultSet {
    let columns: Vec<(Arc<str>, Oid)> = (0..result.nfields())
        .map(|col| (Arc::from(result.field_name(col)), result.field_type(col)))
        .collect();

    // Names are the same for every row; only repeated names need the
    // replacing insert.
    let mut seen = HashSet::with_capacity(columns.len());
    let unique_names = columns.iter().all(|(name, _)| seen.insert(Arc::clone(name)));

    let rows = (0..result.ntuples())
        .map(|row| {
            let mut decoded = Row::with_capacity(columns.len());
            for (col, (name, oid)) in columns.iter().enumerate() {
                let raw = (!result.is_null(row, col)).then(|| result.value(row, col));
                if let Some(value) = decode_column(raw, *oid, policy) {
                    if unique_names {
                        decoded.push(Arc::clone(name), value);
                    } else {
                        decoded.insert(Arc::clone(name), value);
                    }
                }
            }
            decoded
        })
        .collect();

    ResultSet::new(
        index,
        rows,
        CommandStatus::from_wire(result.cmd_tuples(), result.cmd_status()),
    )
}

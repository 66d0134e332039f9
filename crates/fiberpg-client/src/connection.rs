//! Connection lifecycle.
//!
//! A [`Connection`] exclusively owns one wire-library handle. The handshake
//! is driven step by step: each non-blocking advance tells us which socket
//! condition to wait for, and the task sleeps on the scheduler until then.
//!
//! The handle is released exactly once: by a failed handshake, by
//! [`Connection::close`], or when the connection is dropped.
//!
//! Only one establish or execute call may be in flight at a time. A second
//! concurrent call fails with [`Error::Busy`] instead of interleaving
//! protocol traffic.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use tracing::Instrument;

use crate::config::Config;
use crate::driver::{ConnStatus, Driver, NoticeSink, SocketFd, TransactionStatus, WireConnection};
use crate::error::{Error, Result};
use crate::instrumentation::{DB_SYSTEM, NOTICE_TARGET, attributes, span_names};
use crate::poll::{Poller, ensure_not_cancelled};
use crate::scheduler::Scheduler;
use crate::state::ConnectState;

struct Inner<C> {
    handle: Option<C>,
    state: ConnectState,
}

/// A non-blocking connection to a PostgreSQL server.
///
/// All methods take `&self`; the handle sits behind a lock that is only
/// held for single non-blocking wire calls, never across a wait.
///
/// ```rust,ignore
/// let scheduler = TokioScheduler::new();
/// let conn = Connection::connect(&driver, Config::from_conninfo("dbname=app")?, &scheduler).await?;
/// let out = conn.execute(&scheduler, Query::new("SELECT $1::int AS n").bind(7)).await?;
/// assert_eq!(out.rows()[0].get::<f64>("n")?, 7.0);
/// conn.close();
/// ```
pub struct Connection<C: WireConnection> {
    inner: Mutex<Inner<C>>,
    in_flight: AtomicBool,
    config: Config,
}

/// Marks an operation in flight until dropped.
pub(crate) struct InFlight<'a> {
    flag: &'a AtomicBool,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

impl<C: WireConnection> Connection<C> {
    /// Start a non-blocking handshake.
    ///
    /// Fails immediately if the wire library cannot allocate a handle or
    /// reports the handle broken from the start. Call
    /// [`Connection::establish`] to finish the handshake.
    pub fn start<D>(driver: &D, config: Config) -> Result<Self>
    where
        D: Driver<Conn = C>,
    {
        let conninfo = config.to_conninfo();
        let Some(conn) = driver.connect_start(&conninfo) else {
            tracing::debug!("wire library could not allocate a connection handle");
            return Err(Error::Allocation(
                "can't allocate PG connection structure".into(),
            ));
        };

        if conn.status() == ConnStatus::Bad {
            let message = conn.error_message();
            drop(conn);
            tracing::debug!(error = %message.trim_end(), "connection failed at start");
            return Err(Error::Connect(message));
        }

        tracing::trace!(fd = conn.socket(), "handshake started");
        Ok(Self {
            inner: Mutex::new(Inner {
                handle: Some(conn),
                state: ConnectState::Initiating,
            }),
            in_flight: AtomicBool::new(false),
            config,
        })
    }

    /// Start a handshake and drive it to completion.
    ///
    /// The handle is released if the handshake fails or is cancelled. Use
    /// [`Connection::start`] and [`Connection::establish`] to keep a
    /// cancelled handshake around for resuming.
    pub async fn connect<D, S>(driver: &D, config: Config, scheduler: &S) -> Result<Self>
    where
        D: Driver<Conn = C>,
        S: Scheduler,
    {
        let conn = Self::start(driver, config)?;
        conn.establish(scheduler).await?;
        Ok(conn)
    }

    /// Drive the handshake until the connection is ready.
    ///
    /// Returns immediately when already ready. On failure the handle is
    /// released and the error carries the wire library's message. On
    /// cancellation the handle is kept; call `establish` again to resume,
    /// or [`Connection::close`] to give up.
    pub async fn establish<S: Scheduler>(&self, scheduler: &S) -> Result<()> {
        let _in_flight = self.begin_operation()?;
        let span = tracing::debug_span!(
            span_names::CONNECT,
            db.system = DB_SYSTEM,
            db.connection.fd = tracing::field::Empty,
        );
        self.drive_handshake(scheduler).instrument(span).await
    }

    async fn drive_handshake<S: Scheduler>(&self, scheduler: &S) -> Result<()> {
        if self.state().is_ready() {
            return Ok(());
        }
        let poller = Poller::new(scheduler, self.config.wait_timeout);

        loop {
            if let Err(e) = ensure_not_cancelled(scheduler) {
                self.mark_cancelled();
                return Err(e);
            }
            let (state, fd) = self.advance_handshake()?;
            match state {
                ConnectState::Ready => return Ok(()),
                ConnectState::PollingRead | ConnectState::PollingWrite => {
                    let Some(interest) = state.interest() else {
                        continue;
                    };
                    if let Err(e) = poller.wait(fd, interest).await {
                        if e.is_cancelled() {
                            self.mark_cancelled();
                        }
                        return Err(e);
                    }
                }
                other => {
                    return Err(Error::Protocol(format!(
                        "handshake stopped in state {other}"
                    )));
                }
            }
        }
    }

    /// Run one handshake step under the lock.
    fn advance_handshake(&self) -> Result<(ConnectState, SocketFd)> {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;

        match inner.state {
            ConnectState::Ready => return Ok((ConnectState::Ready, -1)),
            ConnectState::Failed | ConnectState::Closed => return Err(Error::ConnectionClosed),
            _ => {}
        }
        let Some(conn) = inner.handle.as_mut() else {
            return Err(Error::ConnectionClosed);
        };

        let poll = conn.connect_poll();
        let fd = conn.socket();
        let next = inner.state.advance(poll);
        tracing::trace!(fd, ?poll, from = %inner.state, to = %next, "handshake step");
        inner.state = next;

        match next {
            ConnectState::Ready => {
                if self.config.log_notices {
                    conn.set_notice_sink(notice_sink());
                }
                tracing::Span::current().record(attributes::DB_CONNECTION_FD, fd);
                tracing::debug!(fd, "connection established");
            }
            ConnectState::Failed => {
                let message = conn.error_message();
                inner.handle = None;
                tracing::debug!(error = %message.trim_end(), "handshake failed, handle released");
                return Err(Error::Connect(message));
            }
            _ => {}
        }
        Ok((next, fd))
    }

    fn mark_cancelled(&self) {
        let mut inner = self.inner.lock();
        if inner.handle.is_some() && inner.state.is_establishing() {
            inner.state = ConnectState::Cancelled;
            tracing::debug!("handshake cancelled, handle kept");
        }
    }

    /// Close the connection and release the handle.
    ///
    /// Returns `false` if it was already closed. Closing while another
    /// operation is suspended makes that operation fail with
    /// [`Error::ConnectionClosed`] when it resumes.
    pub fn close(&self) -> bool {
        let _span = tracing::debug_span!(span_names::CLOSE, db.system = DB_SYSTEM).entered();
        let handle = {
            let mut inner = self.inner.lock();
            let handle = inner.handle.take();
            if handle.is_some() {
                inner.state = ConnectState::Closed;
            }
            handle
        };

        match handle {
            Some(conn) => {
                drop(conn);
                tracing::debug!("connection closed");
                true
            }
            None => {
                tracing::trace!("close on already closed connection");
                false
            }
        }
    }

    /// Check if the connection is inside a transaction block.
    ///
    /// `true` while a command is active or a transaction (possibly failed)
    /// is open. A bad connection is reported as [`Error::ConnectionBroken`].
    pub fn transaction_active(&self) -> Result<bool> {
        self.with_handle(|conn| match conn.transaction_status() {
            TransactionStatus::Idle => Ok(false),
            TransactionStatus::Active
            | TransactionStatus::InTransaction
            | TransactionStatus::InError => Ok(true),
            TransactionStatus::Unknown => Err(Error::ConnectionBroken(conn.error_message())),
        })?
    }

    /// Get the socket descriptor, if the handle is still held.
    #[must_use]
    pub fn socket(&self) -> Option<SocketFd> {
        self.inner.lock().handle.as_ref().map(|c| c.socket())
    }

    /// Get the lifecycle state.
    #[must_use]
    pub fn state(&self) -> ConnectState {
        self.inner.lock().state
    }

    /// Check if the handle has been released.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.lock().handle.is_none()
    }

    /// Check if an operation is in flight.
    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Get the configuration.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Claim the connection for one operation.
    pub(crate) fn begin_operation(&self) -> Result<InFlight<'_>> {
        self.in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| Error::Busy)?;
        Ok(InFlight {
            flag: &self.in_flight,
        })
    }

    /// Run `f` against the handle under the lock.
    pub(crate) fn with_handle<T>(&self, f: impl FnOnce(&mut C) -> T) -> Result<T> {
        let mut inner = self.inner.lock();
        let conn = inner.handle.as_mut().ok_or(Error::ConnectionClosed)?;
        Ok(f(conn))
    }

    /// Fail unless the handshake has completed and the handle is held.
    pub(crate) fn ensure_ready(&self) -> Result<()> {
        let inner = self.inner.lock();
        if inner.handle.is_none() {
            return Err(Error::ConnectionClosed);
        }
        if !inner.state.is_ready() {
            return Err(Error::Usage(format!(
                "connection is not established (state: {})",
                inner.state
            )));
        }
        Ok(())
    }
}

/// Classify a failure reported by the handle.
pub(crate) fn connection_failure<C: WireConnection>(conn: &C) -> Error {
    let message = conn.error_message();
    if conn.status() == ConnStatus::Bad {
        Error::ConnectionBroken(message)
    } else {
        Error::Statement(message)
    }
}

fn notice_sink() -> NoticeSink {
    Box::new(|message: &str| {
        tracing::info!(target: NOTICE_TARGET, "PostgreSQL: {}", message.trim_end());
    })
}

impl<C: WireConnection> Drop for Connection<C> {
    fn drop(&mut self) {
        if let Some(conn) = self.inner.get_mut().handle.take() {
            drop(conn);
            tracing::trace!("connection dropped without close, handle released");
        }
    }
}

impl<C: WireConnection> fmt::Display for Connection<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.lock();
        match &inner.handle {
            Some(conn) => write!(f, "fiberpg connection (fd {}, {})", conn.socket(), inner.state),
            None => f.write_str("fiberpg connection (closed)"),
        }
    }
}

impl<C: WireConnection> fmt::Debug for Connection<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("Connection")
            .field("state", &inner.state)
            .field("closed", &inner.handle.is_none())
            .field("in_flight", &self.in_flight.load(Ordering::Relaxed))
            .field("config", &self.config)
            .finish()
    }
}

//! Readiness poll loop.
//!
//! Suspends the calling task until the socket is ready. Timeouts and
//! spurious wakeups are retried; cancellation is checked before every wait
//! and ends the loop with [`Error::Cancelled`], distinct from I/O failure.

use std::time::Duration;

use crate::driver::SocketFd;
use crate::error::{Error, Result};
use crate::scheduler::{Interest, Readiness, Scheduler};

/// Waits on one scheduler with a fixed per-wait timeout.
#[derive(Debug)]
pub struct Poller<'s, S> {
    scheduler: &'s S,
    timeout: Duration,
}

impl<'s, S: Scheduler> Poller<'s, S> {
    /// Create a poller.
    pub fn new(scheduler: &'s S, timeout: Duration) -> Self {
        Self { scheduler, timeout }
    }

    /// Get the scheduler.
    pub fn scheduler(&self) -> &'s S {
        self.scheduler
    }

    /// Wait until `fd` is ready for `interest`.
    pub async fn wait(&self, fd: SocketFd, interest: Interest) -> Result<()> {
        wait_ready(self.scheduler, fd, interest, self.timeout).await
    }
}

/// Fail with [`Error::Cancelled`] if the calling task has been cancelled.
///
/// Checked before every protocol step, not only before waits, so a
/// cancelled task never starts further I/O.
pub fn ensure_not_cancelled<S: Scheduler>(scheduler: &S) -> Result<()> {
    if scheduler.is_cancelled() {
        tracing::debug!("task cancelled, stopping before further protocol I/O");
        return Err(Error::Cancelled);
    }
    Ok(())
}

/// Wait until `fd` is ready for `interest`, retrying on timeout.
///
/// Returns [`Error::Cancelled`] as soon as the scheduler reports the task
/// cancelled, and [`Error::Io`] if the wait itself fails.
pub async fn wait_ready<S: Scheduler>(
    scheduler: &S,
    fd: SocketFd,
    interest: Interest,
    timeout: Duration,
) -> Result<()> {
    loop {
        ensure_not_cancelled(scheduler)?;

        match scheduler.wait_socket(fd, interest, timeout).await? {
            Readiness::Ready => return Ok(()),
            Readiness::TimedOut => {
                tracing::trace!(fd, ?interest, "socket wait timed out, retrying");
            }
            Readiness::Interrupted => {
                tracing::trace!(fd, ?interest, "socket wait interrupted");
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::cell::{Cell, RefCell};
    use std::collections::VecDeque;
    use std::io;

    use super::*;

    /// Replays a fixed list of wait outcomes.
    struct Scripted {
        outcomes: RefCell<VecDeque<io::Result<Readiness>>>,
        cancel_when_interrupted: bool,
        cancelled: Cell<bool>,
        waits: Cell<usize>,
    }

    impl Scripted {
        fn new(outcomes: Vec<io::Result<Readiness>>) -> Self {
            Self {
                outcomes: RefCell::new(outcomes.into()),
                cancel_when_interrupted: false,
                cancelled: Cell::new(false),
                waits: Cell::new(0),
            }
        }
    }

    impl Scheduler for Scripted {
        async fn wait_socket(&self, _: SocketFd, _: Interest, _: Duration) -> io::Result<Readiness> {
            self.waits.set(self.waits.get() + 1);
            let outcome = self
                .outcomes
                .borrow_mut()
                .pop_front()
                .unwrap_or(Ok(Readiness::Ready));
            if self.cancel_when_interrupted && matches!(outcome, Ok(Readiness::Interrupted)) {
                self.cancelled.set(true);
            }
            outcome
        }

        fn is_cancelled(&self) -> bool {
            self.cancelled.get()
        }
    }

    const TICK: Duration = Duration::from_millis(1);

    #[test]
    fn test_ready_returns_immediately() {
        let s = Scripted::new(vec![Ok(Readiness::Ready)]);
        tokio_test::block_on(wait_ready(&s, 3, Interest::Readable, TICK)).unwrap();
        assert_eq!(s.waits.get(), 1);
    }

    #[test]
    fn test_timeouts_are_retried() {
        let s = Scripted::new(vec![
            Ok(Readiness::TimedOut),
            Ok(Readiness::TimedOut),
            Ok(Readiness::Ready),
        ]);
        tokio_test::block_on(wait_ready(&s, 3, Interest::Writable, TICK)).unwrap();
        assert_eq!(s.waits.get(), 3);
    }

    #[test]
    fn test_cancellation_is_reported() {
        let mut s = Scripted::new(vec![Ok(Readiness::Interrupted)]);
        s.cancel_when_interrupted = true;
        let err = tokio_test::block_on(wait_ready(&s, 3, Interest::Readable, TICK)).unwrap_err();
        assert!(err.is_cancelled());
        assert_eq!(s.waits.get(), 1);
    }

    #[test]
    fn test_already_cancelled_never_waits() {
        let s = Scripted::new(vec![]);
        s.cancelled.set(true);
        let err = tokio_test::block_on(wait_ready(&s, 3, Interest::Readable, TICK)).unwrap_err();
        assert!(matches!(err, Error::Cancelled));
        assert_eq!(s.waits.get(), 0);
    }

    #[test]
    fn test_io_failure_is_not_cancellation() {
        let s = Scripted::new(vec![Err(io::Error::from(io::ErrorKind::InvalidInput))]);
        let err = tokio_test::block_on(wait_ready(&s, 3, Interest::Readable, TICK)).unwrap_err();
        assert!(matches!(err, Error::Io(_)));
        assert!(!err.is_cancelled());
    }

    #[test]
    fn test_poller_uses_its_scheduler() {
        let s = Scripted::new(vec![Ok(Readiness::TimedOut), Ok(Readiness::Ready)]);
        let poller = Poller::new(&s, TICK);
        tokio_test::block_on(poller.wait(5, Interest::Readable)).unwrap();
        assert_eq!(poller.scheduler().waits.get(), 2);
    }
}

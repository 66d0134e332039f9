//! Scheduler double.
//!
//! [`MockScheduler`] never touches the socket. Every wait yields to the
//! runtime once, so concurrent operations interleave the way they would on
//! a real scheduler, and is then answered from the script: timeouts first,
//! then readiness. A wait can be turned into a cancellation or an I/O
//! failure.

use std::io;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use fiberpg_client::{Interest, Readiness, Scheduler, SocketFd};
use parking_lot::Mutex;

/// One recorded wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordedWait {
    /// Socket waited on.
    pub fd: SocketFd,
    /// Condition waited for.
    pub interest: Interest,
    /// Timeout passed by the caller.
    pub timeout: Duration,
}

/// Scripted [`Scheduler`] for tests.
#[derive(Debug, Default)]
pub struct MockScheduler {
    cancelled: AtomicBool,
    cancel_on_wait: Option<usize>,
    fail_on_wait: Option<(usize, io::ErrorKind)>,
    timeouts_left: AtomicUsize,
    waits: Mutex<Vec<RecordedWait>>,
}

impl MockScheduler {
    /// Create a scheduler that reports every socket ready.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Time out the first `count` waits.
    #[must_use]
    pub fn with_timeouts(self, count: usize) -> Self {
        self.timeouts_left.store(count, Ordering::SeqCst);
        self
    }

    /// Cancel the task during the `n`th wait (1-based).
    ///
    /// That wait reports [`Readiness::Interrupted`] and the task stays
    /// cancelled afterwards.
    #[must_use]
    pub fn cancel_on_wait(mut self, n: usize) -> Self {
        self.cancel_on_wait = Some(n);
        self
    }

    /// Fail the `n`th wait (1-based) with an I/O error of `kind`.
    #[must_use]
    pub fn fail_on_wait(mut self, n: usize, kind: io::ErrorKind) -> Self {
        self.fail_on_wait = Some((n, kind));
        self
    }

    /// Cancel the task now.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Clear cancellation so a cancelled operation can be resumed.
    pub fn resume(&self) {
        self.cancelled.store(false, Ordering::SeqCst);
    }

    /// Get every wait so far.
    pub fn waits(&self) -> Vec<RecordedWait> {
        self.waits.lock().clone()
    }

    /// Get the interests waited for, in order.
    pub fn interests(&self) -> Vec<Interest> {
        self.waits.lock().iter().map(|w| w.interest).collect()
    }

    /// Get the number of waits so far.
    pub fn wait_count(&self) -> usize {
        self.waits.lock().len()
    }
}

impl Scheduler for MockScheduler {
    async fn wait_socket(
        &self,
        fd: SocketFd,
        interest: Interest,
        timeout: Duration,
    ) -> io::Result<Readiness> {
        let n = {
            let mut waits = self.waits.lock();
            waits.push(RecordedWait {
                fd,
                interest,
                timeout,
            });
            waits.len()
        };
        tracing::trace!(n, fd, ?interest, "mock wait");

        tokio::task::yield_now().await;

        if self.cancel_on_wait == Some(n) {
            self.cancel();
            return Ok(Readiness::Interrupted);
        }
        if let Some((at, kind)) = self.fail_on_wait {
            if at == n {
                return Err(io::Error::new(kind, "mock wait failure"));
            }
        }
        let timed_out = self
            .timeouts_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if timed_out {
            return Ok(Readiness::TimedOut);
        }
        Ok(Readiness::Ready)
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

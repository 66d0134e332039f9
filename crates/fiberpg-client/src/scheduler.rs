//! The cooperative scheduler boundary.
//!
//! A [`Scheduler`] suspends the calling task until a socket is ready, a
//! timeout elapses, or the task is interrupted. It also answers whether the
//! current task has been cancelled. Nothing in this crate blocks a thread:
//! every wait goes through the scheduler.

use std::io;
use std::time::Duration;

use crate::driver::SocketFd;

/// Socket condition to wait for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interest {
    /// Wait until the socket is readable.
    Readable,
    /// Wait until the socket is writable.
    Writable,
}

/// Outcome of a single readiness wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    /// The socket is ready for the requested interest.
    Ready,
    /// The timeout elapsed first.
    TimedOut,
    /// The wait was interrupted, typically by cancellation.
    Interrupted,
}

/// Cooperative task scheduler used to wait on sockets.
///
/// Implementations must never block the OS thread. Errors returned from
/// [`Scheduler::wait_socket`] are treated as I/O failures of the
/// connection.
#[allow(async_fn_in_trait)]
pub trait Scheduler {
    /// Suspend the current task until `fd` is ready for `interest`, the
    /// timeout elapses, or the task is interrupted.
    async fn wait_socket(
        &self,
        fd: SocketFd,
        interest: Interest,
        timeout: Duration,
    ) -> io::Result<Readiness>;

    /// Check if the current task has been cancelled.
    fn is_cancelled(&self) -> bool;
}

#[cfg(all(unix, feature = "tokio-runtime"))]
pub use self::tokio_runtime::TokioScheduler;

#[cfg(all(unix, feature = "tokio-runtime"))]
mod tokio_runtime {
    use std::io;
    use std::os::fd::{AsRawFd, RawFd};
    use std::time::Duration;

    use tokio::io::unix::AsyncFd;
    use tokio_util::sync::CancellationToken;

    use super::{Interest, Readiness, Scheduler};
    use crate::driver::SocketFd;

    /// Borrowed descriptor. The wire library owns and closes the socket.
    struct BorrowedSocket(RawFd);

    impl AsRawFd for BorrowedSocket {
        fn as_raw_fd(&self) -> RawFd {
            self.0
        }
    }

    /// Scheduler backed by the Tokio reactor.
    ///
    /// Waits register the socket with the reactor for the duration of one
    /// wait only. Cancellation is driven by a [`CancellationToken`]: once it
    /// fires, pending waits return [`Readiness::Interrupted`] and
    /// [`Scheduler::is_cancelled`] reports `true`.
    #[derive(Debug, Clone, Default)]
    pub struct TokioScheduler {
        cancel: CancellationToken,
    }

    impl TokioScheduler {
        /// Create a scheduler with a fresh cancellation token.
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }

        /// Create a scheduler that observes an existing token.
        #[must_use]
        pub fn with_token(cancel: CancellationToken) -> Self {
            Self { cancel }
        }

        /// Get the cancellation token.
        #[must_use]
        pub fn token(&self) -> &CancellationToken {
            &self.cancel
        }

        /// Cancel the task this scheduler serves.
        pub fn cancel(&self) {
            self.cancel.cancel();
        }
    }

    impl Scheduler for TokioScheduler {
        async fn wait_socket(
            &self,
            fd: SocketFd,
            interest: Interest,
            timeout: Duration,
        ) -> io::Result<Readiness> {
            let interest = match interest {
                Interest::Readable => tokio::io::Interest::READABLE,
                Interest::Writable => tokio::io::Interest::WRITABLE,
            };
            let socket = AsyncFd::with_interest(BorrowedSocket(fd), interest)?;

            tokio::select! {
                biased;
                () = self.cancel.cancelled() => Ok(Readiness::Interrupted),
                ready = tokio::time::timeout(timeout, socket.ready(interest)) => match ready {
                    Ok(Ok(_guard)) => Ok(Readiness::Ready),
                    Ok(Err(e)) => Err(e),
                    Err(_) => Ok(Readiness::TimedOut),
                },
            }
        }

        fn is_cancelled(&self) -> bool {
            self.cancel.is_cancelled()
        }
    }

}

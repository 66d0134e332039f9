//! Runtime state for connections and in-flight statements.
//!
//! ## Connection states
//!
//! ```text
//! Initiating -> PollingRead | PollingWrite | Ready | Failed
//! PollingRead | PollingWrite -> PollingRead | PollingWrite | Ready | Failed
//! PollingRead | PollingWrite -> Cancelled (task cancelled while waiting)
//! Cancelled -> PollingRead | PollingWrite | Ready | Failed (establish resumed)
//! any -> Closed (close() or drop)
//! ```
//!
//! ## Statement phases
//!
//! ```text
//! Collecting -> Discarding (first command, error or unexpected result)
//! Discarding -> Discarding (until the result stream is exhausted)
//! ```

use std::fmt;

use crate::driver::PollingStatus;
use crate::scheduler::Interest;

/// Where a connection is in its life.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectState {
    /// Handle allocated, handshake not yet polled.
    #[default]
    Initiating,
    /// Waiting for the socket to become readable.
    PollingRead,
    /// Waiting for the socket to become writable.
    PollingWrite,
    /// Handshake complete; statements may be executed.
    Ready,
    /// Handshake failed; the handle has been released.
    Failed,
    /// The task was cancelled during the handshake.
    Cancelled,
    /// The handle has been released by `close`.
    Closed,
}

impl ConnectState {
    /// Apply one handshake step result.
    #[must_use]
    pub fn advance(self, poll: PollingStatus) -> Self {
        match poll {
            PollingStatus::Reading => Self::PollingRead,
            PollingStatus::Writing => Self::PollingWrite,
            PollingStatus::Ok => Self::Ready,
            PollingStatus::Failed => Self::Failed,
        }
    }

    /// Get the socket condition to wait for in this state.
    #[must_use]
    pub fn interest(self) -> Option<Interest> {
        match self {
            Self::PollingRead => Some(Interest::Readable),
            Self::PollingWrite => Some(Interest::Writable),
            _ => None,
        }
    }

    /// Check if the handshake can still make progress.
    #[must_use]
    pub fn is_establishing(self) -> bool {
        matches!(
            self,
            Self::Initiating | Self::PollingRead | Self::PollingWrite | Self::Cancelled
        )
    }

    /// Check if statements may be executed.
    #[must_use]
    pub fn is_ready(self) -> bool {
        matches!(self, Self::Ready)
    }

    /// Check if the handle has been released.
    #[must_use]
    pub fn is_released(self) -> bool {
        matches!(self, Self::Failed | Self::Closed)
    }

    /// Get the state name as a string.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Initiating => "initiating",
            Self::PollingRead => "polling-read",
            Self::PollingWrite => "polling-write",
            Self::Ready => "ready",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
            Self::Closed => "closed",
        }
    }
}

impl fmt::Display for ConnectState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What happens to the next result of an executing statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QueryPhase {
    /// Row results are decoded and kept.
    #[default]
    Collecting,
    /// The outcome is decided; remaining results are released unread.
    Discarding,
}

impl QueryPhase {
    /// Check if results are still being kept.
    #[must_use]
    pub fn is_collecting(self) -> bool {
        matches!(self, Self::Collecting)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handshake_transitions() {
        let s = ConnectState::Initiating.advance(PollingStatus::Writing);
        assert_eq!(s, ConnectState::PollingWrite);
        assert_eq!(s.interest(), Some(Interest::Writable));

        let s = s.advance(PollingStatus::Reading);
        assert_eq!(s.interest(), Some(Interest::Readable));

        let s = s.advance(PollingStatus::Ok);
        assert!(s.is_ready());
        assert_eq!(s.interest(), None);
    }

    #[test]
    fn test_failure_releases() {
        let s = ConnectState::PollingRead.advance(PollingStatus::Failed);
        assert_eq!(s, ConnectState::Failed);
        assert!(s.is_released());
        assert!(!s.is_establishing());
    }

    #[test]
    fn test_cancelled_can_resume() {
        assert!(ConnectState::Cancelled.is_establishing());
        assert_eq!(
            ConnectState::Cancelled.advance(PollingStatus::Ok),
            ConnectState::Ready
        );
    }

    #[test]
    fn test_display() {
        assert_eq!(ConnectState::PollingWrite.to_string(), "polling-write");
        assert_eq!(ConnectState::default(), ConnectState::Initiating);
        assert!(QueryPhase::default().is_collecting());
    }
}

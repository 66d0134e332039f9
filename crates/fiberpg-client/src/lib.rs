//! # fiberpg-client
//!
//! Non-blocking PostgreSQL client for cooperative task schedulers.
//!
//! This is the primary public API surface of the fiberpg project. It never
//! blocks the scheduler's thread: the wire library is only ever advanced by
//! single non-blocking steps, and the calling task sleeps on its scheduler
//! whenever the socket is not ready.
//!
//! ## Collaborators
//!
//! - A [`Driver`] that opens [`WireConnection`]s: the non-blocking wire
//!   library (libpq or anything shaped like it).
//! - A [`Scheduler`] that suspends the current task on socket readiness and
//!   reports cancellation. [`TokioScheduler`] is provided for Tokio.
//!
//! ## Outcomes
//!
//! Every failure maps onto a [`Status`] with the codes hosts expect:
//!
//! | Status | Code | Meaning |
//! |--------|------|---------|
//! | `Success` | `1` | The operation succeeded |
//! | `StatementFailed` | `0` | The statement failed; the connection is still usable |
//! | `ConnectionBroken` | `-1` | The connection must be closed |
//! | `Cancelled` | `-2` | The calling task was cancelled |
//!
//! ## Example
//!
//! ```rust,ignore
//! use fiberpg_client::{Config, Connection, DecimalPolicy, Query, TokioScheduler};
//!
//! let scheduler = TokioScheduler::new();
//! let config = Config::from_conninfo("host=localhost dbname=app user=app")?;
//! let conn = Connection::connect(&driver, config, &scheduler).await?;
//!
//! let out = conn
//!     .execute(
//!         &scheduler,
//!         Query::new("SELECT id, balance FROM accounts WHERE owner = $1")
//!             .bind("alice")
//!             .decimal_policy(DecimalPolicy::String),
//!     )
//!     .await?;
//!
//! for row in out.rows() {
//!     let id: f64 = row.get("id")?;
//!     let balance: Option<String> = row.get("balance")?;
//!     println!("{id}: {balance:?}");
//! }
//!
//! conn.close();
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod config;
pub mod connection;
pub mod driver;
pub mod error;
pub mod escape;
pub mod execute;
pub mod instrumentation;
pub mod poll;
pub mod query;
pub mod result;
pub mod scheduler;
pub mod state;

// Re-export commonly used types
pub use config::Config;
pub use connection::Connection;
pub use driver::{
    ConnStatus, Driver, ExecStatus, NoticeSink, PollingStatus, SocketFd, TransactionStatus,
    WireConnection, WireResult,
};
pub use error::{Error, Result, Status};
pub use instrumentation::SanitizationConfig;
pub use query::Query;
pub use result::{CommandStatus, QueryOutput, ResultSet, Row};
pub use scheduler::{Interest, Readiness, Scheduler};
#[cfg(all(unix, feature = "tokio-runtime"))]
pub use scheduler::TokioScheduler;
pub use state::{ConnectState, QueryPhase};

// Re-export types from fiberpg-types
pub use fiberpg_types::{DecimalPolicy, FromHostValue, HostValue, Oid, ParamBatch, TypeError};

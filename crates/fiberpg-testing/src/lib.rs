//! # fiberpg-testing
//!
//! Test infrastructure for fiberpg.
//!
//! This crate provides utilities for testing the client without a server:
//!
//! - [`mock_driver`]: a scriptable in-memory wire library with release counters
//! - [`mock_scheduler`]: a scheduler that records waits and injects timeouts,
//!   cancellation and I/O failures
//! - [`fixtures`]: canned configurations and result shapes
//!
//! ## Example
//!
//! ```rust,ignore
//! use fiberpg_client::{Connection, Query};
//! use fiberpg_testing::{fixtures, mock_driver::MockDriver, mock_scheduler::MockScheduler};
//!
//! let driver = MockDriver::builder()
//!     .with_response(fixtures::USERS_SQL, fixtures::users_response())
//!     .build();
//! let scheduler = MockScheduler::new();
//! let conn = Connection::connect(&driver, fixtures::test_config(), &scheduler).await?;
//! let out = conn.execute(&scheduler, fixtures::USERS_SQL).await?;
//! assert_eq!(out.rows().len(), 3);
//! ```

#![warn(missing_docs)]

pub mod fixtures;
pub mod mock_driver;
pub mod mock_scheduler;

pub use mock_driver::{
    MockColumn, MockConnection, MockDriver, MockDriverBuilder, MockResponse, MockResult,
    MockStats, SentQuery,
};
pub use mock_scheduler::MockScheduler;

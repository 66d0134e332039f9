//! Test fixture utilities.

use std::time::Duration;

use fiberpg_client::{Config, PollingStatus};

use crate::mock_driver::{MockColumn, MockResponse, MockResult};

/// Statement answered by [`users_response`].
pub const USERS_SQL: &str = "SELECT id, name, balance, active FROM users ORDER BY id";

/// Configuration used by most tests.
///
/// The wait timeout is short so retry loops are visible in recorded waits.
#[must_use]
pub fn test_config() -> Config {
    Config::new()
        .host("localhost")
        .port(5432)
        .dbname("fiberpg_test")
        .user("fiberpg")
        .password("secret")
        .application_name("fiberpg-tests")
        .wait_timeout(Duration::from_millis(50))
}

/// Handshake that needs a write wait and two read waits.
#[must_use]
pub fn slow_handshake() -> Vec<PollingStatus> {
    vec![
        PollingStatus::Writing,
        PollingStatus::Reading,
        PollingStatus::Reading,
        PollingStatus::Ok,
    ]
}

/// Columns of the `users` table.
#[must_use]
pub fn users_columns() -> Vec<MockColumn> {
    vec![
        MockColumn::int4("id"),
        MockColumn::text("name"),
        MockColumn::numeric("balance"),
        MockColumn::boolean("active"),
    ]
}

/// Three users; the last has a NULL balance.
#[must_use]
pub fn users_result() -> MockResult {
    MockResult::rows(
        users_columns(),
        vec![
            vec![Some("1"), Some("alice"), Some("10.50"), Some("t")],
            vec![Some("2"), Some("bob"), Some("0.1"), Some("f")],
            vec![Some("3"), Some("carol"), None, Some("t")],
        ],
    )
}

/// Response for [`USERS_SQL`].
#[must_use]
pub fn users_response() -> MockResponse {
    MockResponse::results(vec![users_result()])
}

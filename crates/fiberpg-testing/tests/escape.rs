//! Literal and identifier quoting tests.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use fiberpg_client::{Connection, Error};
use fiberpg_testing::fixtures::test_config;
use fiberpg_testing::mock_driver::MockDriver;
use fiberpg_testing::mock_scheduler::MockScheduler;

#[tokio::test]
async fn test_quote_literal() {
    let driver = MockDriver::builder().build();
    let sched = MockScheduler::new();
    let conn = Connection::connect(&driver, test_config(), &sched)
        .await
        .unwrap();

    assert_eq!(conn.quote_literal("O'Brien").unwrap(), "'O''Brien'");
    assert_eq!(conn.quote_literal("").unwrap(), "''");
    assert_eq!(conn.quote_literal(r"C:\temp").unwrap(), r" E'C:\\temp'");
    assert_eq!(conn.quote_literal(b"bytes".as_slice()).unwrap(), "'bytes'");
}

#[tokio::test]
async fn test_quote_identifier() {
    let driver = MockDriver::builder().build();
    let sched = MockScheduler::new();
    let conn = Connection::connect(&driver, test_config(), &sched)
        .await
        .unwrap();

    assert_eq!(conn.quote_identifier("users").unwrap(), "\"users\"");
    assert_eq!(
        conn.quote_identifier("odd \"name\"").unwrap(),
        "\"odd \"\"name\"\"\""
    );
}

#[tokio::test]
async fn test_quote_before_handshake_completes() {
    // Escaping only needs the handle, not a finished handshake.
    let driver = MockDriver::builder().build();
    let conn = Connection::start(&driver, test_config()).unwrap();
    assert_eq!(conn.quote_identifier("t").unwrap(), "\"t\"");
}

#[tokio::test]
async fn test_escape_allocation_failure() {
    let driver = MockDriver::builder().failing_escape().build();
    let sched = MockScheduler::new();
    let conn = Connection::connect(&driver, test_config(), &sched)
        .await
        .unwrap();

    let err = conn.quote_literal("x").unwrap_err();
    assert!(matches!(err, Error::Allocation(_)));
    assert_eq!(err.to_string(), "can't allocate memory");
    assert_eq!(err.status().code(), -1);

    let err = conn.quote_identifier("x").unwrap_err();
    assert!(matches!(err, Error::Allocation(_)));
}

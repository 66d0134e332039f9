//! Connection lifecycle tests against the mock wire library.
//!
//! Covers the handshake state machine, handle release on every exit path,
//! cancellation and resume, close, and transaction status.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use fiberpg_client::{
    Config, ConnectState, Connection, Error, Interest, PollingStatus, Query, TransactionStatus,
};
use fiberpg_testing::fixtures::{self, test_config};
use fiberpg_testing::mock_driver::{MOCK_FD, MockDriver, MockResponse};
use fiberpg_testing::mock_scheduler::MockScheduler;

// =============================================================================
// Handshake
// =============================================================================

#[tokio::test]
async fn test_connect_waits_on_requested_interests() {
    let driver = MockDriver::builder()
        .with_handshake(fixtures::slow_handshake())
        .build();
    let sched = MockScheduler::new();

    let conn = Connection::connect(&driver, test_config(), &sched)
        .await
        .unwrap();

    assert_eq!(conn.state(), ConnectState::Ready);
    assert_eq!(
        sched.interests(),
        vec![Interest::Writable, Interest::Readable, Interest::Readable]
    );
    assert!(sched.waits().iter().all(|w| w.fd == MOCK_FD));
    assert_eq!(conn.socket(), Some(MOCK_FD));
    assert_eq!(driver.stats().live_handles(), 1);
}

#[tokio::test]
async fn test_connect_immediately_ok_never_waits() {
    let driver = MockDriver::builder()
        .with_handshake(vec![PollingStatus::Ok])
        .build();
    let sched = MockScheduler::new();

    let conn = Connection::connect(&driver, test_config(), &sched)
        .await
        .unwrap();
    assert!(conn.state().is_ready());
    assert_eq!(sched.wait_count(), 0);
}

#[tokio::test]
async fn test_connect_passes_rendered_conninfo() {
    let driver = MockDriver::builder().build();
    let sched = MockScheduler::new();
    let config = Config::from_conninfo("host=db.internal port=6432 dbname=app").unwrap();

    let _conn = Connection::connect(&driver, config, &sched).await.unwrap();
    assert_eq!(
        driver.conninfos(),
        vec!["host='db.internal' port='6432' dbname='app'".to_string()]
    );
}

#[tokio::test]
async fn test_handshake_timeouts_are_retried() {
    let driver = MockDriver::builder().build();
    let sched = MockScheduler::new().with_timeouts(3);

    let conn = Connection::connect(&driver, test_config(), &sched)
        .await
        .unwrap();
    assert!(conn.state().is_ready());
    // Two handshake waits plus three retried timeouts.
    assert_eq!(sched.wait_count(), 5);
    assert!(
        sched
            .waits()
            .iter()
            .all(|w| w.timeout == test_config().wait_timeout)
    );
}

#[tokio::test]
async fn test_establish_when_ready_is_noop() {
    let driver = MockDriver::builder().build();
    let sched = MockScheduler::new();
    let conn = Connection::connect(&driver, test_config(), &sched)
        .await
        .unwrap();
    let waits = sched.wait_count();

    conn.establish(&sched).await.unwrap();
    assert_eq!(sched.wait_count(), waits);
}

// =============================================================================
// Start Failures
// =============================================================================

#[tokio::test]
async fn test_allocation_failure() {
    let driver = MockDriver::builder().failing_allocation().build();

    let err = Connection::start(&driver, test_config()).unwrap_err();
    assert!(matches!(err, Error::Allocation(_)));
    assert_eq!(err.to_string(), "can't allocate PG connection structure");
    assert_eq!(err.status().code(), -1);
    assert_eq!(driver.stats().handles_opened, 0);
}

#[tokio::test]
async fn test_bad_at_start_releases_handle() {
    let driver = MockDriver::builder()
        .broken_at_start("invalid connection option \"bogus\"\n")
        .build();

    let err = Connection::start(&driver, test_config()).unwrap_err();
    match &err {
        Error::Connect(message) => assert!(message.contains("bogus")),
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(err.status().code(), -1);

    let stats = driver.stats();
    assert_eq!(stats.handles_opened, 1);
    assert_eq!(stats.handles_released, 1);
}

#[tokio::test]
async fn test_handshake_failure_releases_handle_once() {
    let driver = MockDriver::builder()
        .failing_handshake(
            vec![PollingStatus::Writing],
            "FATAL:  password authentication failed for user \"fiberpg\"\n",
        )
        .build();
    let sched = MockScheduler::new();

    let conn = Connection::start(&driver, test_config()).unwrap();
    let err = conn.establish(&sched).await.unwrap_err();

    assert!(matches!(&err, Error::Connect(m) if m.contains("password authentication failed")));
    assert_eq!(err.status().code(), -1);
    assert_eq!(conn.state(), ConnectState::Failed);
    assert!(conn.is_closed());
    assert_eq!(driver.stats().handles_released, 1);

    // A second attempt cannot resurrect the handle.
    let err = conn.establish(&sched).await.unwrap_err();
    assert!(matches!(err, Error::ConnectionClosed));

    assert!(!conn.close());
    drop(conn);
    assert_eq!(driver.stats().handles_released, 1);
}

// =============================================================================
// Cancellation
// =============================================================================

#[tokio::test]
async fn test_cancel_mid_handshake_keeps_handle() {
    let driver = MockDriver::builder()
        .with_handshake(fixtures::slow_handshake())
        .build();
    let sched = MockScheduler::new().cancel_on_wait(2);

    let conn = Connection::start(&driver, test_config()).unwrap();
    let err = conn.establish(&sched).await.unwrap_err();

    assert!(err.is_cancelled());
    assert_eq!(err.status().code(), -2);
    assert_eq!(conn.state(), ConnectState::Cancelled);
    assert!(!conn.is_closed());
    assert_eq!(driver.stats().handles_released, 0);

    assert!(conn.close());
    assert_eq!(conn.state(), ConnectState::Closed);
    assert_eq!(driver.stats().handles_released, 1);
    drop(conn);
    assert_eq!(driver.stats().handles_released, 1);
}

#[tokio::test]
async fn test_resume_after_cancelled_handshake() {
    let driver = MockDriver::builder()
        .with_handshake(fixtures::slow_handshake())
        .build();
    let sched = MockScheduler::new().cancel_on_wait(1);

    let conn = Connection::start(&driver, test_config()).unwrap();
    assert!(conn.establish(&sched).await.unwrap_err().is_cancelled());

    sched.resume();
    conn.establish(&sched).await.unwrap();
    assert!(conn.state().is_ready());
    assert_eq!(driver.stats().handles_opened, 1);
}

#[tokio::test]
async fn test_cancelled_before_first_wait() {
    let driver = MockDriver::builder().build();
    let sched = MockScheduler::new();
    sched.cancel();

    let conn = Connection::start(&driver, test_config()).unwrap();
    let err = conn.establish(&sched).await.unwrap_err();
    assert!(matches!(err, Error::Cancelled));
    assert_eq!(sched.wait_count(), 0);
}

#[tokio::test]
async fn test_cancelled_task_does_not_advance_handshake() {
    // The handshake would complete without a single wait.
    let driver = MockDriver::builder()
        .with_handshake(vec![PollingStatus::Ok])
        .build();
    let sched = MockScheduler::new();
    sched.cancel();

    let conn = Connection::start(&driver, test_config()).unwrap();
    let err = conn.establish(&sched).await.unwrap_err();
    assert!(err.is_cancelled());
    assert_eq!(err.status().code(), -2);
    assert_eq!(conn.state(), ConnectState::Cancelled);
    assert!(!conn.is_closed());

    sched.resume();
    conn.establish(&sched).await.unwrap();
    assert!(conn.state().is_ready());
}

#[tokio::test]
async fn test_establish_on_ready_connection_ignores_cancellation() {
    let driver = MockDriver::builder().build();
    let sched = MockScheduler::new();
    let conn = Connection::connect(&driver, test_config(), &sched)
        .await
        .unwrap();

    sched.cancel();
    conn.establish(&sched).await.unwrap();
    assert_eq!(conn.state(), ConnectState::Ready);
}

#[tokio::test]
async fn test_wait_io_failure_is_connection_level() {
    let driver = MockDriver::builder().build();
    let sched = MockScheduler::new().fail_on_wait(1, std::io::ErrorKind::ConnectionReset);

    let conn = Connection::start(&driver, test_config()).unwrap();
    let err = conn.establish(&sched).await.unwrap_err();
    assert!(matches!(err, Error::Io(_)));
    assert_eq!(err.status().code(), -1);
}

// =============================================================================
// Close and Drop
// =============================================================================

#[tokio::test]
async fn test_close_is_idempotent() {
    let driver = MockDriver::builder().build();
    let sched = MockScheduler::new();
    let conn = Connection::connect(&driver, test_config(), &sched)
        .await
        .unwrap();

    assert!(conn.close());
    assert!(!conn.close());
    assert!(conn.is_closed());
    assert_eq!(conn.socket(), None);
    assert_eq!(driver.stats().handles_released, 1);
}

#[tokio::test]
async fn test_drop_releases_handle() {
    let driver = MockDriver::builder().build();
    let sched = MockScheduler::new();
    let conn = Connection::connect(&driver, test_config(), &sched)
        .await
        .unwrap();

    drop(conn);
    assert_eq!(driver.stats().handles_released, 1);
}

#[tokio::test]
async fn test_operations_after_close() {
    let driver = MockDriver::builder().build();
    let sched = MockScheduler::new();
    let conn = Connection::connect(&driver, test_config(), &sched)
        .await
        .unwrap();
    conn.close();

    let err = conn.execute(&sched, "SELECT 1").await.unwrap_err();
    assert!(matches!(err, Error::ConnectionClosed));
    assert!(matches!(conn.transaction_active(), Err(Error::ConnectionClosed)));
    assert!(matches!(conn.quote_literal("x"), Err(Error::ConnectionClosed)));
    assert!(driver.sent_queries().is_empty());
}

#[tokio::test]
async fn test_display() {
    let driver = MockDriver::builder().with_fd(17).build();
    let sched = MockScheduler::new();
    let conn = Connection::connect(&driver, test_config(), &sched)
        .await
        .unwrap();

    assert_eq!(conn.to_string(), "fiberpg connection (fd 17, ready)");
    conn.close();
    assert_eq!(conn.to_string(), "fiberpg connection (closed)");
}

#[tokio::test]
async fn test_debug_redacts_password() {
    let driver = MockDriver::builder().build();
    let conn = Connection::start(&driver, test_config()).unwrap();
    let debug = format!("{conn:?}");
    assert!(!debug.contains("secret"));
}

// =============================================================================
// Transaction Status
// =============================================================================

#[tokio::test]
async fn test_transaction_active() {
    let driver = MockDriver::builder().build();
    let sched = MockScheduler::new();
    let conn = Connection::connect(&driver, test_config(), &sched)
        .await
        .unwrap();

    assert!(!conn.transaction_active().unwrap());
    for status in [
        TransactionStatus::Active,
        TransactionStatus::InTransaction,
        TransactionStatus::InError,
    ] {
        driver.set_transaction_status(status);
        assert!(conn.transaction_active().unwrap(), "{status:?}");
    }
    driver.set_transaction_status(TransactionStatus::Idle);
    assert!(!conn.transaction_active().unwrap());
}

#[tokio::test]
async fn test_transaction_status_of_broken_connection() {
    let driver = MockDriver::builder()
        .with_default_response(MockResponse::reject_send(
            "server closed the connection unexpectedly\n",
            true,
        ))
        .build();
    let sched = MockScheduler::new();
    let conn = Connection::connect(&driver, test_config(), &sched)
        .await
        .unwrap();

    let err = conn.execute(&sched, Query::new("BEGIN")).await.unwrap_err();
    assert_eq!(err.status().code(), -1);

    let err = conn.transaction_active().unwrap_err();
    assert!(matches!(&err, Error::ConnectionBroken(m) if m.contains("closed the connection")));
}

// =============================================================================
// Concurrency
// =============================================================================

#[tokio::test]
async fn test_concurrent_establish_is_rejected() {
    let driver = MockDriver::builder()
        .with_handshake(fixtures::slow_handshake())
        .build();
    let sched = MockScheduler::new();
    let conn = Connection::start(&driver, test_config()).unwrap();

    let (first, second) = tokio::join!(conn.establish(&sched), conn.establish(&sched));
    first.unwrap();
    assert!(matches!(second, Err(Error::Busy)));
    assert!(!conn.is_busy());
}

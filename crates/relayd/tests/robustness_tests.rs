//! Robustness tests for the relay daemon.
//!
//! These tests verify the daemon handles edge cases and error conditions gracefully:
//! - Line length limits
//! - Session limits and login timeouts
//! - Slow consumers
//! - Rapid connect/disconnect
//! - Graceful shutdown
//!
//! Tests CAN use `.unwrap()` and `.expect()` - this is allowed.

mod common;

use std::time::Duration;

use common::TestServer;
use relayd::config::Config;

// ============================================================================
// Line Length Tests
// ============================================================================

const SMALL_LINE_LIMIT: usize = 16;

fn small_lines() -> Config {
    Config {
        max_line_length: SMALL_LINE_LIMIT,
        ..Config::default()
    }
}

#[tokio::test]
async fn test_line_at_limit_relayed() {
    let server = TestServer::spawn_with(small_lines()).await;
    let mut alice = server.login("alice").await;
    let mut bob = server.login("bob").await;
    assert_eq!(alice.recv().await, "*** bob joined the chat ***");

    let text = "y".repeat(SMALL_LINE_LIMIT);
    bob.send_raw(format!("{text}\r\n").as_bytes()).await;
    assert_eq!(alice.recv().await, format!("bob> {text}"));

    server.shutdown().await;
}

#[tokio::test]
async fn test_oversized_line_closes_session() {
    let server = TestServer::spawn_with(small_lines()).await;
    let mut alice = server.login("alice").await;
    let mut bob = server.login("bob").await;
    assert_eq!(alice.recv().await, "*** bob joined the chat ***");

    // Exactly enough bytes to trip the limit, so nothing is left unread
    bob.send_raw(&[b'x'; SMALL_LINE_LIMIT + 2]).await;
    bob.expect_closed().await;

    assert_eq!(alice.recv().await, "*** bob left the chat ***");
    server.wait_for_count(1).await;

    server.shutdown().await;
}

#[tokio::test]
async fn test_oversized_name_rejected() {
    let server = TestServer::spawn_with(small_lines()).await;

    let mut client = server.connect().await;
    assert_eq!(client.recv().await, "Type your username: ");
    client.send_raw(&[b'n'; SMALL_LINE_LIMIT + 2]).await;
    assert_eq!(client.recv().await, "You are not authorized");
    client.expect_closed().await;

    assert_eq!(server.registry.count().await, 0);
    server.shutdown().await;
}

#[tokio::test]
async fn test_invalid_utf8_relayed_lossily() {
    let server = TestServer::spawn().await;
    let mut alice = server.login("alice").await;
    let mut bob = server.login("bob").await;
    assert_eq!(alice.recv().await, "*** bob joined the chat ***");

    bob.send_raw(b"caf\xff\n").await;
    assert_eq!(alice.recv().await, "bob> caf\u{FFFD}");

    // Session survives
    bob.send_line("still here").await;
    assert_eq!(alice.recv().await, "bob> still here");

    server.shutdown().await;
}

// ============================================================================
// Login Limit Tests
// ============================================================================

#[tokio::test]
async fn test_server_full_rejects_login() {
    let config = Config {
        max_sessions: 1,
        ..Config::default()
    };
    let server = TestServer::spawn_with(config).await;
    let mut alice = server.login("alice").await;

    let mut late = server.connect().await;
    assert_eq!(late.recv().await, "Type your username: ");
    late.send_line("bob").await;
    assert_eq!(late.recv().await, "Server is full");
    late.expect_closed().await;

    alice.assert_silent().await;
    assert_eq!(server.registry.count().await, 1);

    // A slot frees up once alice leaves
    alice.hang_up().await;
    server.wait_for_count(0).await;
    let _bob = server.login("bob").await;
    server.wait_for_count(1).await;

    server.shutdown().await;
}

#[tokio::test]
async fn test_login_timeout() {
    let config = Config {
        login_timeout_secs: 1,
        ..Config::default()
    };
    let server = TestServer::spawn_with(config).await;

    let mut idle = server.connect().await;
    assert_eq!(idle.recv().await, "Type your username: ");
    assert_eq!(
        idle.recv_timeout(Duration::from_secs(3)).await.as_deref(),
        Some("You are not authorized")
    );
    idle.expect_closed().await;

    assert_eq!(server.registry.count().await, 0);
    server.shutdown().await;
}

// ============================================================================
// Slow Consumer Tests
// ============================================================================

#[tokio::test]
async fn test_slow_consumer_does_not_block_others() {
    const LINES: usize = 2000;

    let config = Config {
        queue_capacity: 8,
        write_timeout_secs: 1,
        ..Config::default()
    };
    let server = TestServer::spawn_with(config).await;

    // Logs in, then never reads again
    let _slow = server.login("slow").await;
    let mut fast = server.login("fast").await;
    let mut sender = server.login("sender").await;
    assert_eq!(fast.recv().await, "*** sender joined the chat ***");

    // Large lines fill the slow client's socket buffers quickly
    let payload = "z".repeat(4000);
    let mut slow_left = false;
    for i in 0..LINES {
        sender.send_line(&format!("{i} {payload}")).await;

        let mut line = fast.recv().await;
        // The slow session may hit its write timeout along the way
        if line == "*** slow left the chat ***" {
            assert!(!slow_left, "leave notice sent twice");
            slow_left = true;
            line = fast.recv().await;
        }
        assert_eq!(line, format!("sender> {i} {payload}"));
    }

    server.shutdown().await;
}

// ============================================================================
// Rapid Connect/Disconnect Tests
// ============================================================================

#[tokio::test]
async fn test_rapid_connect_disconnect() {
    let server = TestServer::spawn().await;

    for _ in 0..50 {
        let client = server.connect().await;
        drop(client);
    }

    for i in 0..10 {
        let client = server.login(&format!("flash{i}")).await;
        client.hang_up().await;
    }

    server.wait_for_count(0).await;

    // Server still healthy
    let mut alice = server.login("alice").await;
    let mut bob = server.login("bob").await;
    bob.send_line("ok").await;

    // A late leave notice from the last flash session may still arrive
    let mut line = alice.recv().await;
    while line.starts_with("*** flash") {
        line = alice.recv().await;
    }
    assert_eq!(line, "*** bob joined the chat ***");
    assert_eq!(alice.recv().await, "bob> ok");

    server.shutdown().await;
}

// ============================================================================
// Shutdown Tests
// ============================================================================

#[tokio::test]
async fn test_shutdown_closes_all_sessions() {
    let server = TestServer::spawn().await;
    let mut alice = server.login("alice").await;
    let mut bob = server.login("bob").await;

    let mut pending = server.connect().await;
    assert_eq!(pending.recv().await, "Type your username: ");

    let registry = server.registry.clone();
    server.shutdown().await;

    alice.expect_closed().await;
    bob.expect_closed().await;
    pending.expect_closed().await;

    assert_eq!(registry.count().await, 0);
}

#[tokio::test]
async fn test_shutdown_not_held_up_by_stalled_reader() {
    const LINES: usize = 3000;

    let config = Config {
        queue_capacity: 8,
        write_timeout_secs: 30,
        shutdown_timeout_secs: 10,
        ..Config::default()
    };
    let server = TestServer::spawn_with(config).await;

    // Logs in, then never reads again
    let _stalled = server.login("stalled").await;
    let mut sender = server.login("sender").await;

    // Enough data to fill the stalled client's socket buffers, leaving its
    // writer parked mid-write
    let payload = "z".repeat(4000);
    for i in 0..LINES {
        sender.send_line(&format!("{i} {payload}")).await;
    }
    tokio::time::sleep(Duration::from_millis(200)).await;

    let started = tokio::time::Instant::now();
    server.shutdown().await;
    assert!(
        started.elapsed() < Duration::from_secs(3),
        "shutdown took {:?}",
        started.elapsed()
    );
}

//! Shared helpers for the TCP integration tests.
//!
//! Tests CAN use `.unwrap()` and `.expect()` - this is allowed.
//! We test the panic-free behavior of production code through assertions.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::time::Duration;

use relayd::config::Config;
use relayd::registry::{spawn_registry, RegistryHandle};
use relayd::server::ChatServer;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout, Instant};
use tokio_util::sync::CancellationToken;

// ============================================================================
// Constants
// ============================================================================

/// How long a test waits for a line it expects
pub const RECV_TIMEOUT: Duration = Duration::from_secs(2);

/// How long a test waits to be sure no line arrives
pub const SILENCE_TIMEOUT: Duration = Duration::from_millis(200);

/// Interval between registry polls
const POLL_INTERVAL: Duration = Duration::from_millis(10);

// ============================================================================
// Test Server
// ============================================================================

/// A server bound to an ephemeral localhost port.
pub struct TestServer {
    pub addr: SocketAddr,
    pub registry: RegistryHandle,
    cancel_token: CancellationToken,
    task: JoinHandle<()>,
}

impl TestServer {
    /// Spawns a server with default settings.
    pub async fn spawn() -> Self {
        Self::spawn_with(Config::default()).await
    }

    /// Spawns a server with the given settings, forcing `127.0.0.1:0`.
    pub async fn spawn_with(mut config: Config) -> Self {
        config.bind_address = "127.0.0.1:0".to_string();

        let registry = spawn_registry(config.max_sessions);
        let cancel_token = CancellationToken::new();
        let server = ChatServer::bind(&config, registry.clone(), cancel_token.clone())
            .await
            .expect("bind test server");
        let addr = server.local_addr();

        let task = tokio::spawn(server.run());

        Self {
            addr,
            registry,
            cancel_token,
            task,
        }
    }

    /// Opens a raw connection; the prompt has not been read yet.
    pub async fn connect(&self) -> TestClient {
        let stream = TcpStream::connect(self.addr).await.expect("connect to server");
        TestClient::new(stream)
    }

    /// Connects and logs in as `name`, consuming the prompt and greeting.
    pub async fn login(&self, name: &str) -> TestClient {
        let mut client = self.connect().await;
        assert_eq!(client.recv().await, "Type your username: ");
        client.send_line(name).await;
        assert_eq!(client.recv().await, format!("Hello, {}", name.trim()));
        client
    }

    /// Waits until the registry holds exactly `expected` members.
    pub async fn wait_for_count(&self, expected: usize) {
        let deadline = Instant::now() + RECV_TIMEOUT;
        while Instant::now() < deadline {
            if self.registry.count().await == expected {
                return;
            }
            sleep(POLL_INTERVAL).await;
        }
        panic!(
            "registry count stuck at {}, expected {expected}",
            self.registry.count().await
        );
    }

    /// Cancels the server and waits for its shutdown to finish.
    pub async fn shutdown(self) {
        self.cancel_token.cancel();
        timeout(Duration::from_secs(10), self.task)
            .await
            .expect("server shut down in time")
            .expect("server task");
    }
}

// ============================================================================
// Test Client
// ============================================================================

/// A line-oriented client connection.
pub struct TestClient {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

impl TestClient {
    fn new(stream: TcpStream) -> Self {
        let (reader, writer) = stream.into_split();
        Self {
            reader: BufReader::new(reader),
            writer,
        }
    }

    /// Sends `text` followed by `\n`.
    pub async fn send_line(&mut self, text: &str) {
        self.send_raw(format!("{text}\n").as_bytes()).await;
    }

    /// Sends bytes exactly as given.
    pub async fn send_raw(&mut self, data: &[u8]) {
        self.writer.write_all(data).await.unwrap();
        self.writer.flush().await.unwrap();
    }

    /// Receives one line without its terminator, failing the test on EOF
    /// or timeout.
    pub async fn recv(&mut self) -> String {
        self.recv_timeout(RECV_TIMEOUT)
            .await
            .expect("expected a line from the server")
    }

    /// Receives one line, or `None` on EOF or timeout.
    pub async fn recv_timeout(&mut self, duration: Duration) -> Option<String> {
        let mut line = String::new();
        match timeout(duration, self.reader.read_line(&mut line)).await {
            Ok(Ok(0)) => None,
            Ok(Ok(_)) => Some(line.trim_end_matches('\n').to_string()),
            Ok(Err(_)) | Err(_) => None,
        }
    }

    /// Asserts nothing arrives within [`SILENCE_TIMEOUT`].
    pub async fn assert_silent(&mut self) {
        let mut line = String::new();
        let result = timeout(SILENCE_TIMEOUT, self.reader.read_line(&mut line)).await;
        assert!(result.is_err(), "unexpected data from server: {line:?}");
    }

    /// Waits for the server to close the connection, skipping any lines
    /// still in flight.
    pub async fn expect_closed(&mut self) {
        let deadline = Instant::now() + RECV_TIMEOUT;
        loop {
            let mut line = String::new();
            let remaining = deadline.saturating_duration_since(Instant::now());
            match timeout(remaining, self.reader.read_line(&mut line)).await {
                Ok(Ok(0)) | Ok(Err(_)) => return,
                Ok(Ok(_)) => continue,
                Err(_) => panic!("connection still open"),
            }
        }
    }

    /// Closes the write side, as a client hanging up would.
    pub async fn hang_up(mut self) {
        let _ = self.writer.shutdown().await;
        drop(self);
    }
}

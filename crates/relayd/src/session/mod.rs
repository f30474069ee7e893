//! Per-connection session handling.
//!
//! Each accepted socket gets its own `Session` that:
//! - Prompts for and validates a display name
//! - Registers with the registry and announces the join
//! - Relays every line the client sends to the other members
//! - Deregisters and announces the leave when the client goes away
//!
//! # Lifecycle
//!
//! ```text
//! Connecting ──login ok──▶ Authenticated ──EOF/error/shutdown──▶ Closing ──▶ Closed
//!     │
//!     └──empty name / timeout / full / disconnect──────────────────────────▶ Closed
//! ```
//!
//! While `Connecting` the session writes to its socket directly. After login
//! the write half moves into a writer task fed by the session's
//! [`OutboundQueue`], so the greeting, chat lines and notices all reach the
//! client in enqueue order.
//!
//! # Panic-Free Guarantees
//!
//! This module follows the panic-free policy:
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - Connection errors are logged and result in graceful disconnect

mod outbound;
mod writer;

pub use outbound::{Delivery, OutboundQueue};

use std::net::SocketAddr;
use std::time::{Duration, Instant};

use relay_core::{ChatMessage, DisplayName, SessionId, SessionState};
use relay_protocol::{decode_line, LineError, ServerLine};
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn, Instrument};

use crate::broadcast::Broadcaster;
use crate::config::Config;
use crate::registry::{Member, RegistryError, RegistryHandle};

// ============================================================================
// Limits and shared context
// ============================================================================

/// Per-session limits, normally derived from [`Config::session_limits`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionLimits {
    /// Outbound queue capacity, in lines
    pub queue_capacity: usize,
    /// What a full outbound queue does with a new line
    pub overflow_policy: relay_core::OverflowPolicy,
    /// Maximum line length in bytes, terminator excluded
    pub max_line_length: usize,
    /// How long a client has to send its name
    pub login_timeout: Duration,
    /// How long a single write may take
    pub write_timeout: Duration,
}

impl Default for SessionLimits {
    fn default() -> Self {
        Config::default().session_limits()
    }
}

/// Everything a session shares with the rest of the server.
#[derive(Clone)]
pub struct SessionContext {
    pub registry: RegistryHandle,
    pub broadcaster: Broadcaster,
    pub limits: SessionLimits,
}

impl SessionContext {
    pub fn new(registry: RegistryHandle, limits: SessionLimits) -> Self {
        Self {
            broadcaster: Broadcaster::new(registry.clone()),
            registry,
            limits,
        }
    }
}

// ============================================================================
// Errors
// ============================================================================

/// Errors on an individual connection.
#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("I/O error: {0}")]
    Io(String),

    #[error("Write timeout")]
    WriteTimeout,

    #[error(transparent)]
    Line(#[from] LineError),

    #[error("Connection closed")]
    Closed,
}

/// Reasons a session never reaches `Authenticated`.
#[derive(Debug, Error)]
pub enum LoginError {
    #[error("Display name is empty")]
    EmptyName,

    #[error("Login timed out")]
    Timeout,

    #[error("Client disconnected before logging in")]
    Disconnected,

    #[error("Server shutting down")]
    Shutdown,

    #[error("Connection error during login: {0}")]
    Connection(#[from] ConnectionError),

    #[error("Registration failed: {0}")]
    Registry(#[from] RegistryError),
}

impl LoginError {
    /// The line to send the client before closing, if any.
    pub fn reply(&self) -> Option<ServerLine<'static>> {
        match self {
            Self::EmptyName | Self::Timeout => Some(ServerLine::Unauthorized),
            Self::Connection(ConnectionError::Line(_)) => Some(ServerLine::Unauthorized),
            Self::Registry(RegistryError::RegistryFull { .. }) => Some(ServerLine::ServerFull),
            _ => None,
        }
    }
}

/// Why the read loop stopped.
#[derive(Debug)]
enum CloseReason {
    ClientClosed,
    Cancelled,
    Failed(ConnectionError),
}

// ============================================================================
// Session
// ============================================================================

/// One client connection, from accept to close.
pub struct Session {
    id: SessionId,
    peer: SocketAddr,
    state: SessionState,
    name: Option<DisplayName>,

    /// Buffered reader for incoming lines
    reader: BufReader<OwnedReadHalf>,

    /// Write half, until it moves into the writer task
    writer: Option<OwnedWriteHalf>,
    writer_task: Option<JoinHandle<()>>,

    /// Lines waiting to be written once logged in
    outbound: OutboundQueue,

    ctx: SessionContext,

    /// Fires on server shutdown or when either side of this session fails
    cancel: CancellationToken,

    started: Instant,
}

impl Session {
    /// Creates a session for an accepted connection.
    ///
    /// `cancel` should be a child of the server's shutdown token.
    pub fn new(
        id: SessionId,
        stream: TcpStream,
        peer: SocketAddr,
        ctx: SessionContext,
        cancel: CancellationToken,
    ) -> Self {
        let (reader, writer) = stream.into_split();
        let outbound = OutboundQueue::new(ctx.limits.queue_capacity, ctx.limits.overflow_policy);

        Self {
            id,
            peer,
            state: SessionState::default(),
            name: None,
            reader: BufReader::new(reader),
            writer: Some(writer),
            writer_task: None,
            outbound,
            ctx,
            cancel,
            started: Instant::now(),
        }
    }

    /// Runs the session to completion.
    pub async fn run(mut self) {
        debug!(session_id = %self.id, peer = %self.peer, "Connection accepted");

        let name = match self.login().await {
            Ok(name) => name,
            Err(e) => {
                self.reject(e).await;
                return;
            }
        };

        if let Err(e) = self.authenticate(&name).await {
            self.reject(e).await;
            return;
        }

        info!(
            session_id = %self.id,
            peer = %self.peer,
            name = %name,
            "Client joined"
        );

        self.ctx
            .broadcaster
            .announce(ServerLine::joined(&name), Some(self.id))
            .await;

        match self.read_loop(&name).await {
            CloseReason::ClientClosed => {
                debug!(session_id = %self.id, "Client closed connection");
            }
            CloseReason::Cancelled => {
                debug!(session_id = %self.id, "Session cancelled");
            }
            CloseReason::Failed(e) => {
                debug!(session_id = %self.id, error = %e, "Connection failed");
            }
        }

        self.close().await;
    }

    // ========================================================================
    // Login
    // ========================================================================

    /// Sends the prompt and reads one display name.
    async fn login(&mut self) -> Result<DisplayName, LoginError> {
        self.write_direct(ServerLine::Prompt).await?;

        let cancel = self.cancel.clone();
        let login_timeout = self.ctx.limits.login_timeout;

        let line = tokio::select! {
            _ = cancel.cancelled() => return Err(LoginError::Shutdown),
            result = timeout(login_timeout, self.read_line()) => match result {
                Ok(Ok(Some(line))) => line,
                Ok(Ok(None)) => return Err(LoginError::Disconnected),
                Ok(Err(e)) => return Err(e.into()),
                Err(_) => return Err(LoginError::Timeout),
            },
        };

        DisplayName::parse(&line).map_err(|_| LoginError::EmptyName)
    }

    /// Queues the greeting, joins the registry and starts the writer.
    ///
    /// The greeting goes onto the queue before the session is visible to
    /// broadcasters, so it is always the first line the client sees.
    async fn authenticate(&mut self, name: &DisplayName) -> Result<(), LoginError> {
        self.outbound.deliver(ServerLine::greeting(name).to_wire());

        let member = Member::new(self.id, name.clone(), self.outbound.clone());
        self.ctx.registry.add(member).await?;

        self.name = Some(name.clone());
        self.set_state(SessionState::Authenticated);
        self.spawn_writer();
        Ok(())
    }

    /// Tells the client why it was turned away, then closes.
    async fn reject(&mut self, err: LoginError) {
        match &err {
            LoginError::Disconnected | LoginError::Shutdown => {
                debug!(session_id = %self.id, peer = %self.peer, reason = %err, "Login abandoned");
            }
            _ => {
                warn!(session_id = %self.id, peer = %self.peer, error = %err, "Login rejected");
            }
        }

        self.outbound.close();
        if let Some(reply) = err.reply() {
            if let Err(e) = self.write_direct(reply).await {
                debug!(session_id = %self.id, error = %e, "Failed to send rejection");
            }
        }

        if let Some(mut writer) = self.writer.take() {
            let _ = writer.shutdown().await;
        }
        self.set_state(SessionState::Closed);
    }

    // ========================================================================
    // Relay
    // ========================================================================

    /// Reads lines and relays each one until EOF, error or cancellation.
    async fn read_loop(&mut self, name: &DisplayName) -> CloseReason {
        let cancel = self.cancel.clone();

        loop {
            let line = tokio::select! {
                _ = cancel.cancelled() => return CloseReason::Cancelled,
                line = self.read_line() => line,
            };

            let text = match line {
                Ok(Some(text)) => text,
                Ok(None) => return CloseReason::ClientClosed,
                Err(e) => return CloseReason::Failed(e),
            };

            let message = ChatMessage::new(self.id, name.clone(), text);
            let report = self.ctx.broadcaster.broadcast(&message).await;
            trace!(
                session_id = %self.id,
                recipients = report.recipients(),
                dropped = report.dropped,
                "Relayed line"
            );
        }
    }

    /// Reads one line, without its terminator.
    ///
    /// Returns `Ok(None)` on EOF. A final unterminated line is still
    /// returned before EOF is reported.
    async fn read_line(&mut self) -> Result<Option<String>, ConnectionError> {
        let max = self.ctx.limits.max_line_length;
        // Room for the content plus "\r\n", and one byte more to detect overflow
        let limit = (max as u64).saturating_add(2);

        let mut raw = Vec::new();
        let bytes_read = (&mut self.reader)
            .take(limit)
            .read_until(b'\n', &mut raw)
            .await
            .map_err(|e| ConnectionError::Io(e.to_string()))?;

        if bytes_read == 0 {
            return Ok(None);
        }

        let raw = String::from_utf8_lossy(&raw);
        let line = decode_line(&raw, max)?;
        Ok(Some(line.to_string()))
    }

    // ========================================================================
    // Writing
    // ========================================================================

    /// Writes straight to the socket. Only valid before the writer starts.
    async fn write_direct(&mut self, line: ServerLine<'_>) -> Result<(), ConnectionError> {
        let writer = self.writer.as_mut().ok_or(ConnectionError::Closed)?;
        writer::write_line(writer, &line.to_wire(), self.ctx.limits.write_timeout).await
    }

    fn spawn_writer(&mut self) {
        let Some(writer) = self.writer.take() else {
            return;
        };

        self.writer_task = Some(tokio::spawn(
            writer::run(
                self.id,
                writer,
                self.outbound.clone(),
                self.cancel.clone(),
                self.ctx.limits.write_timeout,
            )
            .in_current_span(),
        ));
    }

    // ========================================================================
    // Teardown
    // ========================================================================

    /// Deregisters, stops the writer and announces the leave.
    ///
    /// Safe to call more than once; only the first call has any effect.
    async fn close(&mut self) {
        if self.state.is_terminal() || self.state == SessionState::Closing {
            return;
        }
        self.set_state(SessionState::Closing);

        self.cancel.cancel();
        self.outbound.close();

        let member = match self.ctx.registry.remove(self.id).await {
            Ok(member) => member,
            Err(e) => {
                warn!(session_id = %self.id, error = %e, "Failed to deregister session");
                None
            }
        };

        if let Some(mut task) = self.writer_task.take() {
            if timeout(self.ctx.limits.write_timeout, &mut task)
                .await
                .is_err()
            {
                warn!(session_id = %self.id, "Writer did not stop in time, aborting");
                task.abort();
            }
        }
        if let Some(mut writer) = self.writer.take() {
            let _ = writer.shutdown().await;
        }

        if let Some(name) = self.name.clone() {
            let report = self
                .ctx
                .broadcaster
                .announce(ServerLine::left(&name), None)
                .await;

            info!(
                session_id = %self.id,
                name = %name,
                notified = report.delivered,
                connected_secs = member.map(|m| m.connected_for().num_seconds()).unwrap_or(0),
                "Client left"
            );
        }

        self.set_state(SessionState::Closed);
        debug!(
            session_id = %self.id,
            lifetime_ms = self.started.elapsed().as_millis() as u64,
            "Session closed"
        );
    }

    fn set_state(&mut self, next: SessionState) {
        match self.state.transition(self.id, next) {
            Ok(state) => self.state = state,
            Err(e) => error!(error = %e, "Session state machine violated"),
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        // Covers a task aborted mid-session.
        if let Some(task) = self.writer_task.take() {
            task.abort();
        }
        self.outbound.close();
    }
}

//! TCP server for the relay daemon.
//!
//! The server:
//! - Listens on a TCP address for client connections
//! - Mints a `SessionId` and spawns a `Session` for each client
//! - Supports graceful shutdown via CancellationToken
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │   ChatServer    │
//! │                 │
//! │  TcpListener    │
//! └───────┬─────────┘
//!         │ accept()
//!         ▼
//! ┌─────────────────┐     ┌─────────────────┐
//! │    Session      │────▶│  RegistryHandle │
//! │  (per client)   │     │                 │
//! └─────────────────┘     └─────────────────┘
//!         │
//!         │ broadcast
//!         ▼
//! ┌─────────────────┐
//! │ other sessions' │
//! │ outbound queues │
//! └─────────────────┘
//! ```
//!
//! # Panic-Free Guarantees
//!
//! This module follows the panic-free policy:
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - All fallible operations use `?`, pattern matching, or `unwrap_or`
//! - Accept errors are logged and allow continued operation

use std::net::SocketAddr;
use std::time::Duration;

use relay_core::SessionIdGenerator;
use tokio::net::{TcpListener, TcpStream};
use tokio::time::{sleep, timeout};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn, Instrument};

use crate::config::Config;
use crate::registry::RegistryHandle;
use crate::session::{Session, SessionContext};

/// Pause after a failed accept, so a persistent error (e.g. EMFILE) does
/// not spin the loop.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(50);

/// TCP server for the relay daemon.
///
/// Owns the listener and every session task it spawns.
pub struct ChatServer {
    listener: TcpListener,
    local_addr: SocketAddr,

    /// State shared with every session
    ctx: SessionContext,

    /// Cancellation token for graceful shutdown
    cancel_token: CancellationToken,

    /// Mints session ids in accept order
    ids: SessionIdGenerator,

    /// Running session tasks
    sessions: TaskTracker,

    shutdown_timeout: Duration,
}

impl ChatServer {
    /// Binds the listening socket.
    ///
    /// Nothing is accepted until [`ChatServer::run`] is called, but the
    /// address is already reserved, so tests can bind port 0 and read the
    /// real port from [`ChatServer::local_addr`].
    ///
    /// # Errors
    ///
    /// Returns `ServerError::Bind` if the address is unusable or taken.
    pub async fn bind(
        config: &Config,
        registry: RegistryHandle,
        cancel_token: CancellationToken,
    ) -> Result<Self, ServerError> {
        let listener =
            TcpListener::bind(&config.bind_address)
                .await
                .map_err(|source| ServerError::Bind {
                    address: config.bind_address.clone(),
                    source,
                })?;
        let local_addr = listener.local_addr().map_err(ServerError::LocalAddr)?;

        Ok(Self {
            listener,
            local_addr,
            ctx: SessionContext::new(registry, config.session_limits()),
            cancel_token,
            ids: SessionIdGenerator::new(),
            sessions: TaskTracker::new(),
            shutdown_timeout: config.shutdown_timeout(),
        })
    }

    /// The address actually bound.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Handle to the registry the server's sessions join.
    pub fn registry(&self) -> &RegistryHandle {
        &self.ctx.registry
    }

    /// Runs the accept loop until the cancellation token is triggered,
    /// then shuts down.
    pub async fn run(self) {
        info!(address = %self.local_addr, "Chat server listening");

        loop {
            tokio::select! {
                _ = self.cancel_token.cancelled() => {
                    info!("Server shutdown requested");
                    break;
                }

                result = self.listener.accept() => {
                    match result {
                        Ok((stream, peer)) => self.handle_connection(stream, peer),
                        Err(e) => {
                            error!(error = %e, "Failed to accept connection");
                            sleep(ACCEPT_BACKOFF).await;
                        }
                    }
                }
            }
        }

        self.shutdown().await;
    }

    /// Spawns a session task for an accepted connection.
    fn handle_connection(&self, stream: TcpStream, peer: SocketAddr) {
        if let Err(e) = stream.set_nodelay(true) {
            debug!(peer = %peer, error = %e, "Failed to set TCP_NODELAY");
        }

        let id = self.ids.next();
        let session = Session::new(
            id,
            stream,
            peer,
            self.ctx.clone(),
            self.cancel_token.child_token(),
        );

        self.sessions.spawn(session.run().in_current_span());
    }

    /// Stops accepting, cancels all sessions and waits for them to finish.
    async fn shutdown(self) {
        let Self {
            listener,
            cancel_token,
            sessions,
            shutdown_timeout,
            ..
        } = self;

        drop(listener);
        cancel_token.cancel();
        sessions.close();

        info!(sessions = sessions.len(), "Waiting for sessions to close");

        if timeout(shutdown_timeout, sessions.wait()).await.is_err() {
            warn!(
                remaining = sessions.len(),
                timeout_secs = shutdown_timeout.as_secs(),
                "Sessions did not close in time"
            );
        }

        info!("Server shutdown complete");
    }
}

/// Errors that can occur in server operations.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read local address: {0}")]
    LocalAddr(#[source] std::io::Error),
}

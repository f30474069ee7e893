//! Session identity and lifecycle state.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::{DomainError, DomainResult};

// ============================================================================
// Type-Safe Identifiers
// ============================================================================

/// Process-unique identifier for a client session.
///
/// Minted at accept time from a monotonic counter. Never derived from the
/// peer address, which can be reused or shared behind NAT.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(u64);

impl SessionId {
    /// Creates a SessionId from a raw counter value.
    pub const fn new(id: u64) -> Self {
        Self(id)
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "session-{}", self.0)
    }
}

/// Monotonic source of [`SessionId`]s.
///
/// Safe to share across tasks; every call to [`next`](Self::next) returns
/// an id that has never been handed out by this generator.
#[derive(Debug)]
pub struct SessionIdGenerator {
    counter: AtomicU64,
}

impl SessionIdGenerator {
    /// Creates a generator whose first id is `session-1`.
    pub const fn new() -> Self {
        Self {
            counter: AtomicU64::new(1),
        }
    }

    /// Mints the next id.
    pub fn next(&self) -> SessionId {
        SessionId(self.counter.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for SessionIdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Session State Machine
// ============================================================================

/// Lifecycle state of a client session.
///
/// ```text
/// Connecting ──login ok──▶ Authenticated ──eof/error/shutdown──▶ Closing
///     │                                                            │
///     └──────────────login failed──────────▶ Closed ◀──deregistered─┘
/// ```
///
/// `Closed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SessionState {
    /// Accepted, waiting for the display name.
    #[default]
    Connecting,

    /// Logged in and present in the registry.
    Authenticated,

    /// Tearing down: deregistering and closing the connection.
    Closing,

    /// Connection closed and loops terminated.
    Closed,
}

impl SessionState {
    /// Returns true if the state machine allows moving from `self` to `next`.
    #[must_use]
    pub fn can_transition_to(&self, next: SessionState) -> bool {
        matches!(
            (self, next),
            (Self::Connecting, Self::Authenticated)
                | (Self::Connecting, Self::Closed)
                | (Self::Authenticated, Self::Closing)
                | (Self::Closing, Self::Closed)
        )
    }

    /// Validates a transition, returning the new state.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidTransition` if the move is not allowed.
    pub fn transition(self, session_id: SessionId, next: SessionState) -> DomainResult<Self> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(DomainError::InvalidTransition {
                session_id,
                from: self,
                to: next,
            })
        }
    }

    /// Returns true once the session can no longer accept queued lines.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Closed)
    }

    /// Returns the lowercase label used in logs.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Connecting => "connecting",
            Self::Authenticated => "authenticated",
            Self::Closing => "closing",
            Self::Closed => "closed",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

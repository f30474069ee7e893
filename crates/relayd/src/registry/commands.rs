//! Registry actor commands, errors, and members.
//!
//! This module defines the message types for communicating with the `RegistryActor`:
//! - `RegistryCommand`: Commands sent to the actor
//! - `RegistryError`: Errors that can occur during registry operations
//! - `Member`: One authenticated session as seen by the registry
//!
//! All types are designed for async message passing and follow the panic-free policy.

use chrono::{DateTime, Utc};
use relay_core::{DisplayName, SessionId};
use thiserror::Error;
use tokio::sync::oneshot;

use crate::session::{Delivery, OutboundQueue};

// ============================================================================
// Members
// ============================================================================

/// An authenticated session as stored in the registry.
///
/// Holds a clone of the session's outbound queue handle, which is all the
/// broadcaster needs to reach it. Cheap to clone.
#[derive(Debug, Clone)]
pub struct Member {
    /// Session identifier (registry key)
    pub id: SessionId,
    /// Name chosen at login
    pub name: DisplayName,
    /// Handle to the session's outbound queue
    pub outbound: OutboundQueue,
    /// When the session logged in
    pub joined_at: DateTime<Utc>,
}

impl Member {
    /// Creates a member that joined now.
    pub fn new(id: SessionId, name: DisplayName, outbound: OutboundQueue) -> Self {
        Self {
            id,
            name,
            outbound,
            joined_at: Utc::now(),
        }
    }

    /// Enqueues a line for this member without blocking.
    pub fn deliver(&self, line: String) -> Delivery {
        self.outbound.deliver(line)
    }

    /// How long this member has been logged in.
    pub fn connected_for(&self) -> chrono::Duration {
        Utc::now().signed_duration_since(self.joined_at)
    }
}

/// Immutable copy of the membership, in join order.
pub type Snapshot = Vec<Member>;

// ============================================================================
// Registry Commands
// ============================================================================

/// Commands sent to the registry actor.
///
/// Each command uses a oneshot channel for the response, enabling
/// request-response patterns in async code without blocking.
#[derive(Debug)]
pub enum RegistryCommand {
    /// Add an authenticated session.
    ///
    /// # Errors
    /// - `RegistryError::AlreadyRegistered` if the id is already present
    /// - `RegistryError::RegistryFull` if at maximum capacity
    Add {
        /// The member to insert
        member: Member,
        /// Channel to send the result
        respond_to: oneshot::Sender<Result<(), RegistryError>>,
    },

    /// Remove a session. Answers with the removed member, if any.
    Remove {
        /// ID of the session to remove
        session_id: SessionId,
        /// Channel to send the result
        respond_to: oneshot::Sender<Option<Member>>,
    },

    /// Copy the current membership.
    Snapshot {
        /// Channel to send the copy
        respond_to: oneshot::Sender<Snapshot>,
    },

    /// Count the current members.
    Count {
        /// Channel to send the count
        respond_to: oneshot::Sender<usize>,
    },
}

// ============================================================================
// Registry Errors
// ============================================================================

/// Errors that can occur during registry operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// The id is already present. Ids are minted uniquely at accept time,
    /// so this is an internal invariant violation.
    #[error("session already registered: {0}")]
    AlreadyRegistered(SessionId),

    /// The registry has reached its maximum session capacity.
    #[error("registry is full (max: {max} sessions)")]
    RegistryFull {
        /// Maximum number of sessions allowed
        max: usize,
    },

    /// The response channel was closed before receiving a response.
    ///
    /// This typically indicates the actor was shut down.
    #[error("response channel closed")]
    ChannelClosed,
}

#[cfg(test)]
mod tests {
    use super::*;
    use relay_core::OverflowPolicy;

    #[test]
    fn test_member_deliver_reaches_queue() {
        let queue = OutboundQueue::new(4, OverflowPolicy::DropOldest);
        let member = Member::new(
            SessionId::new(1),
            DisplayName::parse("alice").unwrap(),
            queue.clone(),
        );

        assert_eq!(member.deliver("hi\n".to_string()), Delivery::Queued);
        assert_eq!(queue.len(), 1);
        assert!(member.connected_for() >= chrono::Duration::zero());
    }

    #[test]
    fn test_error_display() {
        let err = RegistryError::AlreadyRegistered(SessionId::new(9));
        assert_eq!(err.to_string(), "session already registered: session-9");

        let err = RegistryError::RegistryFull { max: 3 };
        assert!(err.to_string().contains('3'));
    }
}

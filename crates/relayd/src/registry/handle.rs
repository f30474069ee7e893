//! Client interface for interacting with the RegistryActor.
//!
//! The `RegistryHandle` provides a cheap-to-clone interface for sending
//! commands to the registry actor.
//!
//! # Panic-Free Guarantees
//!
//! This module follows the panic-free policy:
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - Channel errors are mapped to `RegistryError::ChannelClosed`

use relay_core::SessionId;
use tokio::sync::{mpsc, oneshot};

use super::commands::{Member, RegistryCommand, RegistryError, Snapshot};

/// Handle for interacting with the registry actor.
///
/// This is a cheap-to-clone handle that can be shared across tasks.
/// All methods are async and communicate with the actor via channels.
#[derive(Clone)]
pub struct RegistryHandle {
    /// Command sender to the actor
    sender: mpsc::Sender<RegistryCommand>,
}

impl RegistryHandle {
    /// Create a new registry handle.
    pub fn new(sender: mpsc::Sender<RegistryCommand>) -> Self {
        Self { sender }
    }

    /// Add an authenticated session.
    ///
    /// # Errors
    ///
    /// - `RegistryError::AlreadyRegistered` if the id is already present
    /// - `RegistryError::RegistryFull` if the registry is at maximum capacity
    /// - `RegistryError::ChannelClosed` if the actor has shut down
    pub async fn add(&self, member: Member) -> Result<(), RegistryError> {
        let (tx, rx) = oneshot::channel();

        self.sender
            .send(RegistryCommand::Add {
                member,
                respond_to: tx,
            })
            .await
            .map_err(|_| RegistryError::ChannelClosed)?;

        rx.await.map_err(|_| RegistryError::ChannelClosed)?
    }

    /// Remove a session. Removing an absent id is a no-op.
    ///
    /// Returns the removed member, if there was one.
    ///
    /// # Errors
    ///
    /// - `RegistryError::ChannelClosed` if the actor has shut down
    pub async fn remove(&self, session_id: SessionId) -> Result<Option<Member>, RegistryError> {
        let (tx, rx) = oneshot::channel();

        self.sender
            .send(RegistryCommand::Remove {
                session_id,
                respond_to: tx,
            })
            .await
            .map_err(|_| RegistryError::ChannelClosed)?;

        rx.await.map_err(|_| RegistryError::ChannelClosed)
    }

    /// Copy the current membership.
    ///
    /// The copy is taken inside the actor and handed over, so callers can
    /// iterate (and enqueue) for as long as they like without holding up
    /// concurrent adds and removes.
    ///
    /// Returns an empty vector if communication with the actor fails.
    pub async fn snapshot(&self) -> Snapshot {
        let (tx, rx) = oneshot::channel();

        if self
            .sender
            .send(RegistryCommand::Snapshot { respond_to: tx })
            .await
            .is_err()
        {
            return Vec::new();
        }

        rx.await.unwrap_or_default()
    }

    /// Number of authenticated sessions.
    ///
    /// Returns 0 if communication with the actor fails.
    pub async fn count(&self) -> usize {
        let (tx, rx) = oneshot::channel();

        if self
            .sender
            .send(RegistryCommand::Count { respond_to: tx })
            .await
            .is_err()
        {
            return 0;
        }

        rx.await.unwrap_or_default()
    }

    /// Check if the actor is still running.
    ///
    /// Returns `true` if the command channel is still open.
    pub fn is_connected(&self) -> bool {
        !self.sender.is_closed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::OutboundQueue;
    use relay_core::{DisplayName, OverflowPolicy};

    fn create_test_handle() -> (RegistryHandle, mpsc::Receiver<RegistryCommand>) {
        let (cmd_tx, cmd_rx) = mpsc::channel(16);
        (RegistryHandle::new(cmd_tx), cmd_rx)
    }

    fn create_test_member(id: u64) -> Member {
        Member::new(
            SessionId::new(id),
            DisplayName::parse("tester").unwrap(),
            OutboundQueue::new(4, OverflowPolicy::DropOldest),
        )
    }

    #[tokio::test]
    async fn test_add_sends_command() {
        let (handle, mut rx) = create_test_handle();

        let cmd_handler = tokio::spawn(async move {
            if let Some(RegistryCommand::Add { member, respond_to }) = rx.recv().await {
                assert_eq!(member.id, SessionId::new(7));
                let _ = respond_to.send(Ok(()));
                return true;
            }
            false
        });

        let result = handle.add(create_test_member(7)).await;
        assert!(result.is_ok());
        assert!(cmd_handler.await.unwrap());
    }

    #[tokio::test]
    async fn test_add_channel_closed_error() {
        let (handle, rx) = create_test_handle();
        drop(rx);

        let result = handle.add(create_test_member(1)).await;
        assert!(matches!(result, Err(RegistryError::ChannelClosed)));
    }

    #[tokio::test]
    async fn test_remove_reports_absent() {
        let (handle, mut rx) = create_test_handle();

        tokio::spawn(async move {
            if let Some(RegistryCommand::Remove { respond_to, .. }) = rx.recv().await {
                let _ = respond_to.send(None);
            }
        });

        let removed = handle.remove(SessionId::new(5)).await.unwrap();
        assert!(removed.is_none());
    }

    #[tokio::test]
    async fn test_snapshot_returns_empty_on_channel_close() {
        let (handle, rx) = create_test_handle();
        drop(rx);

        assert!(handle.snapshot().await.is_empty());
        assert_eq!(handle.count().await, 0);
    }

    #[tokio::test]
    async fn test_is_connected() {
        let (handle, rx) = create_test_handle();
        assert!(handle.is_connected());

        drop(rx);
        assert!(!handle.is_connected());
    }
}

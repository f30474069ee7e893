//! Registry actor - owns the membership map and processes commands.
//!
//! The RegistryActor is the single owner of membership state. It receives
//! commands via an mpsc channel and answers each over a oneshot channel.
//!
//! # Panic-Free Guarantees
//!
//! This module follows the panic-free policy:
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - Reply send failures are ignored (the caller gave up waiting)

use std::collections::BTreeMap;

use relay_core::SessionId;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use super::commands::{Member, RegistryCommand, RegistryError, Snapshot};

/// The registry actor - owns all membership state.
///
/// Implements the actor pattern: receives commands via mpsc channel and
/// processes them sequentially, so `add`/`remove` are serialized and a
/// snapshot never observes a half-applied change.
///
/// # Ordering
///
/// Members are keyed by `SessionId` in a `BTreeMap`. Ids are minted in
/// accept order, so snapshots list members roughly in join order.
pub struct RegistryActor {
    /// Command receiver
    receiver: mpsc::Receiver<RegistryCommand>,

    /// Authenticated sessions by id
    members: BTreeMap<SessionId, Member>,

    /// Capacity limit
    max_sessions: usize,
}

impl RegistryActor {
    /// Creates a new registry actor.
    pub fn new(receiver: mpsc::Receiver<RegistryCommand>, max_sessions: usize) -> Self {
        Self {
            receiver,
            members: BTreeMap::new(),
            max_sessions,
        }
    }

    /// Runs the actor event loop.
    ///
    /// Processes commands until the channel closes (all handles dropped).
    pub async fn run(mut self) {
        info!(max_sessions = self.max_sessions, "Registry actor starting");

        while let Some(cmd) = self.receiver.recv().await {
            self.handle_command(cmd);
        }

        info!(members = self.members.len(), "Registry actor stopped");
    }

    /// Dispatches a command to the appropriate handler.
    fn handle_command(&mut self, cmd: RegistryCommand) {
        match cmd {
            RegistryCommand::Add { member, respond_to } => {
                let result = self.handle_add(member);
                // Ignore send error - client may have dropped the receiver
                let _ = respond_to.send(result);
            }
            RegistryCommand::Remove {
                session_id,
                respond_to,
            } => {
                let removed = self.handle_remove(session_id);
                let _ = respond_to.send(removed);
            }
            RegistryCommand::Snapshot { respond_to } => {
                let _ = respond_to.send(self.handle_snapshot());
            }
            RegistryCommand::Count { respond_to } => {
                let _ = respond_to.send(self.members.len());
            }
        }
    }

    // ========================================================================
    // Command Handlers
    // ========================================================================

    fn handle_add(&mut self, member: Member) -> Result<(), RegistryError> {
        if self.members.contains_key(&member.id) {
            error!(
                session_id = %member.id,
                "Duplicate session id, registry invariant violated"
            );
            return Err(RegistryError::AlreadyRegistered(member.id));
        }

        if self.members.len() >= self.max_sessions {
            warn!(
                session_id = %member.id,
                current = self.members.len(),
                max = self.max_sessions,
                "Registry is full, rejecting session"
            );
            return Err(RegistryError::RegistryFull {
                max: self.max_sessions,
            });
        }

        let session_id = member.id;
        let name = member.name.clone();
        self.members.insert(session_id, member);

        debug!(
            session_id = %session_id,
            name = %name,
            total_sessions = self.members.len(),
            "Session registered"
        );

        Ok(())
    }

    fn handle_remove(&mut self, session_id: SessionId) -> Option<Member> {
        let removed = self.members.remove(&session_id);
        if removed.is_some() {
            debug!(
                session_id = %session_id,
                total_sessions = self.members.len(),
                "Session deregistered"
            );
        }
        removed
    }

    fn handle_snapshot(&self) -> Snapshot {
        self.members.values().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::OutboundQueue;
    use relay_core::{DisplayName, OverflowPolicy};

    fn member(id: u64, name: &str) -> Member {
        Member::new(
            SessionId::new(id),
            DisplayName::parse(name).unwrap(),
            OutboundQueue::new(4, OverflowPolicy::DropOldest),
        )
    }

    fn actor(max: usize) -> RegistryActor {
        let (_tx, rx) = mpsc::channel(1);
        RegistryActor::new(rx, max)
    }

    #[test]
    fn test_add_and_snapshot_in_id_order() {
        let mut actor = actor(10);
        actor.handle_add(member(3, "c")).unwrap();
        actor.handle_add(member(1, "a")).unwrap();
        actor.handle_add(member(2, "b")).unwrap();

        let names: Vec<_> = actor
            .handle_snapshot()
            .iter()
            .map(|m| m.name.to_string())
            .collect();
        assert_eq!(names, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let mut actor = actor(10);
        actor.handle_add(member(1, "a")).unwrap();
        let err = actor.handle_add(member(1, "impostor")).unwrap_err();
        assert_eq!(err, RegistryError::AlreadyRegistered(SessionId::new(1)));

        // Original entry untouched
        let snapshot = actor.handle_snapshot();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].name.as_str(), "a");
    }

    #[test]
    fn test_capacity_enforced() {
        let mut actor = actor(2);
        actor.handle_add(member(1, "a")).unwrap();
        actor.handle_add(member(2, "b")).unwrap();
        assert_eq!(
            actor.handle_add(member(3, "c")),
            Err(RegistryError::RegistryFull { max: 2 })
        );

        // Room again after a removal
        assert!(actor.handle_remove(SessionId::new(1)).is_some());
        actor.handle_add(member(3, "c")).unwrap();
    }

    #[test]
    fn test_remove_absent_is_noop() {
        let mut actor = actor(2);
        assert!(actor.handle_remove(SessionId::new(42)).is_none());
        assert!(actor.handle_snapshot().is_empty());
    }

    #[test]
    fn test_snapshot_is_a_copy() {
        let mut actor = actor(10);
        actor.handle_add(member(1, "a")).unwrap();
        let snapshot = actor.handle_snapshot();

        actor.handle_remove(SessionId::new(1));
        actor.handle_add(member(2, "b")).unwrap();

        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].id, SessionId::new(1));
    }
}

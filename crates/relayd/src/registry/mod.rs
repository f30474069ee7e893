//! Session registry using Actor pattern.
//!
//! The registry is the membership set of authenticated sessions. It
//! receives commands via a tokio mpsc channel and is the only place
//! membership is mutated.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐     ┌─────────────────┐
//! │    Session      │────▶│  RegistryActor  │
//! │ (add / remove)  │     │                 │
//! └─────────────────┘     │ BTreeMap<       │
//!                         │   SessionId,    │
//! ┌─────────────────┐     │   Member>       │
//! │  Broadcaster    │◀───▶│                 │
//! │  (snapshot)     │     └─────────────────┘
//! └─────────────────┘
//!      RegistryCommand (mpsc) / reply (oneshot)
//! ```
//!
//! Membership mirrors the set of sessions in the `Authenticated` state: a
//! session adds itself right after login and removes itself first thing
//! when it starts closing.
//!
//! # Panic-Free Guarantees
//!
//! All operations in this module follow the panic-free policy:
//! - No `.unwrap()` or `.expect()` in production code
//! - All fallible operations return `Result` or `Option`
//! - Channel operations handle closure gracefully

use tokio::sync::mpsc;
use tracing::Instrument;

mod actor;
mod commands;
mod handle;

pub use actor::RegistryActor;
pub use commands::{Member, RegistryCommand, RegistryError, Snapshot};
pub use handle::RegistryHandle;

/// Command channel buffer size
const COMMAND_BUFFER: usize = 256;

/// Spawn the registry actor and return a handle for interaction.
///
/// The actor runs until every handle has been dropped.
///
/// # Example
///
/// ```no_run
/// use relayd::registry::spawn_registry;
///
/// #[tokio::main]
/// async fn main() {
///     let handle = spawn_registry(64);
///     let members = handle.snapshot().await;
///     assert!(members.is_empty());
/// }
/// ```
pub fn spawn_registry(max_sessions: usize) -> RegistryHandle {
    let (cmd_tx, cmd_rx) = mpsc::channel(COMMAND_BUFFER);

    let actor = RegistryActor::new(cmd_rx, max_sessions);
    tokio::spawn(actor.run().in_current_span());

    RegistryHandle::new(cmd_tx)
}

//! Relay Core - Shared domain types for the line relay
//!
//! This crate provides the domain types shared between the wire
//! protocol (relay-protocol) and the daemon (relayd).
//!
//! All code follows the panic-free policy: no `.unwrap()`, `.expect()`,
//! `panic!()`, `unreachable!()`, `todo!()`, or direct indexing `[i]`.

pub mod error;
pub mod message;
pub mod name;
pub mod policy;
pub mod session;

// Re-exports for convenience
pub use error::{DomainError, DomainResult};
pub use message::ChatMessage;
pub use name::DisplayName;
pub use policy::OverflowPolicy;
pub use session::{SessionId, SessionIdGenerator, SessionState};

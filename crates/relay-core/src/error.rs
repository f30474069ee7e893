//! Domain-specific error types following panic-free policy.

use crate::{SessionId, SessionState};
use thiserror::Error;

/// Errors that can occur in domain operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Display name was empty after trimming
    #[error("Display name must not be empty")]
    EmptyDisplayName,

    /// A session attempted a transition its state machine does not allow
    #[error("Invalid state transition for {session_id}: {from} -> {to}")]
    InvalidTransition {
        session_id: SessionId,
        from: SessionState,
        to: SessionState,
    },

    /// Invalid field value
    #[error("Invalid {field}: {value} (expected {expected})")]
    InvalidFieldValue {
        field: String,
        value: String,
        expected: String,
    },
}

/// Result type for domain operations.
pub type DomainResult<T> = Result<T, DomainError>;

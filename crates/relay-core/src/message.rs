//! Chat messages produced by a session's read loop.

use crate::{DisplayName, SessionId};

/// One line of chat text produced by an authenticated session.
///
/// Transient: built per received line, handed to the broadcaster and
/// dropped once fanned out. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    /// Session that produced the line (excluded from fan-out)
    pub sender_id: SessionId,
    /// Display name of the sender at login
    pub sender_name: DisplayName,
    /// Line text without its terminator
    pub text: String,
}

impl ChatMessage {
    /// Creates a new chat message.
    pub fn new(sender_id: SessionId, sender_name: DisplayName, text: impl Into<String>) -> Self {
        Self {
            sender_id,
            sender_name,
            text: text.into(),
        }
    }
}

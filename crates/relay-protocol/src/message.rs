//! Lines sent from the daemon to clients.

use std::fmt;

use relay_core::{ChatMessage, DisplayName};

/// Prompt sent as soon as a connection is accepted.
pub const USERNAME_PROMPT: &str = "Type your username: ";

/// A line the daemon writes to a client.
///
/// `Display` renders the text without its terminator; [`to_wire`](Self::to_wire)
/// appends the newline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerLine<'a> {
    /// Asks for the display name
    Prompt,

    /// Sent to a client once it is logged in
    Greeting { name: &'a str },

    /// Chat text relayed from another session
    Chat { sender: &'a str, text: &'a str },

    /// Another client joined
    Joined { name: &'a str },

    /// Another client left
    Left { name: &'a str },

    /// Login rejected; the connection closes after this line
    Unauthorized,

    /// The daemon is at its session limit; the connection closes after this line
    ServerFull,
}

impl<'a> ServerLine<'a> {
    /// Creates a greeting for a freshly logged-in client.
    pub fn greeting(name: &'a DisplayName) -> Self {
        Self::Greeting {
            name: name.as_str(),
        }
    }

    /// Creates the relayed form of a chat message.
    pub fn chat(message: &'a ChatMessage) -> Self {
        Self::Chat {
            sender: message.sender_name.as_str(),
            text: &message.text,
        }
    }

    /// Creates a join notice.
    pub fn joined(name: &'a DisplayName) -> Self {
        Self::Joined {
            name: name.as_str(),
        }
    }

    /// Creates a leave notice.
    pub fn left(name: &'a DisplayName) -> Self {
        Self::Left {
            name: name.as_str(),
        }
    }

    /// Renders the line with its newline terminator.
    #[must_use]
    pub fn to_wire(&self) -> String {
        format!("{self}\n")
    }
}

impl fmt::Display for ServerLine<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Prompt => f.write_str(USERNAME_PROMPT),
            Self::Greeting { name } => write!(f, "Hello, {name}"),
            Self::Chat { sender, text } => write!(f, "{sender}> {text}"),
            Self::Joined { name } => write!(f, "*** {name} joined the chat ***"),
            Self::Left { name } => write!(f, "*** {name} left the chat ***"),
            Self::Unauthorized => f.write_str("You are not authorized"),
            Self::ServerFull => f.write_str("Server is full"),
        }
    }
}

//! Relay Protocol - Line-oriented wire format
//!
//! Every frame is one newline-terminated line of UTF-8 text. There is no
//! length prefix and no escaping: the first client line is the display
//! name, every later line is chat text.

pub mod message;
pub mod parse;

pub use message::{ServerLine, USERNAME_PROMPT};
pub use parse::{decode_line, LineError, DEFAULT_MAX_LINE_LENGTH};

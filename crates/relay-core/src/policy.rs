//! Outbound queue overflow policy.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::DomainError;

/// What a full outbound queue does with a new line.
///
/// Either way the producer never waits on a slow recipient.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OverflowPolicy {
    /// Evict the oldest queued line to make room for the new one.
    #[default]
    DropOldest,

    /// Keep the queue as is and discard the new line.
    DropNewest,
}

impl OverflowPolicy {
    /// Returns the kebab-case name used in configuration.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DropOldest => "drop-oldest",
            Self::DropNewest => "drop-newest",
        }
    }
}

impl fmt::Display for OverflowPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OverflowPolicy {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "drop-oldest" | "evict-oldest" => Ok(Self::DropOldest),
            "drop-newest" => Ok(Self::DropNewest),
            other => Err(DomainError::InvalidFieldValue {
                field: "overflow_policy".to_string(),
                value: other.to_string(),
                expected: "drop-oldest|drop-newest".to_string(),
            }),
        }
    }
}

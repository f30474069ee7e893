//! Display names chosen by clients at login.

use std::fmt;
use std::sync::Arc;

use crate::{DomainError, DomainResult};

/// The name a client chose at login.
///
/// Set once and immutable thereafter. Only emptiness is checked: any other
/// text is accepted verbatim, and names are not required to be unique.
///
/// Cloning is cheap; registry snapshots hand out copies per member.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DisplayName(Arc<str>);

impl DisplayName {
    /// Parses the raw login line.
    ///
    /// Surrounding whitespace (including the line terminator) is trimmed.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::EmptyDisplayName` if nothing is left after trimming.
    pub fn parse(raw: &str) -> DomainResult<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(DomainError::EmptyDisplayName);
        }
        Ok(Self(Arc::from(trimmed)))
    }

    /// Returns the name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DisplayName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for DisplayName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

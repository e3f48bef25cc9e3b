//! Domain newtypes with validation
//!
//! This module provides strongly-typed wrappers for domain identifiers and values.
//! Each newtype ensures data validity at construction time.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::errors::DomainError;

// ============================================================================
// RunId
// ============================================================================

/// Identifier for a single execution of a sync loop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(Uuid);

impl RunId {
    /// Create a new random RunId
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create a RunId from an existing UUID
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the inner UUID value
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for RunId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for RunId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|e| DomainError::InvalidId(format!("Invalid RunId: {e}")))
    }
}

// ============================================================================
// FeedId
// ============================================================================

/// Name of an upstream change feed (e.g. `storage`, `tasks`)
///
/// Restricted to lowercase ASCII letters, digits, `-` and `_` so it can be
/// used verbatim as a database key and as a URL path segment.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct FeedId(String);

impl FeedId {
    /// Create a new validated FeedId
    ///
    /// # Errors
    /// Returns error if the id is empty or contains characters outside `[a-z0-9_-]`
    pub fn new(id: String) -> Result<Self, DomainError> {
        if id.is_empty() {
            return Err(DomainError::InvalidFeedId(
                "Feed id cannot be empty".to_string(),
            ));
        }
        if !id
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_')
        {
            return Err(DomainError::InvalidFeedId(format!(
                "'{id}' may only contain lowercase letters, digits, '-' and '_'"
            )));
        }
        Ok(Self(id))
    }

    /// The file-storage feed
    #[must_use]
    pub fn storage() -> Self {
        Self(STORAGE_FEED.to_string())
    }

    /// The task-tracker feed
    #[must_use]
    pub fn tasks() -> Self {
        Self(TASKS_FEED.to_string())
    }

    /// Get the inner string reference
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Feed id of the file-storage provider
pub const STORAGE_FEED: &str = "storage";
/// Feed id of the task-tracker provider
pub const TASKS_FEED: &str = "tasks";

impl Display for FeedId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for FeedId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s.to_string())
    }
}

impl TryFrom<String> for FeedId {
    type Error = DomainError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<FeedId> for String {
    fn from(id: FeedId) -> Self {
        id.0
    }
}

// ============================================================================
// Cursor
// ============================================================================

/// Opaque resumable position in an upstream change feed
///
/// Cursors are provider-defined and carry no structure the relay relies on;
/// the only validation is that they are non-empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Cursor(String);

impl Cursor {
    /// Create a new Cursor
    ///
    /// # Errors
    /// Returns error if the token is empty
    pub fn new(token: String) -> Result<Self, DomainError> {
        if token.is_empty() {
            return Err(DomainError::InvalidCursor(
                "Cursor cannot be empty".to_string(),
            ));
        }
        Ok(Self(token))
    }

    /// Get the inner string reference
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for Cursor {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Cursor {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s.to_string())
    }
}

impl TryFrom<String> for Cursor {
    type Error = DomainError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<Cursor> for String {
    fn from(cursor: Cursor) -> Self {
        cursor.0
    }
}

// ============================================================================
// ChannelName
// ============================================================================

/// Destination chat channel
///
/// A leading `#` is stripped so `#general` and `general` name the same channel.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ChannelName(String);

impl ChannelName {
    /// Create a new validated ChannelName
    ///
    /// # Errors
    /// Returns error if the name is empty (after stripping `#`) or contains whitespace
    pub fn new(name: String) -> Result<Self, DomainError> {
        let trimmed = name.trim().trim_start_matches('#');
        if trimmed.is_empty() {
            return Err(DomainError::InvalidChannel(format!(
                "'{name}' is not a channel name"
            )));
        }
        if trimmed.chars().any(char::is_whitespace) {
            return Err(DomainError::InvalidChannel(format!(
                "'{name}' contains whitespace"
            )));
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Get the inner string reference
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for ChannelName {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ChannelName {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s.to_string())
    }
}

impl TryFrom<String> for ChannelName {
    type Error = DomainError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<ChannelName> for String {
    fn from(channel: ChannelName) -> Self {
        channel.0
    }
}

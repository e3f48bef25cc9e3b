//! Task status classification
//!
//! Task trackers expose free-form status names ("in review", "shipped") plus,
//! sometimes, a coarse status type. The relay only cares whether a status is
//! terminal, so every status is reduced to a [`StatusKind`].

use std::fmt;

use serde::{Deserialize, Serialize};

/// Coarse classification of a task status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusKind {
    /// Not started
    Open,
    /// Workflow-specific intermediate status
    Custom,
    /// Completed
    Done,
    /// Closed
    Closed,
}

impl StatusKind {
    /// Returns true for statuses that end a task's lifecycle
    pub fn is_terminal(&self) -> bool {
        matches!(self, StatusKind::Done | StatusKind::Closed)
    }

    /// Maps a provider status type string to a kind
    ///
    /// Returns `None` for unknown types so the caller can fall back to
    /// inferring from the status name.
    pub fn from_type(status_type: &str) -> Option<Self> {
        match status_type.trim().to_lowercase().as_str() {
            "open" => Some(StatusKind::Open),
            "custom" => Some(StatusKind::Custom),
            "done" => Some(StatusKind::Done),
            "closed" => Some(StatusKind::Closed),
            _ => None,
        }
    }

    /// Infers a kind from a human-readable status name
    pub fn infer_from_name(name: &str) -> Self {
        match name.trim().to_lowercase().as_str() {
            "closed" => StatusKind::Closed,
            "complete" | "completed" | "done" | "resolved" => StatusKind::Done,
            "open" | "to do" | "todo" | "new" | "backlog" => StatusKind::Open,
            _ => StatusKind::Custom,
        }
    }
}

impl fmt::Display for StatusKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StatusKind::Open => "open",
            StatusKind::Custom => "custom",
            StatusKind::Done => "done",
            StatusKind::Closed => "closed",
        };
        write!(f, "{}", s)
    }
}

/// A named task status together with its classification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskStatus {
    pub name: String,
    pub kind: StatusKind,
}

impl TaskStatus {
    /// Creates a status, preferring the provider's type over name inference
    pub fn new(name: impl Into<String>, status_type: Option<&str>) -> Self {
        let name = name.into();
        let kind = status_type
            .and_then(StatusKind::from_type)
            .unwrap_or_else(|| StatusKind::infer_from_name(&name));
        Self { name, kind }
    }

    pub fn is_terminal(&self) -> bool {
        self.kind.is_terminal()
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

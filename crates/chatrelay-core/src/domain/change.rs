//! Raw change entries as produced by the change feeds
//!
//! Provider payloads are resolved into [`RawChangeEntry`] at ingestion so the
//! rest of the pipeline matches on a closed set of variants instead of
//! probing loosely-typed JSON.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::status::TaskStatus;

// ============================================================================
// Storage feed entries
// ============================================================================

/// A file that was created or modified
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    /// Provider-specific file identifier
    pub id: String,
    /// File name without the parent path
    pub name: String,
    /// Full display path (e.g. `/Clients/Acme/invoice.pdf`)
    pub path: String,
    /// Server-side modification time
    pub modified: DateTime<Utc>,
    /// Content fingerprint, when the provider reports one
    pub content_hash: Option<String>,
    /// Size in bytes
    pub size: u64,
}

/// A folder that was created or modified
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FolderEntry {
    pub id: String,
    pub name: String,
    pub path: String,
}

/// A file or folder that was removed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeletionEntry {
    pub name: String,
    pub path: String,
}

// ============================================================================
// Task feed entries
// ============================================================================

/// What changed on a task
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TaskChangeKind {
    /// The task moved between statuses
    Status {
        before: TaskStatus,
        after: TaskStatus,
    },
    /// Any other field (assignee, due date, ...)
    Other { field: String },
}

/// A single change on a task
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskChange {
    pub task_id: String,
    pub task_name: String,
    /// Space / list / project the task belongs to
    pub space: String,
    pub occurred_at: DateTime<Utc>,
    pub change: TaskChangeKind,
}

impl TaskChange {
    /// Returns true when the change moves a task from a non-terminal status
    /// into a terminal one
    pub fn is_completion(&self) -> bool {
        match &self.change {
            TaskChangeKind::Status { before, after } => {
                !before.is_terminal() && after.is_terminal()
            }
            TaskChangeKind::Other { .. } => false,
        }
    }
}

// ============================================================================
// RawChangeEntry
// ============================================================================

/// A change reported by an upstream feed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "entry", rename_all = "snake_case")]
pub enum RawChangeEntry {
    File(FileEntry),
    Folder(FolderEntry),
    Deletion(DeletionEntry),
    TaskChange(TaskChange),
}

impl RawChangeEntry {
    /// Short label used in logs
    pub fn kind_label(&self) -> &'static str {
        match self {
            RawChangeEntry::File(_) => "file",
            RawChangeEntry::Folder(_) => "folder",
            RawChangeEntry::Deletion(_) => "deletion",
            RawChangeEntry::TaskChange(_) => "task_change",
        }
    }
}

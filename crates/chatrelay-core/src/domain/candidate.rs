//! Notification candidates
//!
//! A [`NotificationCandidate`] is the normalized event that survives the
//! event filter and is handed to routing and dispatch.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::change::{FileEntry, TaskChange};

/// What happened
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CandidateKind {
    /// A task reached a terminal status
    TaskCompleted,
    /// A file was created or modified
    FileUploaded,
}

impl fmt::Display for CandidateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CandidateKind::TaskCompleted => "task_completed",
            CandidateKind::FileUploaded => "file_uploaded",
        };
        write!(f, "{}", s)
    }
}

/// Extra information fetched from the provider before dispatch
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityDetails {
    /// Link to the entity in the provider's UI
    pub url: Option<String>,
    pub description: Option<String>,
    pub assignees: Vec<String>,
}

/// Normalized event awaiting routing and dispatch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationCandidate {
    pub kind: CandidateKind,
    pub subject_id: String,
    pub subject_name: String,
    /// Path (files) or space (tasks) used for routing and allow-listing
    pub origin: String,
    pub occurred_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<EntityDetails>,
}

impl NotificationCandidate {
    /// Candidate for an uploaded file
    pub fn file_uploaded(entry: &FileEntry) -> Self {
        Self {
            kind: CandidateKind::FileUploaded,
            subject_id: entry.id.clone(),
            subject_name: entry.name.clone(),
            origin: entry.path.clone(),
            occurred_at: entry.modified,
            details: None,
        }
    }

    /// Candidate for a completed task
    pub fn task_completed(change: &TaskChange) -> Self {
        Self {
            kind: CandidateKind::TaskCompleted,
            subject_id: change.task_id.clone(),
            subject_name: change.task_name.clone(),
            origin: change.space.clone(),
            occurred_at: change.occurred_at,
            details: None,
        }
    }

    /// Identity used to collapse duplicates of the same state transition
    pub fn dedup_key(&self) -> (String, DateTime<Utc>) {
        (self.subject_id.clone(), self.occurred_at)
    }

    /// Attaches enrichment details
    pub fn with_details(mut self, details: EntityDetails) -> Self {
        self.details = Some(details);
        self
    }
}

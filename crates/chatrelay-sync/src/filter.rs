//! Event filter
//!
//! Turns raw change entries into [`NotificationCandidate`]s:
//!
//! - folders and deletions are dropped
//! - task changes qualify only on a non-terminal → terminal status move
//! - an optional case-insensitive prefix allow-list restricts origins
//! - duplicates of the same `(subject_id, occurred_at)` are collapsed
//!
//! Dedup state lives in a [`FilterState`] owned by the caller so one run can
//! carry it across every page it fetches.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use tracing::trace;

use chatrelay_core::domain::{NotificationCandidate, RawChangeEntry};

/// Keys already emitted during the current run
#[derive(Debug, Default)]
pub struct FilterState {
    seen: HashSet<(String, DateTime<Utc>)>,
}

impl FilterState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of distinct candidates emitted so far
    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }

    /// Returns false if the key was already present
    fn insert(&mut self, key: (String, DateTime<Utc>)) -> bool {
        self.seen.insert(key)
    }
}

/// Classifies raw entries into candidates
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    /// Lowercased allow-list prefixes; empty allows everything
    allow_list: Vec<String>,
}

impl EventFilter {
    pub fn new<S: AsRef<str>>(allow_list: &[S]) -> Self {
        Self {
            allow_list: allow_list
                .iter()
                .map(|p| p.as_ref().trim().to_lowercase())
                .filter(|p| !p.is_empty())
                .collect(),
        }
    }

    /// Returns true if `origin` passes the allow-list
    pub fn allows(&self, origin: &str) -> bool {
        if self.allow_list.is_empty() {
            return true;
        }
        let origin = origin.to_lowercase();
        self.allow_list.iter().any(|p| origin.starts_with(p.as_str()))
    }

    /// Classifies `entries` in order, updating `state`
    pub fn classify(
        &self,
        entries: &[RawChangeEntry],
        state: &mut FilterState,
    ) -> Vec<NotificationCandidate> {
        let mut candidates = Vec::new();
        for entry in entries {
            let candidate = match entry {
                RawChangeEntry::File(file) => NotificationCandidate::file_uploaded(file),
                RawChangeEntry::TaskChange(change) if change.is_completion() => {
                    NotificationCandidate::task_completed(change)
                }
                RawChangeEntry::TaskChange(_)
                | RawChangeEntry::Folder(_)
                | RawChangeEntry::Deletion(_) => {
                    trace!(kind = entry.kind_label(), "Entry dropped");
                    continue;
                }
            };

            if !self.allows(&candidate.origin) {
                trace!(origin = %candidate.origin, "Outside allow-list");
                continue;
            }
            if !state.insert(candidate.dedup_key()) {
                trace!(subject = %candidate.subject_id, "Duplicate candidate");
                continue;
            }
            candidates.push(candidate);
        }
        candidates
    }
}

//! Run results
//!
//! [`SyncSummary`] is what a trigger gets back from a completed run;
//! [`RunRecord`] is what the run-history store keeps for every run,
//! including aborted ones.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::newtypes::{ChannelName, FeedId, RunId};

/// Outcome of dispatching a single candidate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", content = "reason", rename_all = "snake_case")]
pub enum DispatchResult {
    Delivered,
    Failed(String),
}

impl DispatchResult {
    pub fn is_delivered(&self) -> bool {
        matches!(self, DispatchResult::Delivered)
    }
}

/// A candidate that could not be delivered
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchFailure {
    pub subject_id: String,
    pub channel: ChannelName,
    pub reason: String,
}

/// Counts and outcome of one completed run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncSummary {
    pub run_id: RunId,
    pub feed: FeedId,
    /// Pages fetched from the provider
    pub pages: u32,
    /// Raw entries across all pages
    pub fetched: u64,
    /// Candidates that survived the filter
    pub classified: u64,
    /// Candidates held back because the run was bootstrapping
    pub suppressed: u64,
    pub dispatched: u64,
    pub failed: u64,
    pub failures: Vec<DispatchFailure>,
    /// True when the run began without a stored cursor
    pub started_from_cursor: bool,
    pub cursor_advanced: bool,
    pub duration_ms: u64,
}

impl SyncSummary {
    pub fn new(run_id: RunId, feed: FeedId, started_from_cursor: bool) -> Self {
        Self {
            run_id,
            feed,
            pages: 0,
            fetched: 0,
            classified: 0,
            suppressed: 0,
            dispatched: 0,
            failed: 0,
            failures: Vec::new(),
            started_from_cursor,
            cursor_advanced: false,
            duration_ms: 0,
        }
    }

    /// Bootstrap runs start without a stored cursor
    pub fn is_bootstrap(&self) -> bool {
        !self.started_from_cursor
    }

    pub fn record_failure(&mut self, failure: DispatchFailure) {
        self.failed += 1;
        self.failures.push(failure);
    }
}

impl fmt::Display for SyncSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: fetched={} classified={} dispatched={} failed={}",
            self.feed, self.fetched, self.classified, self.dispatched, self.failed
        )
    }
}

/// How a run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    /// All pages processed, every candidate delivered
    Completed,
    /// All pages processed, some dispatches failed
    CompletedWithFailures,
    /// Aborted before persisting the cursor
    Aborted,
}

impl RunOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunOutcome::Completed => "completed",
            RunOutcome::CompletedWithFailures => "completed_with_failures",
            RunOutcome::Aborted => "aborted",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "completed" => Some(RunOutcome::Completed),
            "completed_with_failures" => Some(RunOutcome::CompletedWithFailures),
            "aborted" => Some(RunOutcome::Aborted),
            _ => None,
        }
    }
}

impl fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Persisted record of a finished or aborted run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunRecord {
    pub run_id: RunId,
    pub feed: FeedId,
    pub outcome: RunOutcome,
    pub fetched: u64,
    pub classified: u64,
    pub dispatched: u64,
    pub failed: u64,
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl RunRecord {
    /// Record for a run that processed every page
    pub fn completed(summary: &SyncSummary, started_at: DateTime<Utc>) -> Self {
        let outcome = if summary.failed == 0 {
            RunOutcome::Completed
        } else {
            RunOutcome::CompletedWithFailures
        };
        Self {
            run_id: summary.run_id,
            feed: summary.feed.clone(),
            outcome,
            fetched: summary.fetched,
            classified: summary.classified,
            dispatched: summary.dispatched,
            failed: summary.failed,
            error: None,
            started_at,
            finished_at: Utc::now(),
        }
    }

    /// Record for a run that stopped early; counts reflect progress so far
    pub fn aborted(summary: &SyncSummary, started_at: DateTime<Utc>, error: impl Into<String>) -> Self {
        Self {
            outcome: RunOutcome::Aborted,
            error: Some(error.into()),
            ..Self::completed(summary, started_at)
        }
    }

    pub fn duration(&self) -> chrono::Duration {
        self.finished_at - self.started_at
    }
}

//! ChatRelay Sync - Change-sync and notification-routing engine
//!
//! Provides:
//! - Paginated change fetching with per-call timeouts
//! - Classification of raw changes into notification candidates
//! - Bounded-concurrency dispatch to the messaging sink
//! - The sync loop state machine and its coalescing trigger worker
//!
//! ## Modules
//!
//! - [`fetcher`] - Timeout-bounded wrapper around a change feed
//! - [`filter`] - Event filter (classification, allow-list, dedup)
//! - [`dispatcher`] - Notification dispatcher
//! - [`engine`] - Sync loop orchestrating fetch → classify → route → dispatch → persist
//! - [`trigger`] - Worker that serializes and coalesces run requests

pub mod dispatcher;
pub mod engine;
pub mod fetcher;
pub mod filter;
pub mod trigger;

use chatrelay_core::domain::{errors::DomainError, newtypes::FeedId};
use chatrelay_core::ports::FetchError;
use thiserror::Error;

pub use engine::{SyncLoop, SyncOptions, SyncPhase};
pub use trigger::{LastRun, SyncHandle, SyncWorker, TriggerOutcome, WorkerStopped};

/// Errors that can end a sync run
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SyncError {
    /// Missing credentials, malformed routing, unknown feed
    #[error("Configuration error: {0}")]
    Config(String),

    /// Network, timeout, server-side or rate-limit failure; safe to retry
    #[error("Transient fetch failure: {0}")]
    TransientFetch(String),

    /// Credentials were rejected
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// A single candidate could not be delivered
    ///
    /// Logged and counted in the summary; never ends a run.
    #[error("Dispatch of {subject_id} failed: {reason}")]
    Dispatch { subject_id: String, reason: String },

    /// The provider refused the stored cursor
    #[error("Cursor for feed '{feed}' expired: {reason} (run `chatrelay cursor reset {feed}`)")]
    CursorExpired { feed: FeedId, reason: String },

    /// Loading or saving the cursor failed
    #[error("Cursor store failure: {0}")]
    CursorStore(String),

    /// A domain-level error propagated from chatrelay-core
    #[error("Domain error: {0}")]
    Domain(#[from] DomainError),
}

impl SyncError {
    /// Classifies a fetch failure for `feed`
    pub fn from_fetch(feed: &FeedId, err: FetchError) -> Self {
        match err {
            FetchError::Unauthorized(reason) => SyncError::Auth(reason),
            FetchError::CursorExpired(reason) => SyncError::CursorExpired {
                feed: feed.clone(),
                reason,
            },
            other => SyncError::TransientFetch(other.to_string()),
        }
    }

    /// Returns true if the next trigger may succeed without operator action
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SyncError::TransientFetch(_) | SyncError::CursorStore(_) | SyncError::Dispatch { .. }
        )
    }

    /// Stable short label for logs and run history
    pub fn kind(&self) -> &'static str {
        match self {
            SyncError::Config(_) => "config",
            SyncError::TransientFetch(_) => "transient_fetch",
            SyncError::Auth(_) => "auth",
            SyncError::Dispatch { .. } => "dispatch",
            SyncError::CursorExpired { .. } => "cursor_expired",
            SyncError::CursorStore(_) => "cursor_store",
            SyncError::Domain(_) => "domain",
        }
    }
}

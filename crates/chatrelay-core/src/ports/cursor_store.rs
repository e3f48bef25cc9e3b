//! Cursor store port (driven/secondary port)
//!
//! Persists the resumable position of each change feed.
//!
//! ## Design Notes
//!
//! - Uses `anyhow::Result` because storage errors are adapter-specific and
//!   the sync loop treats almost every one of them the same way. The one
//!   exception is [`CursorConflict`], which adapters return as-is so callers
//!   can `downcast_ref` it.
//! - `save` must be atomic: a concurrent `load` sees either the old or the
//!   new cursor, never a partial value.
//! - `save` is a compare-and-swap against the cursor the run started from.
//!   Two runs of the same feed in different processes cannot move the
//!   cursor backwards, and a `reset` issued mid-run is not undone.

use crate::domain::newtypes::{Cursor, FeedId};

/// The stored cursor no longer matches the one the run started from
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("cursor for feed '{feed}' was changed by another run or reset")]
pub struct CursorConflict {
    pub feed: FeedId,
}

/// Port trait for durable cursor storage
#[async_trait::async_trait]
pub trait ICursorStore: Send + Sync {
    /// Returns the last saved cursor for `feed`, or `None` if never saved
    async fn load(&self, feed: &FeedId) -> anyhow::Result<Option<Cursor>>;

    /// Replaces the cursor for `feed` if the stored one still equals `expected`
    ///
    /// `expected = None` means no cursor may be stored yet.
    ///
    /// # Errors
    /// Returns [`CursorConflict`] when the stored cursor differs from
    /// `expected`; nothing is written in that case.
    async fn save(
        &self,
        feed: &FeedId,
        expected: Option<&Cursor>,
        cursor: &Cursor,
    ) -> anyhow::Result<()>;

    /// Forgets the cursor for `feed`; the next run bootstraps
    ///
    /// Returns true if a cursor was stored.
    async fn reset(&self, feed: &FeedId) -> anyhow::Result<bool>;
}

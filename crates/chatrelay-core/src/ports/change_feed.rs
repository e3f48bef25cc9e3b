//! Change feed port (driven/secondary port)
//!
//! This module defines the interface for reading a provider's paginated
//! change stream.
//!
//! ## Design Notes
//!
//! - Unlike the other ports this one returns a typed [`FetchError`]: the sync
//!   loop must tell rate limits, credential problems and expired cursors apart
//!   from ordinary transient failures.
//! - Adapters resolve provider payloads into [`RawChangeEntry`] before
//!   returning; nothing downstream sees raw JSON.

use std::time::Duration;

use thiserror::Error;

use crate::domain::{
    candidate::EntityDetails,
    change::RawChangeEntry,
    newtypes::{Cursor, FeedId},
};

// ============================================================================
// ChangePage
// ============================================================================

/// One page of a change feed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangePage {
    pub entries: Vec<RawChangeEntry>,
    /// Position to continue from
    pub next_cursor: Cursor,
    /// True when the provider has more entries immediately available
    pub has_more: bool,
}

// ============================================================================
// FetchError
// ============================================================================

/// Failure reading from a change feed
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// Provider asked us to slow down
    #[error("Rate limited (retry after {retry_after:?})")]
    RateLimited { retry_after: Option<Duration> },

    /// Credentials rejected
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// The stored cursor is no longer accepted by the provider
    #[error("Cursor expired: {0}")]
    CursorExpired(String),

    /// Call did not complete within the per-call timeout
    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    /// Network or server-side failure
    #[error("Transient failure: {0}")]
    Transient(String),

    /// Response could not be interpreted
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl FetchError {
    /// Returns true if retrying on a later trigger may succeed without
    /// operator action
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            FetchError::RateLimited { .. }
                | FetchError::Timeout(_)
                | FetchError::Transient(_)
                | FetchError::InvalidResponse(_)
        )
    }
}

// ============================================================================
// IChangeFeed trait
// ============================================================================

/// Port trait for an upstream change feed
#[async_trait::async_trait]
pub trait IChangeFeed: Send + Sync {
    /// Name of the feed, used as the cursor key
    fn feed_id(&self) -> &FeedId;

    /// Fetches one page of changes
    ///
    /// With `cursor == None` the provider returns a full listing (bootstrap);
    /// otherwise it continues from the given position.
    async fn fetch_page(&self, cursor: Option<&Cursor>) -> Result<ChangePage, FetchError>;

    /// Retrieves details about a single entity for enrichment
    async fn entity_details(&self, id: &str) -> Result<EntityDetails, FetchError>;
}

//! Change fetcher
//!
//! Wraps an [`IChangeFeed`] so every call is bounded by a timeout and every
//! page is checked for forward progress.

use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use chatrelay_core::domain::{Cursor, EntityDetails, FeedId};
use chatrelay_core::ports::{ChangePage, FetchError, IChangeFeed};

/// Timeout-bounded access to one change feed
#[derive(Clone)]
pub struct ChangeFetcher {
    feed: Arc<dyn IChangeFeed>,
    timeout: Duration,
}

impl ChangeFetcher {
    pub fn new(feed: Arc<dyn IChangeFeed>, timeout: Duration) -> Self {
        Self { feed, timeout }
    }

    pub fn feed_id(&self) -> &FeedId {
        self.feed.feed_id()
    }

    /// Fetches one page starting at `cursor`
    ///
    /// A page that claims more entries but hands back the cursor it was
    /// fetched with is rejected; following it would loop forever.
    pub async fn fetch_page(&self, cursor: Option<&Cursor>) -> Result<ChangePage, FetchError> {
        let page = tokio::time::timeout(self.timeout, self.feed.fetch_page(cursor))
            .await
            .map_err(|_| FetchError::Timeout(self.timeout))??;

        if page.has_more && cursor == Some(&page.next_cursor) {
            return Err(FetchError::Transient(format!(
                "provider returned has_more without advancing cursor {}",
                page.next_cursor
            )));
        }

        debug!(
            feed = %self.feed_id(),
            entries = page.entries.len(),
            has_more = page.has_more,
            "Fetched change page"
        );
        Ok(page)
    }

    /// Fetches enrichment details for one entity
    pub async fn entity_details(&self, id: &str) -> Result<EntityDetails, FetchError> {
        tokio::time::timeout(self.timeout, self.feed.entity_details(id))
            .await
            .map_err(|_| FetchError::Timeout(self.timeout))?
    }
}

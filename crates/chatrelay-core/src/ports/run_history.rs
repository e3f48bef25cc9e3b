//! Run history port (driven/secondary port)

use crate::domain::{newtypes::FeedId, summary::RunRecord};

/// Port trait for recording sync runs
#[async_trait::async_trait]
pub trait IRunHistory: Send + Sync {
    async fn record_run(&self, record: &RunRecord) -> anyhow::Result<()>;

    /// Most recent runs first, optionally restricted to one feed
    async fn recent_runs(&self, feed: Option<&FeedId>, limit: u32) -> anyhow::Result<Vec<RunRecord>>;
}

//! Task directory port (driven/secondary port)
//!
//! Lists the current tasks of the tracker so the status report can
//! aggregate them. This is a snapshot query, independent of the change feed.

use serde::{Deserialize, Serialize};

use crate::domain::status::TaskStatus;

/// Minimal view of a task for reporting
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskSummary {
    pub id: String,
    pub name: String,
    pub status: TaskStatus,
}

/// Port trait for listing tasks
#[async_trait::async_trait]
pub trait ITaskDirectory: Send + Sync {
    /// Lists all tasks, optionally restricted to one space
    async fn list_tasks(&self, space: Option<&str>) -> anyhow::Result<Vec<TaskSummary>>;
}

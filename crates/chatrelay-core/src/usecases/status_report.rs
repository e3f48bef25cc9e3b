//! Task status report use case
//!
//! Answers "where do things stand?" by listing the tracker's tasks and
//! counting them per status. The report can be printed locally or posted to
//! a chat channel.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::{
    domain::{newtypes::ChannelName, status::StatusKind},
    ports::{IMessagingSink, ITaskDirectory, RenderedMessage, TaskSummary},
};

/// Number of tasks in one status
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCount {
    pub status: String,
    pub kind: StatusKind,
    pub count: u64,
}

/// Aggregated task counts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusReport {
    pub space: Option<String>,
    pub total: u64,
    /// Tasks in a terminal status
    pub completed: u64,
    /// Tasks in any other status
    pub open: u64,
    /// Per-status counts, largest first
    pub by_status: Vec<StatusCount>,
}

impl StatusReport {
    /// Aggregates a task listing
    pub fn from_tasks(space: Option<&str>, tasks: &[TaskSummary]) -> Self {
        let mut counts: HashMap<String, StatusCount> = HashMap::new();
        let mut completed = 0;
        for task in tasks {
            if task.status.is_terminal() {
                completed += 1;
            }
            // group case-insensitively, keep the first spelling seen
            counts
                .entry(task.status.name.to_lowercase())
                .or_insert_with(|| StatusCount {
                    status: task.status.name.clone(),
                    kind: task.status.kind,
                    count: 0,
                })
                .count += 1;
        }

        let mut by_status: Vec<StatusCount> = counts.into_values().collect();
        by_status.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.status.cmp(&b.status)));

        let total = tasks.len() as u64;
        Self {
            space: space.map(str::to_string),
            total,
            completed,
            open: total - completed,
            by_status,
        }
    }

    /// Plain-text rendering suitable for a chat message
    pub fn to_text(&self) -> String {
        let scope = self.space.as_deref().unwrap_or("all spaces");
        let mut text = format!(
            "Task status for {scope}: {} total, {} completed, {} open",
            self.total, self.completed, self.open
        );
        for entry in &self.by_status {
            text.push_str(&format!("\n• {}: {}", entry.status, entry.count));
        }
        text
    }
}

/// Use case producing [`StatusReport`]s
pub struct StatusReportUseCase {
    directory: Arc<dyn ITaskDirectory>,
    sink: Option<Arc<dyn IMessagingSink>>,
}

impl StatusReportUseCase {
    pub fn new(directory: Arc<dyn ITaskDirectory>) -> Self {
        Self {
            directory,
            sink: None,
        }
    }

    /// Enables [`Self::publish`]
    pub fn with_sink(mut self, sink: Arc<dyn IMessagingSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Builds the report for one space, or for the whole team when `space`
    /// is `None`
    pub async fn execute(&self, space: Option<&str>) -> Result<StatusReport> {
        let tasks = self
            .directory
            .list_tasks(space)
            .await
            .context("Failed to list tasks")?;
        Ok(StatusReport::from_tasks(space, &tasks))
    }

    /// Posts a report to `channel`
    ///
    /// # Errors
    /// Fails if no sink was configured or the send fails.
    pub async fn publish(&self, report: &StatusReport, channel: &ChannelName) -> Result<()> {
        let sink = self
            .sink
            .as_ref()
            .context("No messaging sink configured for status reports")?;
        sink.send(channel, &RenderedMessage::new(report.to_text()))
            .await
            .with_context(|| format!("Failed to post status report to {channel}"))
    }
}

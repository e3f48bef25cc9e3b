//! Task-tracker adapters
//!
//! [`TaskChangeFeed`] reads the team activity stream
//! (`GET /teams/{team}/activity`) and turns status transitions into
//! [`TaskChange`]s. The same struct also implements [`ITaskDirectory`] by
//! paging through `GET /teams/{team}/tasks`.
//!
//! The tracker answers `410 Gone` when an activity cursor is too old.

use chrono::{DateTime, Utc};
use reqwest::Method;
use serde::Deserialize;
use tracing::{debug, warn};
use url::Url;

use chatrelay_core::domain::{
    Cursor, EntityDetails, FeedId, RawChangeEntry, TaskChange, TaskChangeKind, TaskStatus,
};
use chatrelay_core::ports::{ChangePage, FetchError, IChangeFeed, ITaskDirectory, TaskSummary};

use crate::client::ApiClient;
use crate::ProviderError;

/// Upper bound on directory pages read by one `list_tasks` call
const MAX_DIRECTORY_PAGES: u32 = 200;

// ============================================================================
// Tracker API response types
// ============================================================================

#[derive(Debug, Deserialize)]
struct ActivityResponse {
    #[serde(default)]
    events: Vec<ActivityEvent>,
    cursor: String,
    has_more: bool,
}

#[derive(Debug, Deserialize)]
struct ActivityEvent {
    task_id: String,
    task_name: String,
    space: String,
    date: DateTime<Utc>,
    field: String,
    before: Option<ApiStatus>,
    after: Option<ApiStatus>,
}

#[derive(Debug, Clone, Deserialize)]
struct ApiStatus {
    status: String,
    #[serde(rename = "type")]
    status_type: Option<String>,
}

impl From<ApiStatus> for TaskStatus {
    fn from(s: ApiStatus) -> Self {
        TaskStatus::new(s.status, s.status_type.as_deref())
    }
}

impl From<ActivityEvent> for TaskChange {
    fn from(event: ActivityEvent) -> Self {
        let change = match (event.field.as_str(), event.before, event.after) {
            ("status", Some(before), Some(after)) => TaskChangeKind::Status {
                before: before.into(),
                after: after.into(),
            },
            _ => TaskChangeKind::Other { field: event.field },
        };
        TaskChange {
            task_id: event.task_id,
            task_name: event.task_name,
            space: event.space,
            occurred_at: event.date,
            change,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ApiTask {
    id: String,
    name: String,
    status: ApiStatus,
    url: Option<String>,
    description: Option<String>,
    #[serde(default)]
    assignees: Vec<ApiUser>,
}

#[derive(Debug, Deserialize)]
struct ApiUser {
    username: String,
}

#[derive(Debug, Deserialize)]
struct TaskListResponse {
    #[serde(default)]
    tasks: Vec<ApiTask>,
    #[serde(default)]
    last_page: bool,
}

// ============================================================================
// TaskChangeFeed
// ============================================================================

/// Activity feed and task directory for one team
pub struct TaskChangeFeed {
    client: ApiClient,
    feed_id: FeedId,
    team_id: String,
    page_size: u32,
}

impl TaskChangeFeed {
    pub fn new(client: ApiClient, team_id: impl Into<String>, page_size: u32) -> Self {
        Self {
            client,
            feed_id: FeedId::tasks(),
            team_id: team_id.into(),
            page_size,
        }
    }

    fn activity_url(&self, cursor: Option<&Cursor>) -> Result<Url, ProviderError> {
        let mut query = url::form_urlencoded::Serializer::new(String::new());
        query.append_pair("limit", &self.page_size.to_string());
        if let Some(cursor) = cursor {
            query.append_pair("cursor", cursor.as_str());
        }
        self.client
            .url(&["teams", self.team_id.as_str(), "activity"], Some(&query.finish()))
    }

    fn tasks_url(&self, page: u32, space: Option<&str>) -> Result<Url, ProviderError> {
        let mut query = url::form_urlencoded::Serializer::new(String::new());
        query.append_pair("page", &page.to_string());
        if let Some(space) = space {
            query.append_pair("space", space);
        }
        self.client
            .url(&["teams", self.team_id.as_str(), "tasks"], Some(&query.finish()))
    }
}

#[async_trait::async_trait]
impl IChangeFeed for TaskChangeFeed {
    fn feed_id(&self) -> &FeedId {
        &self.feed_id
    }

    async fn fetch_page(&self, cursor: Option<&Cursor>) -> Result<ChangePage, FetchError> {
        let request = self
            .client
            .request_url(Method::GET, self.activity_url(cursor)?);
        let response: ActivityResponse = self.client.send_json(request).await?;

        let entries: Vec<RawChangeEntry> = response
            .events
            .into_iter()
            .map(|event| RawChangeEntry::TaskChange(event.into()))
            .collect();
        let next_cursor = Cursor::new(response.cursor)
            .map_err(|e| FetchError::InvalidResponse(format!("Bad activity cursor: {}", e)))?;

        debug!(
            events = entries.len(),
            has_more = response.has_more,
            "Fetched task activity page"
        );

        Ok(ChangePage {
            entries,
            next_cursor,
            has_more: response.has_more,
        })
    }

    async fn entity_details(&self, id: &str) -> Result<EntityDetails, FetchError> {
        let url = self.client.url(&["tasks", id], None)?;
        let request = self.client.request_url(Method::GET, url);
        let task: ApiTask = self.client.send_json(request).await?;

        Ok(EntityDetails {
            url: task.url,
            description: task.description.filter(|d| !d.trim().is_empty()),
            assignees: task.assignees.into_iter().map(|u| u.username).collect(),
        })
    }
}

#[async_trait::async_trait]
impl ITaskDirectory for TaskChangeFeed {
    async fn list_tasks(&self, space: Option<&str>) -> anyhow::Result<Vec<TaskSummary>> {
        let mut tasks = Vec::new();

        for page in 0..MAX_DIRECTORY_PAGES {
            let request = self
                .client
                .request_url(Method::GET, self.tasks_url(page, space)?);
            let response: TaskListResponse = self.client.send_json(request).await?;

            tasks.extend(response.tasks.into_iter().map(|t| TaskSummary {
                id: t.id,
                name: t.name,
                status: t.status.into(),
            }));

            if response.last_page {
                debug!(pages = page + 1, tasks = tasks.len(), "Listed tasks");
                return Ok(tasks);
            }
        }

        warn!(
            max_pages = MAX_DIRECTORY_PAGES,
            "Task listing did not report a last page, returning partial result"
        );
        Ok(tasks)
    }
}

//! File-storage change feed
//!
//! The storage API lists a folder tree with `POST /files/list_folder` and
//! continues from a cursor with `POST /files/list_folder/continue`. Each
//! entry carries a `.tag` of `file`, `folder` or `deleted`; entries are
//! resolved into [`RawChangeEntry`] here so nothing downstream sees JSON.
//!
//! An expired cursor is reported as `409 Conflict` with an error summary
//! starting with `reset`.

use chrono::{DateTime, Utc};
use reqwest::Method;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use chatrelay_core::domain::{
    Cursor, DeletionEntry, EntityDetails, FeedId, FileEntry, FolderEntry, RawChangeEntry,
};
use chatrelay_core::ports::{ChangePage, FetchError, IChangeFeed};

use crate::client::ApiClient;
use crate::ProviderError;

const LIST_FOLDER_PATH: &str = "/files/list_folder";
const CONTINUE_PATH: &str = "/files/list_folder/continue";
const METADATA_PATH: &str = "/files/get_metadata";

// ============================================================================
// Storage API response types
// ============================================================================

#[derive(Debug, Deserialize)]
struct ListFolderResponse {
    #[serde(default)]
    entries: Vec<StorageEntry>,
    cursor: String,
    has_more: bool,
}

/// One listing entry, discriminated by its `.tag`
#[derive(Debug, Deserialize)]
#[serde(tag = ".tag", rename_all = "snake_case")]
enum StorageEntry {
    File(StorageFile),
    Folder(StorageFolder),
    Deleted(StorageDeleted),
    /// Tags this relay does not handle
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Deserialize)]
struct StorageFile {
    id: String,
    name: String,
    path_display: Option<String>,
    path_lower: Option<String>,
    server_modified: DateTime<Utc>,
    content_hash: Option<String>,
    #[serde(default)]
    size: u64,
    /// Only present in metadata responses
    preview_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StorageFolder {
    id: String,
    name: String,
    path_display: Option<String>,
    path_lower: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StorageDeleted {
    name: String,
    path_display: Option<String>,
    path_lower: Option<String>,
}

fn display_path(display: Option<String>, lower: Option<String>, name: &str) -> String {
    display
        .or(lower)
        .unwrap_or_else(|| format!("/{}", name))
}

impl StorageEntry {
    fn into_raw(self) -> Option<RawChangeEntry> {
        match self {
            StorageEntry::File(f) => Some(RawChangeEntry::File(FileEntry {
                path: display_path(f.path_display, f.path_lower, &f.name),
                id: f.id,
                name: f.name,
                modified: f.server_modified,
                content_hash: f.content_hash,
                size: f.size,
            })),
            StorageEntry::Folder(f) => Some(RawChangeEntry::Folder(FolderEntry {
                path: display_path(f.path_display, f.path_lower, &f.name),
                id: f.id,
                name: f.name,
            })),
            StorageEntry::Deleted(d) => Some(RawChangeEntry::Deletion(DeletionEntry {
                path: display_path(d.path_display, d.path_lower, &d.name),
                name: d.name,
            })),
            StorageEntry::Unknown => None,
        }
    }
}

// ============================================================================
// StorageChangeFeed
// ============================================================================

/// [`IChangeFeed`] over the storage listing API
pub struct StorageChangeFeed {
    client: ApiClient,
    feed_id: FeedId,
    root_path: String,
    page_size: u32,
}

impl StorageChangeFeed {
    pub fn new(client: ApiClient, root_path: impl Into<String>, page_size: u32) -> Self {
        Self {
            client,
            feed_id: FeedId::storage(),
            root_path: root_path.into(),
            page_size,
        }
    }

    async fn list(&self, cursor: Option<&Cursor>) -> Result<ListFolderResponse, ProviderError> {
        let request = match cursor {
            None => self
                .client
                .request(Method::POST, LIST_FOLDER_PATH)
                .json(&json!({
                    "path": self.root_path,
                    "recursive": true,
                    "include_deleted": true,
                    "limit": self.page_size,
                })),
            Some(cursor) => self
                .client
                .request(Method::POST, CONTINUE_PATH)
                .json(&json!({ "cursor": cursor.as_str() })),
        };

        self.client
            .send_json(request)
            .await
            .map_err(|e| match e {
                ProviderError::Conflict(body) if body.contains("reset") => {
                    ProviderError::CursorExpired(body)
                }
                other => other,
            })
    }
}

#[async_trait::async_trait]
impl IChangeFeed for StorageChangeFeed {
    fn feed_id(&self) -> &FeedId {
        &self.feed_id
    }

    async fn fetch_page(&self, cursor: Option<&Cursor>) -> Result<ChangePage, FetchError> {
        let response = self.list(cursor).await?;

        let total = response.entries.len();
        let entries: Vec<RawChangeEntry> = response
            .entries
            .into_iter()
            .filter_map(StorageEntry::into_raw)
            .collect();
        if entries.len() < total {
            debug!(
                skipped = total - entries.len(),
                "Skipped storage entries with unknown tags"
            );
        }

        let next_cursor = Cursor::new(response.cursor)
            .map_err(|e| FetchError::InvalidResponse(format!("Bad cursor in listing: {}", e)))?;

        debug!(
            entries = entries.len(),
            has_more = response.has_more,
            "Fetched storage page"
        );

        Ok(ChangePage {
            entries,
            next_cursor,
            has_more: response.has_more,
        })
    }

    async fn entity_details(&self, id: &str) -> Result<EntityDetails, FetchError> {
        let request = self
            .client
            .request(Method::POST, METADATA_PATH)
            .json(&json!({ "path": id }));
        let entry: StorageEntry = self.client.send_json(request).await?;

        match entry {
            StorageEntry::File(f) => {
                let path = display_path(f.path_display, f.path_lower, &f.name);
                Ok(EntityDetails {
                    url: f.preview_url,
                    description: Some(format!("{} ({} bytes)", path, f.size)),
                    assignees: Vec::new(),
                })
            }
            other => Err(FetchError::InvalidResponse(format!(
                "Expected file metadata for '{}', got {:?}",
                id, other
            ))),
        }
    }
}

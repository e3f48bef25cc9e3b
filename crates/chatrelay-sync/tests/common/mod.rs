//! Shared test doubles for sync loop tests

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use tokio::sync::{Notify, Semaphore};

use chatrelay_core::domain::{
    ChannelName, Cursor, EntityDetails, FeedId, FileEntry, FolderEntry, NotificationCandidate,
    RawChangeEntry, RouteRule, RouteTable, RunRecord, TaskChange, TaskChangeKind, TaskStatus,
};
use chatrelay_core::ports::{
    ChangePage, CursorConflict, FetchError, IChangeFeed, ICursorStore, IMessageRenderer,
    IMessagingSink, IRunHistory, RenderedMessage,
};
use chatrelay_sync::dispatcher::NotificationDispatcher;
use chatrelay_sync::fetcher::ChangeFetcher;
use chatrelay_sync::filter::EventFilter;
use chatrelay_sync::{SyncLoop, SyncOptions};

// ============================================================================
// Builders
// ============================================================================

pub fn cursor(s: &str) -> Cursor {
    Cursor::new(s.to_string()).unwrap()
}

pub fn channel(s: &str) -> ChannelName {
    ChannelName::new(s.to_string()).unwrap()
}

pub fn at(minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 10, 16, 12, minute, 0).unwrap()
}

pub fn file(id: &str, path: &str, minute: u32) -> RawChangeEntry {
    RawChangeEntry::File(FileEntry {
        id: id.to_string(),
        name: path.rsplit('/').next().unwrap_or(path).to_string(),
        path: path.to_string(),
        modified: at(minute),
        content_hash: None,
        size: 100,
    })
}

pub fn folder(path: &str) -> RawChangeEntry {
    RawChangeEntry::Folder(FolderEntry {
        id: format!("id:{path}"),
        name: path.rsplit('/').next().unwrap_or(path).to_string(),
        path: path.to_string(),
    })
}

pub fn task_closed(id: &str, space: &str, minute: u32) -> RawChangeEntry {
    RawChangeEntry::TaskChange(TaskChange {
        task_id: id.to_string(),
        task_name: format!("Task {id}"),
        space: space.to_string(),
        occurred_at: at(minute),
        change: TaskChangeKind::Status {
            before: TaskStatus::new("in progress", None),
            after: TaskStatus::new("closed", Some("closed")),
        },
    })
}

pub fn page(entries: Vec<RawChangeEntry>, next: &str, has_more: bool) -> Result<ChangePage, FetchError> {
    Ok(ChangePage {
        entries,
        next_cursor: cursor(next),
        has_more,
    })
}

// ============================================================================
// ScriptedFeed
// ============================================================================

/// Feed that replays a fixed list of page results
pub struct ScriptedFeed {
    id: FeedId,
    pages: Mutex<VecDeque<Result<ChangePage, FetchError>>>,
    /// Cursor passed to each fetch_page call
    pub calls: Mutex<Vec<Option<Cursor>>>,
    pub details_fail: bool,
    /// When set, every fetch waits for a permit
    pub gate: Option<Arc<Semaphore>>,
    /// Notified whenever a fetch starts
    pub entered: Arc<Notify>,
}

impl ScriptedFeed {
    pub fn new(id: FeedId, pages: Vec<Result<ChangePage, FetchError>>) -> Self {
        Self {
            id,
            pages: Mutex::new(pages.into()),
            calls: Mutex::new(Vec::new()),
            details_fail: false,
            gate: None,
            entered: Arc::new(Notify::new()),
        }
    }

    /// Feed that returns an empty final page on every call
    pub fn repeating_empty(id: FeedId) -> Self {
        Self::new(id, Vec::new())
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait::async_trait]
impl IChangeFeed for ScriptedFeed {
    fn feed_id(&self) -> &FeedId {
        &self.id
    }

    async fn fetch_page(&self, cursor: Option<&Cursor>) -> Result<ChangePage, FetchError> {
        self.calls.lock().unwrap().push(cursor.cloned());
        self.entered.notify_one();
        if let Some(gate) = &self.gate {
            gate.acquire().await.expect("gate closed").forget();
        }
        let next = self.pages.lock().unwrap().pop_front();
        next.unwrap_or_else(|| {
            let n = self.calls.lock().unwrap().len();
            page(Vec::new(), &format!("steady-{n}"), false)
        })
    }

    async fn entity_details(&self, id: &str) -> Result<EntityDetails, FetchError> {
        if self.details_fail {
            return Err(FetchError::Transient("details unavailable".to_string()));
        }
        Ok(EntityDetails {
            url: Some(format!("https://tasks.test/t/{id}")),
            description: None,
            assignees: vec!["ana".to_string()],
        })
    }
}

// ============================================================================
// MemoryCursorStore
// ============================================================================

#[derive(Default)]
pub struct MemoryCursorStore {
    cursors: Mutex<HashMap<FeedId, Cursor>>,
    /// Number of upcoming saves that fail
    pub failing_saves: AtomicU32,
    pub save_attempts: AtomicU32,
}

impl MemoryCursorStore {
    pub fn with_cursor(feed: &FeedId, c: &str) -> Self {
        let store = Self::default();
        store.cursors.lock().unwrap().insert(feed.clone(), cursor(c));
        store
    }

    pub fn get(&self, feed: &FeedId) -> Option<Cursor> {
        self.cursors.lock().unwrap().get(feed).cloned()
    }
}

#[async_trait::async_trait]
impl ICursorStore for MemoryCursorStore {
    async fn load(&self, feed: &FeedId) -> anyhow::Result<Option<Cursor>> {
        Ok(self.get(feed))
    }

    async fn save(
        &self,
        feed: &FeedId,
        expected: Option<&Cursor>,
        cursor: &Cursor,
    ) -> anyhow::Result<()> {
        self.save_attempts.fetch_add(1, Ordering::SeqCst);
        let remaining = self.failing_saves.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failing_saves.store(remaining - 1, Ordering::SeqCst);
            anyhow::bail!("database is locked");
        }
        let mut cursors = self.cursors.lock().unwrap();
        if cursors.get(feed) != expected {
            return Err(CursorConflict { feed: feed.clone() }.into());
        }
        cursors.insert(feed.clone(), cursor.clone());
        Ok(())
    }

    async fn reset(&self, feed: &FeedId) -> anyhow::Result<bool> {
        Ok(self.cursors.lock().unwrap().remove(feed).is_some())
    }
}

// ============================================================================
// Messaging doubles
// ============================================================================

/// Renders `<subject_id> <details-url?>`
pub struct IdRenderer;

impl IMessageRenderer for IdRenderer {
    fn render(&self, candidate: &NotificationCandidate) -> RenderedMessage {
        match candidate.details.as_ref().and_then(|d| d.url.as_deref()) {
            Some(url) => RenderedMessage::new(format!("{} {}", candidate.subject_id, url)),
            None => RenderedMessage::new(candidate.subject_id.clone()),
        }
    }
}

/// Records sends; fails every send to a channel named `broken`
#[derive(Default)]
pub struct RecordingSink {
    pub sent: Mutex<Vec<(String, String)>>,
}

impl RecordingSink {
    pub fn texts(&self) -> Vec<String> {
        let mut texts: Vec<String> = self
            .sent
            .lock()
            .unwrap()
            .iter()
            .map(|(_, t)| t.clone())
            .collect();
        texts.sort();
        texts
    }
}

#[async_trait::async_trait]
impl IMessagingSink for RecordingSink {
    async fn send(&self, channel: &ChannelName, message: &RenderedMessage) -> anyhow::Result<()> {
        if channel.as_str() == "broken" {
            anyhow::bail!("channel_not_found");
        }
        self.sent
            .lock()
            .unwrap()
            .push((channel.to_string(), message.text.clone()));
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryHistory {
    pub records: Mutex<Vec<RunRecord>>,
}

#[async_trait::async_trait]
impl IRunHistory for MemoryHistory {
    async fn record_run(&self, record: &RunRecord) -> anyhow::Result<()> {
        self.records.lock().unwrap().push(record.clone());
        Ok(())
    }

    async fn recent_runs(&self, feed: Option<&FeedId>, limit: u32) -> anyhow::Result<Vec<RunRecord>> {
        Ok(self
            .records
            .lock()
            .unwrap()
            .iter()
            .rev()
            .filter(|r| feed.map_or(true, |f| &r.feed == f))
            .take(limit as usize)
            .cloned()
            .collect())
    }
}

// ============================================================================
// Loop assembly
// ============================================================================

pub struct Harness {
    pub feed: Arc<ScriptedFeed>,
    pub store: Arc<MemoryCursorStore>,
    pub sink: Arc<RecordingSink>,
    pub history: Arc<MemoryHistory>,
    pub sync_loop: SyncLoop,
}

pub fn routes(rules: &[(&str, &str)], default: &str) -> RouteTable {
    RouteTable::new(
        rules
            .iter()
            .map(|(p, c)| RouteRule::new(*p, channel(c)).unwrap())
            .collect(),
        channel(default),
    )
}

pub fn harness(
    feed: ScriptedFeed,
    store: MemoryCursorStore,
    table: RouteTable,
    allow_list: &[&str],
    options: SyncOptions,
) -> Harness {
    harness_with_store(feed, Arc::new(store), table, allow_list, options)
}

/// Builds a loop over an existing store, so several loops can share it
pub fn harness_with_store(
    feed: ScriptedFeed,
    store: Arc<MemoryCursorStore>,
    table: RouteTable,
    allow_list: &[&str],
    options: SyncOptions,
) -> Harness {
    let feed = Arc::new(feed);
    let sink = Arc::new(RecordingSink::default());
    let history = Arc::new(MemoryHistory::default());
    let dispatcher = NotificationDispatcher::new(
        Arc::new(IdRenderer),
        sink.clone(),
        Duration::from_secs(5),
        4,
    );
    let sync_loop = SyncLoop::new(
        ChangeFetcher::new(feed.clone(), Duration::from_secs(5)),
        EventFilter::new(allow_list),
        Arc::new(table),
        dispatcher,
        store.clone(),
        options,
    )
    .with_history(history.clone());

    Harness {
        feed,
        store,
        sink,
        history,
        sync_loop,
    }
}

/// Options for runs that should dispatch regardless of bootstrap state
pub fn notify_always() -> SyncOptions {
    SyncOptions {
        notify_on_bootstrap: true,
        enrich_candidates: false,
    }
}

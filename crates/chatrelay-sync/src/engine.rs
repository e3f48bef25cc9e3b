//! Sync loop
//!
//! The [`SyncLoop`] drives one feed through
//!
//! ```text
//! Idle → Fetching → Classifying → Routing → Dispatching ─┐
//!          ▲                                              │ has_more
//!          └──────────────────────────────────────────────┘
//!                                                         │ last page
//!                                               Persisting → Idle
//! ```
//!
//! ## Cursor handling
//!
//! The stored cursor is read once when a run starts and replaced only after
//! the last page has been processed. Any fetch error aborts the run before
//! `Persisting`, leaving the stored cursor untouched; the next run re-reads
//! the same pages and the event filter collapses what it sees twice.
//!
//! The save is conditional on the cursor loaded in step 1. If another
//! process ran the same feed meanwhile, or the operator reset it, the save
//! is rejected and the run fails with [`SyncError::CursorStore`] instead of
//! moving the cursor backwards.
//!
//! ## Failure handling
//!
//! Dispatch failures are counted in the [`SyncSummary`] and never abort a
//! run. A failed cursor save is retried once.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use tokio::sync::{watch, Mutex};
use tracing::{debug, info, warn};

use chatrelay_core::config::Config;
use chatrelay_core::domain::{
    CandidateKind, ChannelName, Cursor, DispatchFailure, DispatchResult, FeedId,
    NotificationCandidate, RouteTable, RunId, RunRecord, SyncSummary,
};
use chatrelay_core::ports::{
    CursorConflict, IChangeFeed, ICursorStore, IMessageRenderer, IMessagingSink, IRunHistory,
};

use crate::dispatcher::NotificationDispatcher;
use crate::fetcher::ChangeFetcher;
use crate::filter::{EventFilter, FilterState};
use crate::SyncError;

/// Pause before the single cursor-save retry
const CURSOR_SAVE_RETRY_DELAY: Duration = Duration::from_millis(250);

// ============================================================================
// SyncPhase
// ============================================================================

/// Observable state of a [`SyncLoop`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPhase {
    Idle,
    /// Fetching the given page (1-based)
    Fetching { page: u32 },
    Classifying,
    Routing,
    Dispatching,
    Persisting,
}

impl std::fmt::Display for SyncPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SyncPhase::Idle => write!(f, "idle"),
            SyncPhase::Fetching { page } => write!(f, "fetching page {page}"),
            SyncPhase::Classifying => write!(f, "classifying"),
            SyncPhase::Routing => write!(f, "routing"),
            SyncPhase::Dispatching => write!(f, "dispatching"),
            SyncPhase::Persisting => write!(f, "persisting"),
        }
    }
}

// ============================================================================
// SyncOptions
// ============================================================================

/// Per-loop behavior switches
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncOptions {
    /// Dispatch candidates found while bootstrapping
    pub notify_on_bootstrap: bool,
    /// Fetch entity details for completed tasks before dispatch
    pub enrich_candidates: bool,
}

impl From<&chatrelay_core::config::SyncConfig> for SyncOptions {
    fn from(config: &chatrelay_core::config::SyncConfig) -> Self {
        Self {
            notify_on_bootstrap: config.notify_on_bootstrap,
            enrich_candidates: config.enrich_candidates,
        }
    }
}

// ============================================================================
// SyncLoop
// ============================================================================

/// Orchestrates fetch → classify → route → dispatch → persist for one feed
///
/// Runs are serialized: concurrent [`run`](SyncLoop::run) calls wait on an
/// internal lock and execute one after another.
pub struct SyncLoop {
    feed_id: FeedId,
    fetcher: ChangeFetcher,
    filter: EventFilter,
    routes: Arc<RouteTable>,
    dispatcher: NotificationDispatcher,
    cursor_store: Arc<dyn ICursorStore>,
    history: Option<Arc<dyn IRunHistory>>,
    options: SyncOptions,
    run_lock: Mutex<()>,
    phase_tx: watch::Sender<SyncPhase>,
}

impl SyncLoop {
    /// Creates a loop from already-built parts
    pub fn new(
        fetcher: ChangeFetcher,
        filter: EventFilter,
        routes: Arc<RouteTable>,
        dispatcher: NotificationDispatcher,
        cursor_store: Arc<dyn ICursorStore>,
        options: SyncOptions,
    ) -> Self {
        let (phase_tx, _) = watch::channel(SyncPhase::Idle);
        Self {
            feed_id: fetcher.feed_id().clone(),
            fetcher,
            filter,
            routes,
            dispatcher,
            cursor_store,
            history: None,
            options,
            run_lock: Mutex::new(()),
            phase_tx,
        }
    }

    /// Creates a loop for `feed` using the timeouts, routing and allow-list
    /// from `config`
    ///
    /// # Errors
    /// Returns [`SyncError::Config`] if the routing section is invalid.
    pub fn from_config(
        config: &Config,
        feed: Arc<dyn IChangeFeed>,
        cursor_store: Arc<dyn ICursorStore>,
        renderer: Arc<dyn IMessageRenderer>,
        sink: Arc<dyn IMessagingSink>,
    ) -> Result<Self, SyncError> {
        let routes = config
            .route_table()
            .map_err(|e| SyncError::Config(format!("routing: {e}")))?;
        let filter = EventFilter::new(config.allow_list(feed.feed_id()));
        let fetcher = ChangeFetcher::new(feed, Duration::from_secs(config.sync.fetch_timeout_secs));
        let dispatcher = NotificationDispatcher::new(
            renderer,
            sink,
            Duration::from_secs(config.sync.dispatch_timeout_secs),
            config.sync.dispatch_concurrency,
        );
        Ok(Self::new(
            fetcher,
            filter,
            Arc::new(routes),
            dispatcher,
            cursor_store,
            SyncOptions::from(&config.sync),
        ))
    }

    /// Records every finished or aborted run in `history`
    pub fn with_history(mut self, history: Arc<dyn IRunHistory>) -> Self {
        self.history = Some(history);
        self
    }

    pub fn feed_id(&self) -> &FeedId {
        &self.feed_id
    }

    /// Current phase
    pub fn phase(&self) -> SyncPhase {
        *self.phase_tx.borrow()
    }

    /// Receiver that observes every phase change
    pub fn subscribe_phase(&self) -> watch::Receiver<SyncPhase> {
        self.phase_tx.subscribe()
    }

    fn set_phase(&self, phase: SyncPhase) {
        self.phase_tx.send_replace(phase);
    }

    // ========================================================================
    // SyncLoop::run()
    // ========================================================================

    /// Performs one complete run
    ///
    /// 1. Loads the stored cursor (none → bootstrap)
    /// 2. Fetches pages until the feed reports no more
    /// 3. Classifies, routes and dispatches each page's candidates
    /// 4. Persists the furthest cursor if it moved
    /// 5. Records the run in history
    ///
    /// # Errors
    /// Fetch and cursor-store failures abort the run. Dispatch failures are
    /// reported in the returned summary instead.
    #[tracing::instrument(skip(self), fields(feed = %self.feed_id))]
    pub async fn run(&self) -> Result<SyncSummary, SyncError> {
        let _guard = self.run_lock.lock().await;
        let started_at = Utc::now();
        let start = Instant::now();
        let run_id = RunId::new();

        // Step 1: Load the stored cursor
        let initial = match self.cursor_store.load(&self.feed_id).await {
            Ok(cursor) => cursor,
            Err(e) => {
                let err = SyncError::CursorStore(format!("load failed: {e:#}"));
                let summary = SyncSummary::new(run_id, self.feed_id.clone(), false);
                self.finish_aborted(&summary, started_at, &err).await;
                return Err(err);
            }
        };
        let mut summary = SyncSummary::new(run_id, self.feed_id.clone(), initial.is_some());

        info!(
            run_id = %run_id,
            bootstrap = summary.is_bootstrap(),
            "Starting sync run"
        );

        // Steps 2-3: Page through the feed
        let furthest = match self.process_pages(initial.clone(), &mut summary).await {
            Ok(cursor) => cursor,
            Err(err) => {
                summary.duration_ms = start.elapsed().as_millis() as u64;
                self.finish_aborted(&summary, started_at, &err).await;
                return Err(err);
            }
        };

        // Step 4: Persist the cursor if it moved
        self.set_phase(SyncPhase::Persisting);
        if let Some(ref cursor) = furthest {
            if initial.as_ref() != Some(cursor) {
                if let Err(err) = self.persist_cursor(initial.as_ref(), cursor).await {
                    summary.duration_ms = start.elapsed().as_millis() as u64;
                    self.finish_aborted(&summary, started_at, &err).await;
                    return Err(err);
                }
                summary.cursor_advanced = true;
            }
        }

        summary.duration_ms = start.elapsed().as_millis() as u64;

        info!(
            run_id = %run_id,
            pages = summary.pages,
            fetched = summary.fetched,
            classified = summary.classified,
            suppressed = summary.suppressed,
            dispatched = summary.dispatched,
            failed = summary.failed,
            cursor_advanced = summary.cursor_advanced,
            duration_ms = summary.duration_ms,
            "Sync run complete"
        );

        // Step 5: Record the run
        self.record(RunRecord::completed(&summary, started_at)).await;
        self.set_phase(SyncPhase::Idle);

        Ok(summary)
    }

    /// Fetches and processes every page; returns the furthest cursor reached
    async fn process_pages(
        &self,
        initial: Option<Cursor>,
        summary: &mut SyncSummary,
    ) -> Result<Option<Cursor>, SyncError> {
        let mut cursor = initial;
        let mut state = FilterState::new();
        let suppress = summary.is_bootstrap() && !self.options.notify_on_bootstrap;

        loop {
            self.set_phase(SyncPhase::Fetching {
                page: summary.pages + 1,
            });
            let page = self
                .fetcher
                .fetch_page(cursor.as_ref())
                .await
                .map_err(|e| SyncError::from_fetch(&self.feed_id, e))?;
            summary.pages += 1;
            summary.fetched += page.entries.len() as u64;

            self.set_phase(SyncPhase::Classifying);
            let candidates = self.filter.classify(&page.entries, &mut state);
            summary.classified += candidates.len() as u64;

            debug!(
                page = summary.pages,
                entries = page.entries.len(),
                candidates = candidates.len(),
                has_more = page.has_more,
                "Page classified"
            );

            if suppress {
                summary.suppressed += candidates.len() as u64;
            } else if !candidates.is_empty() {
                self.set_phase(SyncPhase::Routing);
                let routed = self.route(candidates);

                self.set_phase(SyncPhase::Dispatching);
                let routed = self.enrich(routed).await;
                self.dispatch(routed, summary).await;
            }

            cursor = Some(page.next_cursor);
            if !page.has_more {
                break;
            }
        }

        if suppress && summary.suppressed > 0 {
            info!(
                suppressed = summary.suppressed,
                "Bootstrap run: notifications suppressed"
            );
        }

        Ok(cursor)
    }

    fn route(
        &self,
        candidates: Vec<NotificationCandidate>,
    ) -> Vec<(NotificationCandidate, ChannelName)> {
        candidates
            .into_iter()
            .map(|candidate| {
                let channel = self.routes.resolve_candidate(&candidate).clone();
                (candidate, channel)
            })
            .collect()
    }

    /// Attaches entity details to completed tasks; failures leave the
    /// candidate as it was
    async fn enrich(
        &self,
        routed: Vec<(NotificationCandidate, ChannelName)>,
    ) -> Vec<(NotificationCandidate, ChannelName)> {
        if !self.options.enrich_candidates {
            return routed;
        }

        let mut enriched = Vec::with_capacity(routed.len());
        for (candidate, channel) in routed {
            if candidate.kind != CandidateKind::TaskCompleted {
                enriched.push((candidate, channel));
                continue;
            }
            match self.fetcher.entity_details(&candidate.subject_id).await {
                Ok(details) => enriched.push((candidate.with_details(details), channel)),
                Err(e) => {
                    warn!(
                        subject = %candidate.subject_id,
                        error = %e,
                        "Enrichment failed, dispatching without details"
                    );
                    enriched.push((candidate, channel));
                }
            }
        }
        enriched
    }

    async fn dispatch(
        &self,
        routed: Vec<(NotificationCandidate, ChannelName)>,
        summary: &mut SyncSummary,
    ) {
        for dispatched in self.dispatcher.dispatch_all(routed).await {
            match dispatched.result {
                DispatchResult::Delivered => summary.dispatched += 1,
                DispatchResult::Failed(reason) => {
                    let err = SyncError::Dispatch {
                        subject_id: dispatched.candidate.subject_id.clone(),
                        reason: reason.clone(),
                    };
                    warn!(channel = %dispatched.channel, error = %err, "Notification not delivered");
                    summary.record_failure(DispatchFailure {
                        subject_id: dispatched.candidate.subject_id,
                        channel: dispatched.channel,
                        reason,
                    });
                }
            }
        }
    }

    /// Saves `cursor` over `expected`, retrying once after a short pause
    ///
    /// A conflict means another run or a reset moved the stored cursor; it
    /// is not retried.
    async fn persist_cursor(
        &self,
        expected: Option<&Cursor>,
        cursor: &Cursor,
    ) -> Result<(), SyncError> {
        let first = match self.cursor_store.save(&self.feed_id, expected, cursor).await {
            Ok(()) => return Ok(()),
            Err(e) => e,
        };
        if first.downcast_ref::<CursorConflict>().is_some() {
            return Err(SyncError::CursorStore(format!("save rejected: {first}")));
        }

        warn!(error = %format!("{first:#}"), "Cursor save failed, retrying once");
        tokio::time::sleep(CURSOR_SAVE_RETRY_DELAY).await;
        self.cursor_store
            .save(&self.feed_id, expected, cursor)
            .await
            .map_err(|e| SyncError::CursorStore(format!("save failed: {e:#}")))
    }

    async fn finish_aborted(
        &self,
        summary: &SyncSummary,
        started_at: chrono::DateTime<Utc>,
        err: &SyncError,
    ) {
        warn!(
            run_id = %summary.run_id,
            kind = err.kind(),
            error = %err,
            pages = summary.pages,
            "Sync run aborted; cursor unchanged"
        );
        self.record(RunRecord::aborted(summary, started_at, err.to_string()))
            .await;
        self.set_phase(SyncPhase::Idle);
    }

    async fn record(&self, record: RunRecord) {
        if let Some(history) = &self.history {
            if let Err(e) = history.record_run(&record).await {
                warn!(error = %format!("{e:#}"), "Failed to record run history");
            }
        }
    }
}

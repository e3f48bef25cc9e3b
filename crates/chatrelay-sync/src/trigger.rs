//! Trigger worker - serializes and coalesces run requests for one feed
//!
//! Webhook pings and poll ticks arrive at arbitrary times. The
//! [`SyncWorker`] owns a [`SyncLoop`] and executes runs one at a time; the
//! request channel has capacity one, so a trigger that arrives while a run is
//! in progress queues exactly one follow-up and any further triggers fold
//! into it.
//!
//! ```text
//! webhook ─┐
//! timer  ──┼──→ SyncHandle::trigger ──→ mpsc(1) ──→ SyncWorker ──→ SyncLoop::run
//! cli    ──┘                                            │
//!                                                 watch(last run)
//! ```

use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use chatrelay_core::domain::{FeedId, SyncSummary};

use crate::engine::SyncLoop;
use crate::SyncError;

/// Result of the most recent run
pub type LastRun = Option<Result<SyncSummary, SyncError>>;

/// What happened to a trigger
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerOutcome {
    /// A new run was queued
    Queued,
    /// A run was already queued; this trigger folded into it
    Coalesced,
}

/// The worker has shut down
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("sync worker for feed '{0}' is not running")]
pub struct WorkerStopped(pub FeedId);

// ============================================================================
// SyncHandle
// ============================================================================

/// Cloneable handle for requesting runs
#[derive(Clone)]
pub struct SyncHandle {
    feed: FeedId,
    tx: mpsc::Sender<()>,
    last_run: watch::Receiver<LastRun>,
}

impl SyncHandle {
    pub fn feed(&self) -> &FeedId {
        &self.feed
    }

    /// Requests a run without waiting for it
    pub fn trigger(&self) -> Result<TriggerOutcome, WorkerStopped> {
        match self.tx.try_send(()) {
            Ok(()) => {
                debug!(feed = %self.feed, "Sync run queued");
                Ok(TriggerOutcome::Queued)
            }
            Err(mpsc::error::TrySendError::Full(())) => {
                debug!(feed = %self.feed, "Sync run already queued, coalescing");
                Ok(TriggerOutcome::Coalesced)
            }
            Err(mpsc::error::TrySendError::Closed(())) => Err(WorkerStopped(self.feed.clone())),
        }
    }

    /// Result of the most recent completed run, if any
    pub fn last_run(&self) -> LastRun {
        self.last_run.borrow().clone()
    }

    /// Receiver notified after every run
    pub fn subscribe(&self) -> watch::Receiver<LastRun> {
        self.last_run.clone()
    }
}

// ============================================================================
// SyncWorker
// ============================================================================

/// Executes queued runs for one [`SyncLoop`]
pub struct SyncWorker {
    sync_loop: Arc<SyncLoop>,
    rx: mpsc::Receiver<()>,
    last_run: watch::Sender<LastRun>,
}

impl SyncWorker {
    /// Creates a worker and the handle used to trigger it
    pub fn new(sync_loop: Arc<SyncLoop>) -> (Self, SyncHandle) {
        let (tx, rx) = mpsc::channel(1);
        let (last_tx, last_rx) = watch::channel(None);
        let handle = SyncHandle {
            feed: sync_loop.feed_id().clone(),
            tx,
            last_run: last_rx,
        };
        let worker = Self {
            sync_loop,
            rx,
            last_run: last_tx,
        };
        (worker, handle)
    }

    /// Processes requests until `cancel` fires or every handle is dropped
    ///
    /// A run in progress when `cancel` fires is allowed to finish.
    pub async fn run(mut self, cancel: CancellationToken) {
        let feed = self.sync_loop.feed_id().clone();
        info!(%feed, "Sync worker started");

        loop {
            tokio::select! {
                biased;

                _ = cancel.cancelled() => {
                    info!(%feed, "Shutdown requested, sync worker stopping");
                    break;
                }

                request = self.rx.recv() => {
                    if request.is_none() {
                        info!(%feed, "All trigger handles dropped, sync worker stopping");
                        break;
                    }
                    let result = self.sync_loop.run().await;
                    if let Err(ref e) = result {
                        warn!(%feed, kind = e.kind(), error = %e, "Triggered sync run failed");
                    }
                    self.last_run.send_replace(Some(result));
                }
            }
        }
    }
}

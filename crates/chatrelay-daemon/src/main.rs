//! ChatRelay Daemon - long-running relay service
//!
//! Runs one sync worker per enabled feed and triggers it from:
//! - Webhook pings (`POST /hooks/{feed}`)
//! - An optional poll timer (`trigger.poll_interval_secs`)
//! - A single run per feed at startup
//!
//! Shutdown on SIGTERM/SIGINT cancels a shared `CancellationToken`; workers
//! finish the run in progress before exiting.

mod listener;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use dashmap::DashMap;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use chatrelay_cache::{DatabasePool, SqliteCursorStore, SqliteRunHistory};
use chatrelay_core::config::{Config, LoggingConfig};
use chatrelay_core::ports::{ICursorStore, IRunHistory};
use chatrelay_providers::ProviderSet;
use chatrelay_sync::{SyncLoop, SyncWorker, TriggerOutcome};

use crate::listener::{FeedRegistry, WebhookListener};

/// Overrides the configuration file location
const CONFIG_ENV: &str = "CHATRELAY_CONFIG";

// ============================================================================
// DaemonService
// ============================================================================

struct DaemonService {
    config: Config,
    registry: FeedRegistry,
    shutdown: CancellationToken,
}

impl DaemonService {
    fn new(config: Config, shutdown: CancellationToken) -> Result<Self> {
        let problems = config.validate();
        if !problems.is_empty() {
            for p in &problems {
                error!(field = %p.field, "{}", p.message);
            }
            anyhow::bail!("Configuration has {} problem(s)", problems.len());
        }

        Ok(Self {
            config,
            registry: Arc::new(DashMap::new()),
            shutdown,
        })
    }

    /// Runs until the shutdown token is cancelled
    async fn run(&self) -> Result<()> {
        // Step 1: Persistence
        let pool = DatabasePool::new(&self.config.database.path)
            .await
            .context("Failed to open database")?;
        let cursors: Arc<dyn ICursorStore> = Arc::new(SqliteCursorStore::new(pool.pool().clone()));
        let history: Arc<dyn IRunHistory> = Arc::new(SqliteRunHistory::new(pool.pool().clone()));

        // Step 2: Adapters
        let providers = ProviderSet::from_config(&self.config).context("Failed to configure providers")?;
        if providers.feeds().is_empty() {
            anyhow::bail!("No feeds enabled; enable storage and/or tasks in the configuration");
        }
        let sink = providers.sink()?;

        // Step 3: One worker per feed
        let mut workers = JoinSet::new();
        for feed in providers.feeds() {
            let sync_loop = SyncLoop::from_config(
                &self.config,
                Arc::clone(feed),
                Arc::clone(&cursors),
                providers.renderer(),
                Arc::clone(&sink),
            )?
            .with_history(Arc::clone(&history));

            let (worker, handle) = SyncWorker::new(Arc::new(sync_loop));
            workers.spawn(worker.run(self.shutdown.child_token()));
            self.registry.insert(feed.feed_id().clone(), handle);
        }
        info!(feeds = self.registry.len(), "Sync workers started");

        // Step 4: Trigger surfaces
        if self.config.trigger.webhooks_enabled {
            let listener = WebhookListener::bind(&self.config.trigger.listen_addr, Arc::clone(&self.registry))
                .await
                .with_context(|| format!("Failed to bind {}", self.config.trigger.listen_addr))?;
            let token = self.shutdown.child_token();
            tokio::spawn(async move {
                if let Err(e) = listener.run(token).await {
                    error!(error = %e, "Webhook listener failed");
                }
            });
        }

        if self.config.trigger.poll_interval_secs > 0 {
            tokio::spawn(poll_timer(
                Arc::clone(&self.registry),
                Duration::from_secs(self.config.trigger.poll_interval_secs),
                self.shutdown.child_token(),
            ));
        }

        // Step 5: Catch up on anything missed while stopped
        trigger_all(&self.registry, "startup");

        self.shutdown.cancelled().await;
        info!("Waiting for sync workers to finish");
        while let Some(joined) = workers.join_next().await {
            if let Err(e) = joined {
                warn!(error = %e, "Sync worker task ended abnormally");
            }
        }

        pool.pool().close().await;
        Ok(())
    }
}

fn trigger_all(registry: &FeedRegistry, source: &str) {
    for entry in registry.iter() {
        match entry.value().trigger() {
            Ok(TriggerOutcome::Queued) => info!(feed = %entry.key(), source, "Sync run queued"),
            Ok(TriggerOutcome::Coalesced) => {}
            Err(e) => warn!(error = %e, source, "Could not trigger sync"),
        }
    }
}

/// Triggers every feed each `interval` until cancelled
async fn poll_timer(registry: FeedRegistry, interval: Duration, shutdown: CancellationToken) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    // First tick fires immediately; startup already triggered
    ticker.tick().await;

    info!(interval_secs = interval.as_secs(), "Poll timer started");
    loop {
        tokio::select! {
            _ = ticker.tick() => trigger_all(&registry, "poll"),
            _ = shutdown.cancelled() => break,
        }
    }
}

// ============================================================================
// Startup helpers
// ============================================================================

fn config_path() -> PathBuf {
    std::env::var_os(CONFIG_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(Config::default_path)
}

/// Installs the global subscriber; `RUST_LOG` wins over the configured level
fn init_tracing(logging: &LoggingConfig) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));

    if logging.format == "json" {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .init();
    }
}

async fn shutdown_signal(token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received SIGINT (Ctrl+C)"),
        _ = terminate => info!("Received SIGTERM"),
    }

    token.cancel();
}

#[tokio::main]
async fn main() -> Result<()> {
    let path = config_path();
    let config = if path.exists() {
        Config::load(&path).with_context(|| format!("Failed to load {}", path.display()))?
    } else {
        Config::default()
    };
    init_tracing(&config.logging);

    info!(config_path = %path.display(), "ChatRelay daemon starting (chatrelayd)");

    let shutdown = CancellationToken::new();
    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        shutdown_signal(signal_token).await;
    });

    let service = DaemonService::new(config, shutdown)?;
    let result = service.run().await;

    match &result {
        Ok(()) => info!("ChatRelay daemon shut down gracefully"),
        Err(e) => error!(error = %e, "ChatRelay daemon exiting with error"),
    }

    result
}

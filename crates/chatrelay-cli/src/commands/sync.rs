//! Sync command - run the relay loop once, in-process
//!
//! 1. Loads and validates configuration
//! 2. Opens the database (cursors + run history)
//! 3. Builds the provider adapters
//! 4. Runs one [`SyncLoop`] per selected feed, in order, and prints each summary

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use tracing::info;

use chatrelay_cache::{SqliteCursorStore, SqliteRunHistory};
use chatrelay_core::domain::SyncSummary;
use chatrelay_core::ports::{ICursorStore, IRunHistory};
use chatrelay_providers::ProviderSet;
use chatrelay_sync::{SyncError, SyncLoop};

use super::{parse_feed, CliContext};
use crate::output::{get_formatter, plural, OutputFormatter};

#[derive(Debug, Args)]
pub struct SyncCommand {
    /// Only sync this feed (`storage` or `tasks`)
    #[arg(long)]
    pub feed: Option<String>,
}

impl SyncCommand {
    pub async fn execute(&self, ctx: &CliContext) -> Result<()> {
        let formatter = get_formatter(ctx.format);

        // Step 1: Configuration
        let config = ctx.load_config()?;
        let problems = config.validate();
        if !problems.is_empty() {
            for p in &problems {
                formatter.error(&format!("{}: {}", p.field, p.message));
            }
            anyhow::bail!("Configuration is invalid; see `chatrelay config validate`");
        }

        // Step 2: Persistence
        let pool = ctx.open_database(&config).await?;
        let cursors: Arc<dyn ICursorStore> = Arc::new(SqliteCursorStore::new(pool.pool().clone()));
        let history: Arc<dyn IRunHistory> = Arc::new(SqliteRunHistory::new(pool.pool().clone()));

        // Step 3: Adapters
        let providers = ProviderSet::from_config(&config)?;
        let feeds = match &self.feed {
            Some(name) => {
                let id = parse_feed(name)?;
                let feed = providers
                    .feed(&id)
                    .with_context(|| format!("Feed '{}' is not enabled", id))?;
                vec![feed]
            }
            None => providers.feeds().to_vec(),
        };
        if feeds.is_empty() {
            formatter.warn("No feeds enabled; nothing to sync");
            return Ok(());
        }
        let sink = providers.sink()?;

        // Step 4: Run
        let mut results = Vec::new();
        for feed in feeds {
            let feed_id = feed.feed_id().clone();
            let sync_loop = SyncLoop::from_config(
                &config,
                feed,
                Arc::clone(&cursors),
                providers.renderer(),
                Arc::clone(&sink),
            )?
            .with_history(Arc::clone(&history));

            info!(feed = %feed_id, "Starting sync");
            results.push((feed_id, sync_loop.run().await));
        }

        // Step 5: Report
        let failed_runs = results.iter().filter(|(_, r)| r.is_err()).count();
        if ctx.format.is_json() {
            let runs: Vec<serde_json::Value> = results
                .iter()
                .map(|(feed, result)| match result {
                    Ok(summary) => serde_json::json!({
                        "feed": feed.as_str(),
                        "ok": true,
                        "summary": summary,
                    }),
                    Err(e) => serde_json::json!({
                        "feed": feed.as_str(),
                        "ok": false,
                        "kind": e.kind(),
                        "error": e.to_string(),
                        "retryable": e.is_retryable(),
                    }),
                })
                .collect();
            formatter.print_json(&serde_json::json!({ "runs": runs }));
        } else {
            for (feed, result) in &results {
                match result {
                    Ok(summary) => print_summary(formatter.as_ref(), summary),
                    Err(e) => print_error(formatter.as_ref(), feed.as_str(), e),
                }
            }
        }

        pool.pool().close().await;

        if failed_runs > 0 {
            anyhow::bail!("{} of {} sync run(s) failed", failed_runs, results.len());
        }
        Ok(())
    }
}

fn print_summary(formatter: &dyn OutputFormatter, summary: &SyncSummary) {
    let duration = if summary.duration_ms >= 1000 {
        format!("{:.1}s", summary.duration_ms as f64 / 1000.0)
    } else {
        format!("{}ms", summary.duration_ms)
    };

    if summary.is_bootstrap() {
        formatter.success(&format!("{}: bootstrap completed in {}", summary.feed, duration));
    } else if summary.classified == 0 {
        formatter.success(&format!("{}: already up to date ({})", summary.feed, duration));
    } else {
        formatter.success(&format!("{}: sync completed in {}", summary.feed, duration));
    }

    formatter.info(&format!(
        "Fetched:    {} in {}",
        plural(summary.fetched, "change"),
        plural(u64::from(summary.pages), "page")
    ));
    formatter.info(&format!("Candidates: {}", summary.classified));
    if summary.suppressed > 0 {
        formatter.info(&format!(
            "Suppressed: {} (bootstrap run)",
            summary.suppressed
        ));
    }
    formatter.info(&format!("Dispatched: {}", summary.dispatched));

    if summary.failed > 0 {
        formatter.warn(&format!(
            "{} could not be delivered:",
            plural(summary.failed, "notification")
        ));
        for f in &summary.failures {
            formatter.info(&format!("  - {} -> #{}: {}", f.subject_id, f.channel, f.reason));
        }
    }
}

fn print_error(formatter: &dyn OutputFormatter, feed: &str, err: &SyncError) {
    formatter.error(&format!("{}: {}", feed, err));
    if err.is_retryable() {
        formatter.info("The cursor was not advanced; the next run will retry.");
    }
}

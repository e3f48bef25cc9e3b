//! History command - show recent sync runs

use anyhow::Result;
use chrono::Utc;
use clap::Args;

use chatrelay_cache::SqliteRunHistory;
use chatrelay_core::domain::RunOutcome;
use chatrelay_core::ports::IRunHistory;

use super::{parse_feed, CliContext};
use crate::output::{get_formatter, plural};

#[derive(Debug, Args)]
pub struct HistoryCommand {
    /// Only show runs of this feed
    #[arg(long)]
    pub feed: Option<String>,

    /// Number of runs to show
    #[arg(long, default_value_t = 20)]
    pub limit: u32,

    /// Delete runs older than this many days before listing
    #[arg(long, value_name = "DAYS")]
    pub prune: Option<u32>,
}

impl HistoryCommand {
    pub async fn execute(&self, ctx: &CliContext) -> Result<()> {
        let formatter = get_formatter(ctx.format);
        let config = ctx.load_config()?;
        let feed = self.feed.as_deref().map(parse_feed).transpose()?;

        let pool = ctx.open_database(&config).await?;
        let history = SqliteRunHistory::new(pool.pool().clone());

        if let Some(days) = self.prune {
            let cutoff = Utc::now() - chrono::Duration::days(i64::from(days));
            let removed = history.prune_before(cutoff).await?;
            formatter.success(&format!("Pruned {} older than {} days", plural(removed, "run"), days));
        }

        let runs = history.recent_runs(feed.as_ref(), self.limit).await?;

        if ctx.format.is_json() {
            formatter.print_json(&serde_json::json!({ "runs": runs }));
        } else if runs.is_empty() {
            formatter.info("No sync runs recorded");
        } else {
            for run in &runs {
                let line = format!(
                    "{} {:<8} {:<24} dispatched={} failed={} ({}ms)",
                    run.finished_at.format("%Y-%m-%d %H:%M:%S"),
                    run.feed.as_str(),
                    run.outcome.as_str(),
                    run.dispatched,
                    run.failed,
                    run.duration().num_milliseconds()
                );
                match run.outcome {
                    RunOutcome::Completed => formatter.success(&line),
                    RunOutcome::CompletedWithFailures => formatter.warn(&line),
                    RunOutcome::Aborted => {
                        formatter.error(&line);
                        if let Some(err) = &run.error {
                            formatter.info(&format!("  {}", err));
                        }
                    }
                }
            }
        }

        pool.pool().close().await;
        Ok(())
    }
}

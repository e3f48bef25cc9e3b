//! Cursor command - inspect and reset stored feed cursors
//!
//! Resetting a feed makes its next run a bootstrap run: the listing starts
//! over and, unless `sync.notify_on_bootstrap` is set, nothing is posted
//! until the run completes.

use anyhow::Result;
use clap::Subcommand;
use tracing::info;

use chatrelay_cache::SqliteCursorStore;
use chatrelay_core::ports::ICursorStore;

use super::{parse_feed, CliContext};
use crate::output::get_formatter;

#[derive(Debug, Subcommand)]
pub enum CursorCommand {
    /// List stored cursors
    Show,
    /// Forget the cursor of one feed
    Reset {
        /// Feed name (`storage` or `tasks`)
        feed: String,
    },
}

impl CursorCommand {
    pub async fn execute(&self, ctx: &CliContext) -> Result<()> {
        let formatter = get_formatter(ctx.format);
        let config = ctx.load_config()?;
        let pool = ctx.open_database(&config).await?;
        let store = SqliteCursorStore::new(pool.pool().clone());

        match self {
            CursorCommand::Show => {
                let cursors = store.list().await?;
                if ctx.format.is_json() {
                    let items: Vec<serde_json::Value> = cursors
                        .iter()
                        .map(|(feed, cursor, updated_at)| {
                            serde_json::json!({
                                "feed": feed.as_str(),
                                "cursor": cursor.as_str(),
                                "updated_at": updated_at,
                            })
                        })
                        .collect();
                    formatter.print_json(&serde_json::json!({ "cursors": items }));
                } else if cursors.is_empty() {
                    formatter.info("No cursors stored; the next run of each feed bootstraps");
                } else {
                    for (feed, cursor, updated_at) in &cursors {
                        formatter.success(&format!("{}", feed));
                        formatter.info(&format!("Cursor:  {}", abbreviate(cursor.as_str())));
                        formatter.info(&format!("Updated: {}", updated_at));
                    }
                }
            }
            CursorCommand::Reset { feed } => {
                let feed = parse_feed(feed)?;
                let removed = store.reset(&feed).await?;
                info!(%feed, removed, "Cursor reset requested");

                if ctx.format.is_json() {
                    formatter.print_json(&serde_json::json!({
                        "feed": feed.as_str(),
                        "removed": removed,
                    }));
                } else if removed {
                    formatter.success(&format!(
                        "Cursor for '{}' removed; the next run bootstraps",
                        feed
                    ));
                } else {
                    formatter.warn(&format!("No cursor stored for '{}'", feed));
                }
            }
        }

        pool.pool().close().await;
        Ok(())
    }
}

/// Cursors can be long opaque blobs; show the ends only
fn abbreviate(cursor: &str) -> String {
    let chars: Vec<char> = cursor.chars().collect();
    if chars.len() <= 40 {
        return cursor.to_string();
    }
    let head: String = chars[..16].iter().collect();
    let tail: String = chars[chars.len() - 16..].iter().collect();
    format!("{}...{}", head, tail)
}

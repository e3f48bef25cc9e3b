//! SQLite implementation of IRunHistory

use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use chatrelay_core::domain::{FeedId, RunId, RunOutcome, RunRecord};
use chatrelay_core::ports::IRunHistory;

use crate::CacheError;

/// Append-only log of sync runs
pub struct SqliteRunHistory {
    pool: SqlitePool,
}

impl SqliteRunHistory {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Deletes runs that finished before `cutoff`; returns how many went
    pub async fn prune_before(&self, cutoff: DateTime<Utc>) -> Result<u64, CacheError> {
        let result = sqlx::query("DELETE FROM sync_runs WHERE finished_at < ?")
            .bind(format_timestamp(&cutoff))
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, CacheError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| CacheError::CorruptRow(format!("Failed to parse timestamp '{}': {}", s, e)))
}

fn record_from_row(row: &SqliteRow) -> Result<RunRecord, CacheError> {
    let run_id_str: String = row.get("run_id");
    let feed_str: String = row.get("feed_id");
    let outcome_str: String = row.get("outcome");
    let fetched: i64 = row.get("fetched");
    let classified: i64 = row.get("classified");
    let dispatched: i64 = row.get("dispatched");
    let failed: i64 = row.get("failed");
    let error: Option<String> = row.get("error");
    let started_at: String = row.get("started_at");
    let finished_at: String = row.get("finished_at");

    let run_id = RunId::from_str(&run_id_str).map_err(|e| {
        CacheError::CorruptRow(format!("Invalid run id '{}': {}", run_id_str, e))
    })?;
    let feed = FeedId::new(feed_str.clone())
        .map_err(|e| CacheError::CorruptRow(format!("Invalid feed id '{}': {}", feed_str, e)))?;
    let outcome = RunOutcome::parse(&outcome_str)
        .ok_or_else(|| CacheError::CorruptRow(format!("Unknown run outcome '{}'", outcome_str)))?;

    Ok(RunRecord {
        run_id,
        feed,
        outcome,
        fetched: fetched as u64,
        classified: classified as u64,
        dispatched: dispatched as u64,
        failed: failed as u64,
        error,
        started_at: parse_timestamp(&started_at)?,
        finished_at: parse_timestamp(&finished_at)?,
    })
}

#[async_trait::async_trait]
impl IRunHistory for SqliteRunHistory {
    async fn record_run(&self, record: &RunRecord) -> anyhow::Result<()> {
        sqlx::query(
            "INSERT INTO sync_runs \
             (run_id, feed_id, outcome, fetched, classified, dispatched, failed, \
              error, started_at, finished_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(record.run_id.to_string())
        .bind(record.feed.as_str())
        .bind(record.outcome.as_str())
        .bind(record.fetched as i64)
        .bind(record.classified as i64)
        .bind(record.dispatched as i64)
        .bind(record.failed as i64)
        .bind(&record.error)
        .bind(format_timestamp(&record.started_at))
        .bind(format_timestamp(&record.finished_at))
        .execute(&self.pool)
        .await
        .map_err(CacheError::from)?;

        tracing::trace!(run_id = %record.run_id, feed = %record.feed, "Recorded sync run");
        Ok(())
    }

    async fn recent_runs(&self, feed: Option<&FeedId>, limit: u32) -> anyhow::Result<Vec<RunRecord>> {
        let rows = match feed {
            Some(feed) => {
                sqlx::query(
                    "SELECT * FROM sync_runs WHERE feed_id = ? \
                     ORDER BY finished_at DESC, rowid DESC LIMIT ?",
                )
                .bind(feed.as_str())
                .bind(limit as i64)
                .fetch_all(&self.pool)
                .await
            }
            None => {
                sqlx::query("SELECT * FROM sync_runs ORDER BY finished_at DESC, rowid DESC LIMIT ?")
                    .bind(limit as i64)
                    .fetch_all(&self.pool)
                    .await
            }
        }
        .map_err(CacheError::from)?;

        let records = rows
            .iter()
            .map(record_from_row)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(records)
    }
}

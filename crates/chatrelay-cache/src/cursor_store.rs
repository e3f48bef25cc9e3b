//! SQLite implementation of ICursorStore
//!
//! One row per feed in `feed_cursors`. Saves are single conditional
//! statements run inside a transaction, so a concurrent `load` observes
//! either the previous cursor or the new one. The condition is the cursor
//! the run started from; a save against a moved or reset cursor writes
//! nothing and fails with [`CursorConflict`].

use chrono::{SecondsFormat, Utc};
use sqlx::{Row, SqlitePool};

use chatrelay_core::domain::{Cursor, FeedId};
use chatrelay_core::ports::{CursorConflict, ICursorStore};

use crate::CacheError;

/// Durable cursor storage keyed by feed id
pub struct SqliteCursorStore {
    pool: SqlitePool,
}

impl SqliteCursorStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Every stored cursor with its last update time, ordered by feed id
    pub async fn list(&self) -> Result<Vec<(FeedId, Cursor, String)>, CacheError> {
        let rows = sqlx::query("SELECT feed_id, cursor, updated_at FROM feed_cursors ORDER BY feed_id")
            .fetch_all(&self.pool)
            .await?;

        rows.iter()
            .map(|row| {
                let feed_str: String = row.get("feed_id");
                let cursor_str: String = row.get("cursor");
                let updated_at: String = row.get("updated_at");
                let feed = FeedId::new(feed_str.clone()).map_err(|e| {
                    CacheError::CorruptRow(format!("Invalid feed id '{}': {}", feed_str, e))
                })?;
                let cursor = Cursor::new(cursor_str).map_err(|e| {
                    CacheError::CorruptRow(format!("Invalid cursor for feed '{}': {}", feed_str, e))
                })?;
                Ok((feed, cursor, updated_at))
            })
            .collect()
    }
}

#[async_trait::async_trait]
impl ICursorStore for SqliteCursorStore {
    async fn load(&self, feed: &FeedId) -> anyhow::Result<Option<Cursor>> {
        let row = sqlx::query("SELECT cursor FROM feed_cursors WHERE feed_id = ?")
            .bind(feed.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(CacheError::from)?;

        match row {
            Some(row) => {
                let value: String = row.get("cursor");
                let cursor = Cursor::new(value).map_err(|e| {
                    CacheError::CorruptRow(format!("Invalid cursor for feed '{}': {}", feed, e))
                })?;
                Ok(Some(cursor))
            }
            None => Ok(None),
        }
    }

    async fn save(
        &self,
        feed: &FeedId,
        expected: Option<&Cursor>,
        cursor: &Cursor,
    ) -> anyhow::Result<()> {
        let updated_at = Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true);

        let mut tx = self.pool.begin().await.map_err(CacheError::from)?;
        let result = match expected {
            Some(previous) => {
                sqlx::query(
                    "UPDATE feed_cursors SET cursor = ?, updated_at = ? \
                     WHERE feed_id = ? AND cursor = ?",
                )
                .bind(cursor.as_str())
                .bind(&updated_at)
                .bind(feed.as_str())
                .bind(previous.as_str())
                .execute(&mut *tx)
                .await
            }
            None => {
                sqlx::query(
                    "INSERT INTO feed_cursors (feed_id, cursor, updated_at) VALUES (?, ?, ?) \
                     ON CONFLICT(feed_id) DO NOTHING",
                )
                .bind(feed.as_str())
                .bind(cursor.as_str())
                .bind(&updated_at)
                .execute(&mut *tx)
                .await
            }
        }
        .map_err(CacheError::from)?;

        if result.rows_affected() == 0 {
            tx.rollback().await.map_err(CacheError::from)?;
            tracing::warn!(%feed, "Stored cursor changed underneath this run, not saving");
            return Err(CursorConflict { feed: feed.clone() }.into());
        }
        tx.commit().await.map_err(CacheError::from)?;

        tracing::trace!(%feed, "Saved cursor");
        Ok(())
    }

    async fn reset(&self, feed: &FeedId) -> anyhow::Result<bool> {
        let result = sqlx::query("DELETE FROM feed_cursors WHERE feed_id = ?")
            .bind(feed.as_str())
            .execute(&self.pool)
            .await
            .map_err(CacheError::from)?;

        let removed = result.rows_affected() > 0;
        if removed {
            tracing::info!(%feed, "Cursor reset");
        }
        Ok(removed)
    }
}

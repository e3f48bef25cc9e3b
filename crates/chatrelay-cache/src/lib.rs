//! ChatRelay Cache - durable sync state
//!
//! SQLite-backed storage for:
//! - Per-feed change cursors
//! - Sync run history
//!
//! Both stores are driven adapters for ports defined in `chatrelay-core`:
//! [`SqliteCursorStore`] implements `ICursorStore` and
//! [`SqliteRunHistory`] implements `IRunHistory`. They share one
//! [`DatabasePool`].
//!
//! ```no_run
//! use std::path::Path;
//! use chatrelay_cache::{DatabasePool, SqliteCursorStore};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let pool = DatabasePool::new(Path::new("/var/lib/chatrelay/chatrelay.db")).await?;
//! let cursors = SqliteCursorStore::new(pool.pool().clone());
//! # Ok(())
//! # }
//! ```

pub mod cursor_store;
pub mod pool;
pub mod run_history;

pub use cursor_store::SqliteCursorStore;
pub use pool::DatabasePool;
pub use run_history::SqliteRunHistory;

/// Errors that can occur during cache operations
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// Failed to establish a database connection
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// A database query failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Schema migration failed
    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    /// A stored value could not be turned back into a domain type
    #[error("Corrupt row: {0}")]
    CorruptRow(String),
}

impl From<sqlx::Error> for CacheError {
    fn from(e: sqlx::Error) -> Self {
        CacheError::QueryFailed(e.to_string())
    }
}

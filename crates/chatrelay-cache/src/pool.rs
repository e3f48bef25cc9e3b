//! Database connection pool management

use std::path::Path;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};

use crate::CacheError;

/// Pool of SQLite connections shared by the cursor store and run history
///
/// File-backed pools use WAL mode, a 5-second busy timeout and up to 5
/// connections. In-memory pools hold a single connection since every
/// SQLite in-memory connection is its own database.
pub struct DatabasePool {
    pool: SqlitePool,
}

impl DatabasePool {
    /// Opens (creating if needed) the database at `db_path` and migrates it
    pub async fn new(db_path: &Path) -> Result<Self, CacheError> {
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    CacheError::ConnectionFailed(format!(
                        "Failed to create database directory {}: {}",
                        parent.display(),
                        e
                    ))
                })?;
            }
        }

        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(|e| {
                CacheError::ConnectionFailed(format!(
                    "Failed to connect to database at {}: {}",
                    db_path.display(),
                    e
                ))
            })?;

        Self::run_migrations(&pool).await?;

        tracing::info!(path = %db_path.display(), "Database pool initialized");

        Ok(Self { pool })
    }

    /// Creates a migrated in-memory database, for tests
    pub async fn in_memory() -> Result<Self, CacheError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .map_err(|e| {
                CacheError::ConnectionFailed(format!("Failed to create in-memory database: {}", e))
            })?;

        Self::run_migrations(&pool).await?;

        tracing::debug!("In-memory database pool initialized");

        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn run_migrations(pool: &SqlitePool) -> Result<(), CacheError> {
        let migration_sql = include_str!("migrations/20261016_initial.sql");
        sqlx::raw_sql(migration_sql)
            .execute(pool)
            .await
            .map_err(|e| {
                CacheError::MigrationFailed(format!("Failed to run initial migration: {}", e))
            })?;

        tracing::debug!("Database migrations completed");
        Ok(())
    }
}

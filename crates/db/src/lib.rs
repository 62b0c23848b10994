// crates/db/src/lib.rs
//! SQLite persistence for job state.
//!
//! [`SqliteJobStore`] implements [`pagefan_core::JobStore`] on top of a
//! sqlx pool. Per-document atomicity comes from SQLite's single-writer
//! transactions: a page insert and the count that follows it run in one
//! write transaction.

mod migrations;
mod store;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;
use tracing::info;

use pagefan_core::StoreError;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("Failed to create database directory: {0}")]
    CreateDir(#[from] std::io::Error),
}

pub type DbResult<T> = Result<T, DbError>;

impl From<DbError> for StoreError {
    fn from(e: DbError) -> Self {
        match e {
            // Pool exhaustion and lock timeouts clear up on their own.
            DbError::Sqlx(sqlx::Error::PoolTimedOut) | DbError::Sqlx(sqlx::Error::PoolClosed) => {
                StoreError::Unavailable(e.to_string())
            }
            other => StoreError::Backend(Box::new(other)),
        }
    }
}

/// Job store backed by a SQLite database.
#[derive(Debug, Clone)]
pub struct SqliteJobStore {
    pool: SqlitePool,
    db_path: Option<PathBuf>,
}

impl SqliteJobStore {
    /// Open (or create) the database at the given path and run migrations.
    pub async fn open(path: &Path) -> DbResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", path.display()))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(std::time::Duration::from_secs(30));

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await?;

        let db = Self {
            pool,
            db_path: Some(path.to_owned()),
        };
        db.run_migrations().await?;

        info!("Job store opened at {}", path.display());
        Ok(db)
    }

    /// Create an in-memory database (for testing).
    ///
    /// A single connection: every pooled connection to `:memory:` would
    /// otherwise see its own empty database.
    pub async fn new_in_memory() -> DbResult<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;

        let db = Self {
            pool,
            db_path: None,
        };
        db.run_migrations().await?;
        Ok(db)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn db_path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    async fn run_migrations(&self) -> DbResult<()> {
        sqlx::query("CREATE TABLE IF NOT EXISTS _migrations (version INTEGER PRIMARY KEY)")
            .execute(&self.pool)
            .await?;

        let row: (i64,) = sqlx::query_as("SELECT COALESCE(MAX(version), 0) FROM _migrations")
            .fetch_one(&self.pool)
            .await?;
        let current_version = row.0 as usize;

        for (i, migration) in migrations::MIGRATIONS.iter().enumerate() {
            let version = i + 1; // 1-based
            if version > current_version {
                sqlx::query(migration).execute(&self.pool).await?;
                sqlx::query("INSERT INTO _migrations (version) VALUES (?)")
                    .bind(version as i64)
                    .execute(&self.pool)
                    .await?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_migrations_are_idempotent() {
        let db = SqliteJobStore::new_in_memory().await.unwrap();
        db.run_migrations().await.unwrap();

        let row: (i64,) = sqlx::query_as("SELECT MAX(version) FROM _migrations")
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_eq!(row.0 as usize, migrations::MIGRATIONS.len());
    }

    #[tokio::test]
    async fn test_open_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("jobs.db");
        let db = SqliteJobStore::open(&path).await.unwrap();
        assert!(path.exists());
        assert_eq!(db.db_path(), Some(path.as_path()));
    }

    #[test]
    fn test_pool_timeout_maps_to_unavailable() {
        let err: StoreError = DbError::Sqlx(sqlx::Error::PoolTimedOut).into();
        assert!(matches!(err, StoreError::Unavailable(_)));
        assert!(err.is_retryable());
    }
}

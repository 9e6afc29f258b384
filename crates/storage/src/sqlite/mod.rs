use std::sync::Arc;
use std::time::Duration;

use sqlx::{SqlitePool, sqlite::SqlitePoolOptions};
use thiserror::Error;

use crate::repository::Storage;

mod history_repo;
mod mapping;
mod migrate;
mod preferences_repo;
mod scenario_repo;

/// `SQLite`-backed implementation of all repository traits.
///
/// Cloning is cheap; every clone shares the same connection pool.
#[derive(Clone)]
pub struct SqliteRepository {
    pool: SqlitePool,
}

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SqliteInitError {
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

impl SqliteRepository {
    /// Open a pool against `database_url` and configure each connection
    /// for concurrent use (foreign keys on, WAL journal, busy timeout).
    ///
    /// # Errors
    ///
    /// Returns `SqliteInitError` when the database cannot be opened or the
    /// per-connection pragmas fail to apply.
    pub async fn connect(database_url: &str) -> Result<Self, SqliteInitError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(5))
            .after_connect(|conn, _meta| {
                Box::pin(async move {
                    sqlx::query("PRAGMA foreign_keys = ON;")
                        .execute(&mut *conn)
                        .await?;
                    sqlx::query("PRAGMA journal_mode = WAL;")
                        .execute(&mut *conn)
                        .await?;
                    sqlx::query("PRAGMA busy_timeout = 5000;")
                        .execute(&mut *conn)
                        .await?;
                    Ok(())
                })
            })
            .connect(database_url)
            .await?;
        Ok(Self { pool })
    }

    #[must_use]
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Bring the schema up to the current version.
    ///
    /// # Errors
    ///
    /// Returns `SqliteInitError` when a migration statement fails.
    pub async fn migrate(&self) -> Result<(), SqliteInitError> {
        migrate::run_migrations(&self.pool).await
    }
}

impl Storage {
    /// Open (and migrate) a `SQLite` database and expose it as a `Storage`
    /// bundle.
    ///
    /// # Errors
    ///
    /// Returns `SqliteInitError` when the database cannot be opened or
    /// migrated.
    pub async fn sqlite(database_url: &str) -> Result<Self, SqliteInitError> {
        let repo = SqliteRepository::connect(database_url).await?;
        repo.migrate().await?;
        let shared = Arc::new(repo);
        Ok(Self {
            scenarios: shared.clone(),
            history: shared.clone(),
            preferences: shared,
        })
    }
}

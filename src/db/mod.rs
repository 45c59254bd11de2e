//! Durable key-value storage.
//!
//! The cache persists two JSON documents per collection: the last server snapshot
//! (`{entity}_api`) and the pending-change journal (`{entity}_local`). Every value
//! carries a version so journal writers can compare-and-swap.

mod memory;
mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;

use crate::errors::CacheError;

/// A stored value and the version it was written at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredValue {
    pub value: String,
    pub version: i64,
}

/// String-keyed durable store the cache is bound to.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Read a key; `None` when it was never written.
    async fn get(&self, key: &str) -> Result<Option<StoredValue>, CacheError>;

    /// Unconditionally write a key and return its new version.
    async fn put(&self, key: &str, value: &str) -> Result<i64, CacheError>;

    /// Write only if the stored version equals `expected` (`0` = key absent).
    ///
    /// Returns [`CacheError::Conflict`] when another writer got there first.
    async fn put_if_version(&self, key: &str, value: &str, expected: i64)
        -> Result<i64, CacheError>;

    async fn remove(&self, key: &str) -> Result<(), CacheError>;
}

/// Initialize the database connection pool and run migrations.
pub async fn init_database(db_path: &Path) -> Result<SqlitePool, sqlx::Error> {
    // Ensure the parent directory exists
    if let Some(parent) = db_path.parent() {
        tokio::fs::create_dir_all(parent).await.ok();
    }

    let db_url = format!("sqlite:{}?mode=rwc", db_path.display());

    let options = SqliteConnectOptions::from_str(&db_url)?
        .create_if_missing(true)
        .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
        .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
        .busy_timeout(std::time::Duration::from_secs(30));

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    run_migrations(&pool).await?;

    Ok(pool)
}

/// Run database migrations.
async fn run_migrations(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS kv_store (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL,
            version INTEGER NOT NULL DEFAULT 1,
            updated_at TEXT NOT NULL
        );
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

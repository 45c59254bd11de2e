//! SQLite-backed key-value store.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Row, SqlitePool};

use super::{KeyValueStore, StoredValue};
use crate::errors::CacheError;

/// Durable store over a single `kv_store` table.
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn current_version(&self, key: &str) -> Result<i64, CacheError> {
        let row = sqlx::query("SELECT version FROM kv_store WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| r.get("version")).unwrap_or(0))
    }
}

#[async_trait]
impl KeyValueStore for SqliteStore {
    async fn get(&self, key: &str) -> Result<Option<StoredValue>, CacheError> {
        let row = sqlx::query("SELECT value, version FROM kv_store WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|row| StoredValue {
            value: row.get("value"),
            version: row.get("version"),
        }))
    }

    async fn put(&self, key: &str, value: &str) -> Result<i64, CacheError> {
        let now = Utc::now().to_rfc3339();
        let row = sqlx::query(
            r#"INSERT INTO kv_store (key, value, version, updated_at) VALUES (?, ?, 1, ?)
               ON CONFLICT(key) DO UPDATE SET
                   value = excluded.value,
                   version = kv_store.version + 1,
                   updated_at = excluded.updated_at
               RETURNING version"#,
        )
        .bind(key)
        .bind(value)
        .bind(&now)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.get("version"))
    }

    async fn put_if_version(
        &self,
        key: &str,
        value: &str,
        expected: i64,
    ) -> Result<i64, CacheError> {
        let now = Utc::now().to_rfc3339();

        let result = if expected == 0 {
            sqlx::query(
                "INSERT INTO kv_store (key, value, version, updated_at) VALUES (?, ?, 1, ?) ON CONFLICT(key) DO NOTHING",
            )
            .bind(key)
            .bind(value)
            .bind(&now)
            .execute(&self.pool)
            .await?
        } else {
            // Conditional UPDATE so a concurrent writer between read and write is detected
            sqlx::query(
                "UPDATE kv_store SET value = ?, version = ?, updated_at = ? WHERE key = ? AND version = ?",
            )
            .bind(value)
            .bind(expected + 1)
            .bind(&now)
            .bind(key)
            .bind(expected)
            .execute(&self.pool)
            .await?
        };

        if result.rows_affected() == 0 {
            return Err(CacheError::Conflict {
                key: key.to_string(),
                expected_version: expected,
                current_version: self.current_version(key).await?,
            });
        }

        Ok(expected + 1)
    }

    async fn remove(&self, key: &str) -> Result<(), CacheError> {
        sqlx::query("DELETE FROM kv_store WHERE key = ?")
            .bind(key)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

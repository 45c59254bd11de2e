//! In-memory key-value store for tests and throwaway sessions.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{KeyValueStore, StoredValue};
use crate::errors::CacheError;

#[derive(Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, StoredValue>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<StoredValue>, CacheError> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn put(&self, key: &str, value: &str) -> Result<i64, CacheError> {
        let mut entries = self.entries.write().await;
        let version = entries.get(key).map(|v| v.version).unwrap_or(0) + 1;
        entries.insert(
            key.to_string(),
            StoredValue {
                value: value.to_string(),
                version,
            },
        );
        Ok(version)
    }

    async fn put_if_version(
        &self,
        key: &str,
        value: &str,
        expected: i64,
    ) -> Result<i64, CacheError> {
        let mut entries = self.entries.write().await;
        let current = entries.get(key).map(|v| v.version).unwrap_or(0);
        if current != expected {
            return Err(CacheError::Conflict {
                key: key.to_string(),
                expected_version: expected,
                current_version: current,
            });
        }
        entries.insert(
            key.to_string(),
            StoredValue {
                value: value.to_string(),
                version: expected + 1,
            },
        );
        Ok(expected + 1)
    }

    async fn remove(&self, key: &str) -> Result<(), CacheError> {
        self.entries.write().await.remove(key);
        Ok(())
    }
}

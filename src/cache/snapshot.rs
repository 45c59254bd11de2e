//! Last successful server read per collection.

use std::sync::Arc;

use super::CollectionScope;
use crate::db::KeyValueStore;
use crate::errors::CacheError;
use crate::models::Entity;

/// Reads and replaces `{entity}_api` snapshots.
#[derive(Clone)]
pub struct SnapshotStore {
    store: Arc<dyn KeyValueStore>,
}

impl SnapshotStore {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Read the snapshot; absent or unreadable snapshots read as empty.
    pub async fn read<E: Entity>(&self, scope: &CollectionScope) -> Result<Vec<E>, CacheError> {
        let key = scope.snapshot_key();
        let Some(stored) = self.store.get(&key).await? else {
            return Ok(Vec::new());
        };

        match serde_json::from_str(&stored.value) {
            Ok(items) => Ok(items),
            Err(e) => {
                let err = CacheError::StorageCorruption {
                    key,
                    message: e.to_string(),
                };
                tracing::warn!("Serving empty snapshot: {}", err);
                Ok(Vec::new())
            }
        }
    }

    /// Replace the snapshot wholesale.
    pub async fn write<E: Entity>(
        &self,
        scope: &CollectionScope,
        items: &[E],
    ) -> Result<(), CacheError> {
        let key = scope.snapshot_key();
        let json = serde_json::to_string(items)?;
        let version = self.store.put(&key, &json).await?;
        tracing::debug!("Wrote snapshot {} ({} items, v{})", key, items.len(), version);
        Ok(())
    }

    /// Forget the snapshot of a scope that no longer exists.
    pub async fn clear(&self, scope: &CollectionScope) -> Result<(), CacheError> {
        self.store.remove(&scope.snapshot_key()).await
    }
}

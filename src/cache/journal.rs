//! Persisted pending-change journal.
//!
//! Every mutation is a read-modify-write of the whole `{entity}_local` document.
//! Writes are compare-and-swap on the stored version, so two pipelines interleaving
//! between read and write cannot silently drop each other's edits: the loser
//! re-reads and re-applies its operation.

use std::sync::Arc;

use super::CollectionScope;
use crate::db::KeyValueStore;
use crate::errors::CacheError;
use crate::models::{same_content, Entity, EntityId, Journal, Promotion, PruneStats};

pub const DEFAULT_JOURNAL_RETRIES: usize = 8;

#[derive(Clone)]
pub struct JournalStore {
    store: Arc<dyn KeyValueStore>,
    max_attempts: usize,
}

impl JournalStore {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self::with_retries(store, DEFAULT_JOURNAL_RETRIES)
    }

    pub fn with_retries(store: Arc<dyn KeyValueStore>, max_attempts: usize) -> Self {
        Self {
            store,
            max_attempts: max_attempts.max(1),
        }
    }

    /// Read the journal; absent or unreadable journals read as empty.
    pub async fn read<E: Entity>(
        &self,
        scope: &CollectionScope,
    ) -> Result<Journal<E>, CacheError> {
        Ok(self.read_versioned(&scope.journal_key()).await?.0)
    }

    async fn read_versioned<E: Entity>(
        &self,
        key: &str,
    ) -> Result<(Journal<E>, i64), CacheError> {
        let Some(stored) = self.store.get(key).await? else {
            return Ok((Journal::default(), 0));
        };

        match serde_json::from_str(&stored.value) {
            Ok(journal) => Ok((journal, stored.version)),
            Err(e) => {
                let err = CacheError::StorageCorruption {
                    key: key.to_string(),
                    message: e.to_string(),
                };
                // Keep the version so the next write replaces the corrupt document
                tracing::warn!("Serving empty journal: {}", err);
                Ok((Journal::default(), stored.version))
            }
        }
    }

    /// Overwrite the journal without a version check.
    pub async fn write<E: Entity>(
        &self,
        scope: &CollectionScope,
        journal: &Journal<E>,
    ) -> Result<(), CacheError> {
        let json = serde_json::to_string(journal)?;
        self.store.put(&scope.journal_key(), &json).await?;
        Ok(())
    }

    /// Apply `op` to the stored journal with compare-and-swap, retrying on conflict.
    ///
    /// `op` may run more than once and must only touch the journal it is given.
    pub async fn modify<E, R, F>(
        &self,
        scope: &CollectionScope,
        mut op: F,
    ) -> Result<R, CacheError>
    where
        E: Entity,
        R: Send,
        F: FnMut(&mut Journal<E>) -> R + Send,
    {
        let key = scope.journal_key();
        let mut last_conflict = None;

        for attempt in 1..=self.max_attempts {
            let (mut journal, version) = self.read_versioned::<E>(&key).await?;
            let before = journal.clone();
            let result = op(&mut journal);
            if journal == before {
                return Ok(result);
            }

            let json = serde_json::to_string(&journal)?;
            match self.store.put_if_version(&key, &json, version).await {
                Ok(new_version) => {
                    tracing::debug!(
                        "Journal {} now v{} ({} pending)",
                        key,
                        new_version,
                        journal.pending_count()
                    );
                    return Ok(result);
                }
                Err(conflict @ CacheError::Conflict { .. }) => {
                    tracing::debug!("Journal {} write conflict on attempt {}", key, attempt);
                    last_conflict = Some(conflict);
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_conflict.unwrap_or_else(|| {
            CacheError::Internal(format!("Journal {} was never written", key))
        }))
    }

    pub async fn record_create_local<E: Entity>(
        &self,
        scope: &CollectionScope,
        item: E,
    ) -> Result<(), CacheError> {
        self.modify(scope, |journal: &mut Journal<E>| {
            journal.record_create_local(item.clone())
        })
        .await
    }

    /// Fold a successful remote create into the journal.
    ///
    /// A creation discarded mid-flight is tombstoned under its durable ID. A durable
    /// ID some other entity already holds is never adopted. Otherwise the entry is
    /// folded if `snapshot` already holds it.
    pub async fn promote<E: Entity>(
        &self,
        scope: &CollectionScope,
        local_id: &EntityId,
        remote: &E,
        snapshot: &[E],
    ) -> Result<Promotion, CacheError> {
        let outcome = self
            .modify(scope, |journal: &mut Journal<E>| {
                let outcome = journal.promote_created(local_id, remote, snapshot);
                match outcome {
                    Promotion::Promoted => {
                        journal.fold_created_into(snapshot);
                    }
                    Promotion::Discarded => journal.record_delete(remote.id()),
                    Promotion::IdInUse => {}
                }
                outcome
            })
            .await?;

        if outcome == Promotion::IdInUse {
            tracing::warn!(
                "Backend assigned {} {} which is already taken, keeping {}",
                E::KIND,
                remote.id(),
                local_id
            );
        }
        Ok(outcome)
    }

    /// Returns false when the update targets a discarded local entity.
    pub async fn record_update<E: Entity>(
        &self,
        scope: &CollectionScope,
        item: E,
    ) -> Result<bool, CacheError> {
        self.modify(scope, |journal: &mut Journal<E>| journal.record_update(item.clone()))
            .await
    }

    /// Replace the optimistic entry with the server's copy, unless it was edited again
    /// since `sent` went out.
    pub async fn confirm_update<E: Entity>(
        &self,
        scope: &CollectionScope,
        sent: &E,
        confirmed: E,
    ) -> Result<bool, CacheError> {
        self.modify(scope, |journal: &mut Journal<E>| {
            let unchanged = journal
                .updated
                .iter()
                .chain(journal.created.iter())
                .find(|item| item.id().same_as(sent.id()))
                .is_some_and(|current| same_content(current, sent));
            if unchanged {
                journal.record_update(confirmed.clone())
            } else {
                false
            }
        })
        .await
    }

    pub async fn record_delete<E: Entity>(
        &self,
        scope: &CollectionScope,
        id: &EntityId,
    ) -> Result<(), CacheError> {
        self.modify(scope, |journal: &mut Journal<E>| journal.record_delete(id))
            .await
    }

    pub async fn prune<E: Entity>(
        &self,
        scope: &CollectionScope,
        snapshot: &[E],
    ) -> Result<PruneStats, CacheError> {
        self.modify(scope, |journal: &mut Journal<E>| journal.prune_against(snapshot))
            .await
    }
}

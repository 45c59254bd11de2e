//! Pending-change journal: local edits the last server snapshot does not reflect yet.
//!
//! All operations here are pure; persistence and concurrency live in
//! [`crate::cache::journal`].

use std::collections::HashMap;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::entity::{same_content, Entity};
use super::EntityId;

/// Created, updated and deleted entries for one collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound(serialize = "T: Serialize", deserialize = "T: DeserializeOwned"))]
pub struct Journal<T> {
    #[serde(default)]
    pub created: Vec<T>,
    #[serde(default)]
    pub updated: Vec<T>,
    #[serde(default)]
    pub deleted: Vec<EntityId>,
}

impl<T> Default for Journal<T> {
    fn default() -> Self {
        Self {
            created: Vec::new(),
            updated: Vec::new(),
            deleted: Vec::new(),
        }
    }
}

/// Outcome of folding a successful remote create back into the journal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Promotion {
    /// The local entry now carries the durable ID
    Promoted,
    /// The durable ID already belongs to another entity; the entry keeps its local ID
    IdInUse,
    /// The local entry was deleted while the create was in flight
    Discarded,
}

/// What a prune pass removed or moved.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PruneStats {
    pub deleted_dropped: usize,
    pub updated_dropped: usize,
    pub created_folded: usize,
}

impl PruneStats {
    pub fn is_empty(&self) -> bool {
        *self == PruneStats::default()
    }
}

impl<T: Entity> Journal<T> {
    pub fn is_empty(&self) -> bool {
        self.created.is_empty() && self.updated.is_empty() && self.deleted.is_empty()
    }

    pub fn pending_count(&self) -> usize {
        self.created.len() + self.updated.len() + self.deleted.len()
    }

    pub fn find_created(&self, id: &EntityId) -> Option<&T> {
        self.created.iter().find(|item| item.id().same_as(id))
    }

    /// Append an entity that carries a freshly minted local ID.
    pub fn record_create_local(&mut self, item: T) {
        self.created.push(item);
    }

    /// Rewrite a local creation to the durable ID the server assigned.
    ///
    /// The local content is kept: it may have been edited while the create was in
    /// flight and is the latest user intent. IDs are never shared: if another pending
    /// creation or a different snapshot entity already holds the durable ID, the
    /// entry stays local.
    pub fn promote_created(
        &mut self,
        local_id: &EntityId,
        remote: &T,
        snapshot: &[T],
    ) -> Promotion {
        let durable_id = remote.id();
        let in_use = self.created.iter().any(|c| c.id().same_as(durable_id))
            || snapshot
                .iter()
                .any(|s| s.id().same_as(durable_id) && !same_content(s, remote));
        if in_use {
            return Promotion::IdInUse;
        }

        match self.created.iter_mut().find(|c| c.id().same_as(local_id)) {
            Some(entry) => {
                entry.set_id(durable_id.clone());
                Promotion::Promoted
            }
            None => Promotion::Discarded,
        }
    }

    /// Record an edit.
    ///
    /// Edits to a pending creation overwrite it in place; anything else is upserted
    /// into `updated`. Returns false for a local ID with no pending creation.
    pub fn record_update(&mut self, item: T) -> bool {
        if let Some(entry) = self.created.iter_mut().find(|c| c.id().same_as(item.id())) {
            *entry = item;
            return true;
        }
        if item.id().is_local() {
            return false;
        }
        match self.updated.iter_mut().find(|u| u.id().same_as(item.id())) {
            Some(entry) => *entry = item,
            None => self.updated.push(item),
        }
        true
    }

    /// Record a deletion. Local IDs vanish from the journal; durable IDs are tombstoned.
    pub fn record_delete(&mut self, id: &EntityId) {
        self.created.retain(|c| !c.id().same_as(id));
        self.updated.retain(|u| !u.id().same_as(id));
        if id.is_durable() && !self.deleted.iter().any(|d| d.same_as(id)) {
            self.deleted.push(id.clone());
        }
    }

    /// Fold promoted creations the snapshot already holds.
    ///
    /// Identical entries are dropped; edited ones become `updated` overrides.
    pub fn fold_created_into(&mut self, snapshot: &[T]) -> usize {
        let held: HashMap<&EntityId, &T> = snapshot.iter().map(|item| (item.id(), item)).collect();
        let mut folded = 0;
        let mut remaining = Vec::with_capacity(self.created.len());
        for item in std::mem::take(&mut self.created) {
            match held.get(item.id()) {
                Some(server) if item.id().is_durable() => {
                    folded += 1;
                    if !same_content(*server, &item) {
                        match self.updated.iter_mut().find(|u| u.id().same_as(item.id())) {
                            Some(entry) => *entry = item,
                            None => self.updated.push(item),
                        }
                    }
                }
                _ => remaining.push(item),
            }
        }
        self.created = remaining;
        folded
    }

    /// Drop entries a fresh snapshot already reflects.
    pub fn prune_against(&mut self, snapshot: &[T]) -> PruneStats {
        let created_folded = self.fold_created_into(snapshot);
        let held: HashMap<&EntityId, &T> = snapshot.iter().map(|item| (item.id(), item)).collect();

        let before = self.deleted.len();
        self.deleted.retain(|id| held.contains_key(id));
        let deleted_dropped = before - self.deleted.len();

        let before = self.updated.len();
        self.updated.retain(|item| match held.get(item.id()) {
            Some(server) => !same_content(*server, item),
            None => false,
        });
        let updated_dropped = before - self.updated.len();

        PruneStats {
            deleted_dropped,
            updated_dropped,
            created_folded,
        }
    }
}

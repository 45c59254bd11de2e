//! Offline-tolerant collection cache.
//!
//! Each collection keeps the last server snapshot plus a journal of local edits the
//! snapshot does not reflect yet. Reads merge the two; writes land in the journal
//! first and are then pushed to the backend.

mod engine;
mod invalidation;
mod journal;
pub mod reconcile;
mod snapshot;

pub use engine::CollectionCache;
pub use invalidation::{Invalidation, Invalidations};
pub use journal::{JournalStore, DEFAULT_JOURNAL_RETRIES};
pub use reconcile::reconcile;
pub use snapshot::SnapshotStore;

use std::fmt;
use std::sync::Arc;

use tokio::sync::broadcast;

use crate::api::{HttpTransport, Transport};
use crate::config::Config;
use crate::db::{self, KeyValueStore, SqliteStore};
use crate::errors::CacheError;
use crate::models::{Annotation, Category, EntityId, EntityKind, Image, LocalIdGenerator};

/// Identifies one cached collection: a kind, optionally nested under a parent entity.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CollectionScope {
    pub kind: EntityKind,
    pub parent: Option<EntityId>,
}

impl CollectionScope {
    pub fn all(kind: EntityKind) -> Self {
        Self { kind, parent: None }
    }

    pub fn nested(kind: EntityKind, parent: EntityId) -> Self {
        Self {
            kind,
            parent: Some(parent),
        }
    }

    fn key_prefix(&self) -> String {
        match &self.parent {
            Some(parent) => format!("{}_{}", self.kind, parent.normalized()),
            None => self.kind.to_string(),
        }
    }

    /// Key of the last server snapshot.
    pub fn snapshot_key(&self) -> String {
        format!("{}_api", self.key_prefix())
    }

    /// Key of the pending-change journal.
    pub fn journal_key(&self) -> String {
        format!("{}_local", self.key_prefix())
    }

    /// Route listing this collection.
    pub fn list_path(&self) -> String {
        match (&self.parent, self.kind.parent()) {
            (Some(parent), Some(parent_kind)) => {
                format!("{}/{}", parent_kind.item_path(parent), self.kind)
            }
            _ => self.kind.collection_path(),
        }
    }
}

impl fmt::Display for CollectionScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.parent {
            Some(parent) => write!(f, "{} of {}", self.kind, parent),
            None => write!(f, "{}", self.kind),
        }
    }
}

/// Handles shared by every collection of one cache.
#[derive(Clone)]
pub(crate) struct CacheContext {
    pub(crate) transport: Arc<dyn Transport>,
    pub(crate) snapshots: SnapshotStore,
    pub(crate) journals: JournalStore,
    pub(crate) ids: Arc<LocalIdGenerator>,
    pub(crate) invalidations: Invalidations,
}

/// Entry point: binds a durable store and a transport, hands out per-collection caches.
#[derive(Clone)]
pub struct GalleryCache {
    ctx: CacheContext,
    store: Arc<dyn KeyValueStore>,
}

impl GalleryCache {
    pub fn new(store: Arc<dyn KeyValueStore>, transport: Arc<dyn Transport>) -> Self {
        Self {
            ctx: CacheContext {
                transport,
                snapshots: SnapshotStore::new(store.clone()),
                journals: JournalStore::new(store.clone()),
                ids: Arc::new(LocalIdGenerator::new()),
                invalidations: Invalidations::new(),
            },
            store,
        }
    }

    /// Override how many compare-and-swap attempts a journal mutation gets.
    pub fn with_journal_retries(mut self, attempts: usize) -> Self {
        self.ctx.journals = JournalStore::with_retries(self.store.clone(), attempts);
        self
    }

    /// Open the SQLite store and HTTP transport described by `config`.
    pub async fn from_config(config: &Config) -> Result<Self, CacheError> {
        let pool = db::init_database(&config.db_path).await?;
        let store = Arc::new(SqliteStore::new(pool));
        let transport = Arc::new(HttpTransport::new(&config.api_url, config.http_timeout)?);

        tracing::info!("Cache bound to {:?}, backend {}", config.db_path, config.api_url);
        Ok(Self::new(store, transport).with_journal_retries(config.journal_retries))
    }

    pub fn categories(&self) -> CollectionCache<Category> {
        CollectionCache::new(self.ctx.clone(), CollectionScope::all(EntityKind::Categories))
    }

    pub fn images(&self) -> CollectionCache<Image> {
        CollectionCache::new(self.ctx.clone(), CollectionScope::all(EntityKind::Images))
    }

    /// Annotations drawn on one image.
    pub fn annotations(&self, image_id: &EntityId) -> CollectionCache<Annotation> {
        CollectionCache::new(
            self.ctx.clone(),
            CollectionScope::nested(EntityKind::Annotations, image_id.clone()),
        )
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Invalidation> {
        self.ctx.invalidations.subscribe()
    }

    /// Mark a collection stale without changing it.
    pub fn invalidate(&self, scope: &CollectionScope) {
        self.ctx.invalidations.notify(scope);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scope_keys() {
        let images = CollectionScope::all(EntityKind::Images);
        assert_eq!(images.snapshot_key(), "images_api");
        assert_eq!(images.journal_key(), "images_local");
        assert_eq!(images.list_path(), "/images");

        let annotations = CollectionScope::nested(EntityKind::Annotations, EntityId::text("7"));
        assert_eq!(annotations.snapshot_key(), "annotations_7_api");
        assert_eq!(annotations.journal_key(), "annotations_7_local");
        assert_eq!(annotations.list_path(), "/images/7/annotations");
    }

    #[test]
    fn test_nested_scopes_equal_across_id_forms() {
        assert_eq!(
            CollectionScope::nested(EntityKind::Annotations, EntityId::number(7)),
            CollectionScope::nested(EntityKind::Annotations, EntityId::text("7")),
        );
    }
}

//! Fetch-and-refresh and mutation pipelines, generic over the entity type.

use std::marker::PhantomData;

use serde_json::Value;

use super::reconcile::{attach_categories, reconcile, refresh_categories};
use super::{CacheContext, CollectionScope};
use crate::errors::CacheError;
use crate::models::{Annotation, Category, Entity, EntityId, EntityKind, Journal, Promotion};

/// One cached collection: categories, images, or the annotations of one image.
#[derive(Clone)]
pub struct CollectionCache<E> {
    ctx: CacheContext,
    scope: CollectionScope,
    _entity: PhantomData<fn() -> E>,
}

impl<E: Entity> CollectionCache<E> {
    pub(crate) fn new(ctx: CacheContext, scope: CollectionScope) -> Self {
        Self {
            ctx,
            scope,
            _entity: PhantomData,
        }
    }

    pub fn scope(&self) -> &CollectionScope {
        &self.scope
    }

    /// Refresh the snapshot from the backend and return the reconciled view.
    ///
    /// Transport failures are logged and the last good snapshot is served instead.
    pub async fn fetch(&self) -> Result<Vec<E>, CacheError> {
        match self.fetch_remote().await {
            Ok(items) => {
                self.ctx.snapshots.write(&self.scope, &items).await?;
                match self.ctx.journals.prune(&self.scope, &items).await {
                    Ok(stats) if !stats.is_empty() => {
                        tracing::debug!("Pruned {} journal: {:?}", self.scope, stats)
                    }
                    Ok(_) => {}
                    Err(e) => tracing::warn!("Skipped pruning {} journal: {}", self.scope, e),
                }
                tracing::info!("Fetched {} {}", items.len(), self.scope);
            }
            Err(e) => {
                tracing::warn!("Fetching {} failed, serving cache: {}", self.scope, e);
            }
        }

        self.view().await
    }

    /// Reconciled view from local storage only.
    pub async fn view(&self) -> Result<Vec<E>, CacheError> {
        let snapshot = self.ctx.snapshots.read::<E>(&self.scope).await?;
        let journal = self.ctx.journals.read::<E>(&self.scope).await?;
        let mut items = reconcile(&snapshot, &journal);

        if E::KIND.resolves_category() {
            let categories = self.category_view().await?;
            refresh_categories(&mut items, &categories);
        }
        Ok(items)
    }

    /// Local changes not yet reflected by the snapshot.
    pub async fn pending(&self) -> Result<Journal<E>, CacheError> {
        self.ctx.journals.read(&self.scope).await
    }

    /// Read a single entity straight from the backend.
    ///
    /// Local IDs never reached the server and are answered from the journal.
    pub async fn fetch_by_id(&self, id: &EntityId) -> Result<E, CacheError> {
        if id.is_local() {
            let journal = self.pending().await?;
            let mut item = journal
                .find_created(id)
                .cloned()
                .ok_or_else(|| self.not_found(id))?;
            if E::KIND.resolves_category() {
                let categories = self.category_view().await?;
                refresh_categories(std::slice::from_mut(&mut item), &categories);
            }
            return Ok(item);
        }

        let value = match self.ctx.transport.get(&E::KIND.item_path(id)).await {
            Ok(value) => value,
            Err(e) if e.is_not_found() => return Err(self.not_found(id)),
            Err(e) => return Err(e.into()),
        };
        let mut item: E = serde_json::from_value(value)?;
        self.resolve_category(&mut item).await;
        Ok(item)
    }

    /// Record a new entity locally, then push it to the backend.
    ///
    /// The local entry is visible to reads as soon as the journal write lands. If the
    /// POST fails it stays pending and the transport error is returned. Entities nested
    /// under a parent that only exists locally are held back until the parent is pushed.
    pub async fn create(&self, draft: E::Draft) -> Result<E, CacheError> {
        let local_id = self.ctx.ids.mint();
        let item = E::from_draft(local_id.clone(), draft)?;
        self.check_parent(&item)?;

        self.ctx
            .journals
            .record_create_local(&self.scope, item.clone())
            .await?;
        tracing::debug!("Recorded {} {} locally", E::KIND, local_id);

        if let Some(parent) = self.scope.parent.as_ref().filter(|p| p.is_local()) {
            tracing::debug!("Holding {} {} until {} is created", E::KIND, local_id, parent);
            self.ctx.invalidations.notify(&self.scope);
            return Ok(item);
        }

        let (created, outcome) = self.push_created(item).await?;

        if outcome == Promotion::Promoted && EntityKind::Annotations.parent() == Some(E::KIND) {
            let children: CollectionCache<Annotation> = CollectionCache::new(
                self.ctx.clone(),
                CollectionScope::nested(EntityKind::Annotations, local_id),
            );
            if let Err(e) = children.adopt(created.id()).await {
                tracing::warn!("Could not move {} to {}: {}", children.scope, created.id(), e);
            }
        }
        Ok(created)
    }

    /// POST a pending creation and fold the server's answer into the journal.
    async fn push_created(&self, item: E) -> Result<(E, Promotion), CacheError> {
        let local_id = item.id().clone();
        let mut body = Self::payload(&item)?;
        if let Value::Object(fields) = &mut body {
            fields.remove("id");
        }

        let response = match self.ctx.transport.post(&E::KIND.collection_path(), &body).await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!("Creating {} failed, kept {} pending: {}", E::KIND, local_id, e);
                return Err(e.into());
            }
        };
        let remote: E = serde_json::from_value(response)?;
        tracing::info!("Created {} {} (was {})", E::KIND, remote.id(), local_id);

        let snapshot = self.ctx.snapshots.read::<E>(&self.scope).await?;
        let outcome = self
            .ctx
            .journals
            .promote(&self.scope, &local_id, &remote, &snapshot)
            .await?;

        let mut created = match outcome {
            Promotion::Promoted => remote,
            Promotion::IdInUse => item,
            Promotion::Discarded => {
                // Deleted locally while the POST was in flight
                let path = E::KIND.item_path(remote.id());
                if let Err(e) = self.ctx.transport.delete(&path).await {
                    tracing::warn!(
                        "Failed to delete discarded {} {}: {}",
                        E::KIND,
                        remote.id(),
                        e
                    );
                }
                remote
            }
        };

        self.resolve_category(&mut created).await;
        self.ctx.invalidations.notify(&self.scope);
        Ok((created, outcome))
    }

    /// Move the pending creations of this nested collection under the parent's
    /// durable ID and push them. Returns how many were moved.
    pub(crate) async fn adopt(&self, parent: &EntityId) -> Result<usize, CacheError> {
        let moved = self
            .ctx
            .journals
            .modify(&self.scope, |journal: &mut Journal<E>| {
                std::mem::take(&mut journal.created)
            })
            .await?;
        self.ctx.snapshots.clear(&self.scope).await?;
        if moved.is_empty() {
            return Ok(0);
        }

        let scope = CollectionScope::nested(E::KIND, parent.clone());
        let target = Self::new(self.ctx.clone(), scope);
        let count = moved.len();
        for mut item in moved {
            item.set_parent_id(parent.clone());
            target
                .ctx
                .journals
                .record_create_local(&target.scope, item.clone())
                .await?;
            // A failed push leaves the entry pending under the new scope
            let _ = target.push_created(item).await;
        }

        tracing::info!(
            "Moved {} pending {} from {} to {}",
            count,
            E::KIND,
            self.scope,
            target.scope
        );
        target.ctx.invalidations.notify(&target.scope);
        Ok(count)
    }

    /// Apply an edit locally, then push it to the backend.
    ///
    /// Pending creations are edited in place and never sent as updates.
    pub async fn update(&self, item: E) -> Result<E, CacheError> {
        if !E::KIND.supports_update() {
            return Err(CacheError::Validation(format!(
                "{} cannot be edited, delete and redraw instead",
                E::KIND
            )));
        }
        item.validate()?;
        self.check_parent(&item)?;

        let recorded = self
            .ctx
            .journals
            .record_update(&self.scope, item.clone())
            .await?;
        if !recorded {
            return Err(self.not_found(item.id()));
        }

        if item.id().is_local() {
            tracing::debug!("Edited pending {} {}", E::KIND, item.id());
            self.ctx.invalidations.notify(&self.scope);
            return Ok(item);
        }

        let body = Self::payload(&item)?;
        let response = self
            .ctx
            .transport
            .put(&E::KIND.item_path(item.id()), &body)
            .await?;

        let mut confirmed: E = serde_json::from_value(response).unwrap_or_else(|e| {
            tracing::debug!("Update of {} {} echoed no entity: {}", E::KIND, item.id(), e);
            let mut sent = item.clone();
            sent.detach_relations();
            sent
        });
        self.ctx
            .journals
            .confirm_update(&self.scope, &item, confirmed.clone())
            .await?;

        self.resolve_category(&mut confirmed).await;
        tracing::info!("Updated {} {}", E::KIND, item.id());
        self.ctx.invalidations.notify(&self.scope);
        Ok(confirmed)
    }

    /// Remove an entity locally, then on the backend if it ever reached it.
    pub async fn delete(&self, id: &EntityId) -> Result<(), CacheError> {
        self.ctx.journals.record_delete::<E>(&self.scope, id).await?;

        if id.is_local() {
            tracing::debug!("Dropped pending {} {}", E::KIND, id);
            self.ctx.invalidations.notify(&self.scope);
            return Ok(());
        }

        match self.ctx.transport.delete(&E::KIND.item_path(id)).await {
            Ok(()) => {}
            Err(e) if e.is_not_found() => {
                tracing::debug!("{} {} already gone on the backend", E::KIND, id);
            }
            Err(e) => return Err(e.into()),
        }

        tracing::info!("Deleted {} {}", E::KIND, id);
        self.ctx.invalidations.notify(&self.scope);
        Ok(())
    }

    async fn fetch_remote(&self) -> Result<Vec<E>, CacheError> {
        let mut items = self.list_remote().await?;

        if E::KIND.resolves_category() {
            let path = EntityKind::Categories.collection_path();
            let categories: Vec<Category> =
                serde_json::from_value(self.ctx.transport.get(&path).await?)?;
            attach_categories(&mut items, &categories);
        }
        Ok(items)
    }

    async fn list_remote(&self) -> Result<Vec<E>, CacheError> {
        let transport = &self.ctx.transport;
        let Some(parent) = &self.scope.parent else {
            return Ok(serde_json::from_value(transport.get(&self.scope.list_path()).await?)?);
        };

        match transport.get(&self.scope.list_path()).await {
            Ok(value) => Ok(serde_json::from_value(value)?),
            Err(e) => {
                tracing::warn!(
                    "Nested route for {} failed ({}), filtering all {}",
                    self.scope,
                    e,
                    E::KIND
                );
                let all: Vec<E> =
                    serde_json::from_value(transport.get(&E::KIND.collection_path()).await?)?;
                Ok(all
                    .into_iter()
                    .filter(|item| item.parent_id().is_some_and(|p| p.same_as(parent)))
                    .collect())
            }
        }
    }

    async fn category_view(&self) -> Result<Vec<Category>, CacheError> {
        let scope = CollectionScope::all(EntityKind::Categories);
        let snapshot = self.ctx.snapshots.read::<Category>(&scope).await?;
        let journal = self.ctx.journals.read::<Category>(&scope).await?;
        Ok(reconcile(&snapshot, &journal))
    }

    /// Best-effort category lookup; failures leave the relation unset.
    async fn resolve_category(&self, item: &mut E) {
        let Some(category_id) = item.category_id().cloned() else {
            return;
        };

        if category_id.is_local() {
            if let Ok(categories) = self.category_view().await {
                refresh_categories(std::slice::from_mut(item), &categories);
            }
            return;
        }

        let path = EntityKind::Categories.item_path(&category_id);
        match self.ctx.transport.get(&path).await {
            Ok(value) => match serde_json::from_value::<Category>(value) {
                Ok(category) => item.attach_category(Some(category)),
                Err(e) => tracing::warn!("Unreadable category {}: {}", category_id, e),
            },
            Err(e) => tracing::warn!("Could not resolve category {}: {}", category_id, e),
        }
    }

    fn check_parent(&self, item: &E) -> Result<(), CacheError> {
        match (&self.scope.parent, item.parent_id()) {
            (Some(expected), Some(actual)) if !actual.same_as(expected) => {
                Err(CacheError::Validation(format!(
                    "{} belongs to {}, not {}",
                    E::KIND,
                    actual,
                    expected
                )))
            }
            _ => Ok(()),
        }
    }

    fn payload(item: &E) -> Result<Value, CacheError> {
        let mut item = item.clone();
        item.detach_relations();
        Ok(serde_json::to_value(&item)?)
    }

    fn not_found(&self, id: &EntityId) -> CacheError {
        CacheError::NotFound(format!("{} {} not found", E::KIND, id))
    }
}

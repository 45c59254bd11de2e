//! Entity-type descriptor shared by every cached collection.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::{Category, EntityId};
use crate::errors::CacheError;

/// The collections the cache knows how to hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Categories,
    Images,
    Annotations,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Categories => "categories",
            EntityKind::Images => "images",
            EntityKind::Annotations => "annotations",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "categories" | "category" => Some(EntityKind::Categories),
            "images" | "image" => Some(EntityKind::Images),
            "annotations" | "annotation" => Some(EntityKind::Annotations),
            _ => None,
        }
    }

    /// Collection route relative to the API base URL.
    pub fn collection_path(&self) -> String {
        format!("/{}", self.as_str())
    }

    pub fn item_path(&self, id: &EntityId) -> String {
        format!("/{}/{}", self.as_str(), id)
    }

    /// Whether fetched items get their category resolved and attached.
    pub fn resolves_category(&self) -> bool {
        matches!(self, EntityKind::Images)
    }

    /// Whether the backend accepts `PUT` on single items. Annotations are only ever
    /// drawn or erased.
    pub fn supports_update(&self) -> bool {
        !matches!(self, EntityKind::Annotations)
    }

    /// Collection this kind is nested under on the backend, if any.
    pub fn parent(&self) -> Option<EntityKind> {
        match self {
            EntityKind::Annotations => Some(EntityKind::Images),
            _ => None,
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A cacheable entity type.
///
/// One implementation per collection; the engine in [`crate::cache`] is generic over it.
pub trait Entity:
    Clone + PartialEq + std::fmt::Debug + Serialize + DeserializeOwned + Send + Sync + 'static
{
    /// Fields supplied by the caller when creating an entity.
    type Draft: Send;

    const KIND: EntityKind;

    fn id(&self) -> &EntityId;

    fn set_id(&mut self, id: EntityId);

    /// Build a new entity from a draft, rejecting invalid input.
    fn from_draft(id: EntityId, draft: Self::Draft) -> Result<Self, CacheError>;

    /// Check an edited entity before it enters the journal.
    fn validate(&self) -> Result<(), CacheError> {
        Ok(())
    }

    fn category_id(&self) -> Option<&EntityId> {
        None
    }

    fn attach_category(&mut self, _category: Option<Category>) {}

    /// ID of the owning entity for nested collections.
    fn parent_id(&self) -> Option<&EntityId> {
        None
    }

    fn set_parent_id(&mut self, _parent: EntityId) {}

    /// Strip read-time relations that are never sent to the server.
    fn detach_relations(&mut self) {}
}

/// Compare two entities ignoring derived relations.
pub fn same_content<E: Entity>(a: &E, b: &E) -> bool {
    let mut a = a.clone();
    let mut b = b.clone();
    a.detach_relations();
    b.detach_relations();
    a == b
}

/// Reject blank names the way the entry forms do.
pub(crate) fn require_name(kind: EntityKind, name: &str) -> Result<(), CacheError> {
    if name.trim().is_empty() {
        return Err(CacheError::Validation(format!(
            "{} name is required",
            match kind {
                EntityKind::Categories => "Category",
                EntityKind::Images => "Image",
                EntityKind::Annotations => "Annotation",
            }
        )));
    }
    Ok(())
}

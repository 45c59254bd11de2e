//! Category model matching the backend category resource.

use serde::{Deserialize, Serialize};

use super::entity::{require_name, Entity, EntityKind};
use super::EntityId;
use crate::errors::CacheError;

/// A named bucket images are filed under.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: EntityId,
    pub name: String,
}

/// Fields for creating a new category.
#[derive(Debug, Clone, Deserialize)]
pub struct NewCategory {
    pub name: String,
}

impl NewCategory {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl Entity for Category {
    type Draft = NewCategory;

    const KIND: EntityKind = EntityKind::Categories;

    fn id(&self) -> &EntityId {
        &self.id
    }

    fn set_id(&mut self, id: EntityId) {
        self.id = id;
    }

    fn from_draft(id: EntityId, draft: NewCategory) -> Result<Self, CacheError> {
        require_name(Self::KIND, &draft.name)?;
        Ok(Category {
            id,
            name: draft.name,
        })
    }

    fn validate(&self) -> Result<(), CacheError> {
        require_name(Self::KIND, &self.name)
    }
}

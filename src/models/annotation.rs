//! Annotation model: a colored rectangle drawn over an image.

use serde::{Deserialize, Serialize};

use super::entity::{Entity, EntityKind};
use super::EntityId;
use crate::errors::CacheError;

/// Boxes this small or smaller on either side are treated as stray clicks.
pub const MIN_ANNOTATION_SIDE: f64 = 5.0;

/// Axis-aligned rectangle in image pixel space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    /// Normalize a pointer drag that may run in any direction.
    pub fn from_drag(start: (f64, f64), end: (f64, f64)) -> Self {
        Rect {
            x: start.0.min(end.0),
            y: start.1.min(end.1),
            width: (end.0 - start.0).abs(),
            height: (end.1 - start.1).abs(),
        }
    }

    pub fn is_drawable(&self) -> bool {
        self.width > MIN_ANNOTATION_SIDE && self.height > MIN_ANNOTATION_SIDE
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Annotation {
    pub id: EntityId,
    pub image_id: EntityId,
    #[serde(flatten)]
    pub rect: Rect,
    pub color: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

/// Fields for drawing a new annotation.
#[derive(Debug, Clone)]
pub struct NewAnnotation {
    pub image_id: EntityId,
    pub rect: Rect,
    pub color: String,
    pub label: Option<String>,
}

impl Entity for Annotation {
    type Draft = NewAnnotation;

    const KIND: EntityKind = EntityKind::Annotations;

    fn id(&self) -> &EntityId {
        &self.id
    }

    fn set_id(&mut self, id: EntityId) {
        self.id = id;
    }

    fn from_draft(id: EntityId, draft: NewAnnotation) -> Result<Self, CacheError> {
        let annotation = Annotation {
            id,
            image_id: draft.image_id,
            rect: draft.rect,
            color: draft.color,
            label: draft.label,
        };
        annotation.validate()?;
        Ok(annotation)
    }

    fn validate(&self) -> Result<(), CacheError> {
        if !self.rect.is_drawable() {
            return Err(CacheError::Validation(format!(
                "Annotation must be larger than {}x{}",
                MIN_ANNOTATION_SIDE, MIN_ANNOTATION_SIDE
            )));
        }
        Ok(())
    }

    fn parent_id(&self) -> Option<&EntityId> {
        Some(&self.image_id)
    }

    fn set_parent_id(&mut self, parent: EntityId) {
        self.image_id = parent;
    }
}

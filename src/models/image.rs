//! Image model matching the backend image resource.

use chrono::Utc;
use serde::{Deserialize, Serialize};

use super::entity::{require_name, Entity, EntityKind};
use super::{Category, EntityId};
use crate::errors::CacheError;

/// File facts reported at upload time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ImageMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolution: Option<String>,
}

/// An uploaded image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Image {
    pub id: EntityId,
    pub name: String,
    pub category_id: EntityId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upload_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<ImageMetadata>,
    /// Resolved from `category_id` at read time; never sent to the server
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<Category>,
}

/// Fields for uploading a new image.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewImage {
    pub name: String,
    pub category_id: EntityId,
    pub url: String,
    #[serde(default)]
    pub metadata: Option<ImageMetadata>,
}

impl Entity for Image {
    type Draft = NewImage;

    const KIND: EntityKind = EntityKind::Images;

    fn id(&self) -> &EntityId {
        &self.id
    }

    fn set_id(&mut self, id: EntityId) {
        self.id = id;
    }

    fn from_draft(id: EntityId, draft: NewImage) -> Result<Self, CacheError> {
        require_name(Self::KIND, &draft.name)?;
        if draft.category_id.normalized().trim().is_empty() {
            return Err(CacheError::Validation("Category is required".to_string()));
        }
        Ok(Image {
            id,
            name: draft.name,
            category_id: draft.category_id,
            url: Some(draft.url),
            upload_date: Some(Utc::now().to_rfc3339()),
            metadata: draft.metadata,
            category: None,
        })
    }

    fn validate(&self) -> Result<(), CacheError> {
        require_name(Self::KIND, &self.name)
    }

    fn category_id(&self) -> Option<&EntityId> {
        Some(&self.category_id)
    }

    fn attach_category(&mut self, category: Option<Category>) {
        self.category = category;
    }

    fn detach_relations(&mut self) {
        self.category = None;
    }
}

/// Gallery filter: name substring and category.
#[derive(Debug, Clone, Default)]
pub struct ImageFilter {
    pub search_term: Option<String>,
    pub category_id: Option<EntityId>,
}

impl ImageFilter {
    pub fn matches(&self, image: &Image) -> bool {
        let name_match = match self.search_term.as_deref().map(str::trim) {
            Some(term) if !term.is_empty() => {
                image.name.to_lowercase().contains(&term.to_lowercase())
            }
            _ => true,
        };
        let category_match = match &self.category_id {
            Some(id) => image.category_id.same_as(id),
            None => true,
        };
        name_match && category_match
    }

    pub fn apply<'a>(&self, images: &'a [Image]) -> Vec<&'a Image> {
        images.iter().filter(|image| self.matches(image)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image(id: i64, name: &str, category_id: EntityId) -> Image {
        Image {
            id: EntityId::number(id),
            name: name.to_string(),
            category_id,
            url: None,
            upload_date: None,
            metadata: None,
            category: None,
        }
    }

    #[test]
    fn test_filter_by_name_is_case_insensitive() {
        let images = vec![
            image(1, "Sunset Beach", EntityId::number(1)),
            image(2, "Mountain", EntityId::number(1)),
        ];
        let filter = ImageFilter {
            search_term: Some("beach".to_string()),
            category_id: None,
        };
        let matched = filter.apply(&images);
        assert_eq!(matched.len(), 1);
        assert_eq!(matched[0].name, "Sunset Beach");
    }

    #[test]
    fn test_filter_by_category_tolerates_string_ids() {
        let images = vec![
            image(1, "a", EntityId::text("2")),
            image(2, "b", EntityId::number(3)),
        ];
        let filter = ImageFilter {
            search_term: None,
            category_id: Some(EntityId::number(2)),
        };
        let matched = filter.apply(&images);
        assert_eq!(matched.len(), 1);
        assert_eq!(matched[0].id, EntityId::number(1));
    }

    #[test]
    fn test_category_is_not_part_of_server_payload() {
        let mut img = image(1, "a", EntityId::number(2));
        img.attach_category(Some(Category {
            id: EntityId::number(2),
            name: "Cats".to_string(),
        }));
        img.detach_relations();
        let json = serde_json::to_value(&img).unwrap();
        assert!(json.get("category").is_none());
        assert_eq!(json["categoryId"], 2);
    }

    #[test]
    fn test_blank_name_is_rejected() {
        let draft = NewImage {
            name: "  ".to_string(),
            category_id: EntityId::number(1),
            url: "https://example.com/a.png".to_string(),
            metadata: None,
        };
        assert!(matches!(
            Image::from_draft(EntityId::text("local-1"), draft),
            Err(CacheError::Validation(_))
        ));
    }
}

//! Snapshot + journal merge.

use std::collections::{HashMap, HashSet};

use crate::models::{Category, Entity, EntityId, Journal};

/// Merge the last server snapshot with pending local changes.
///
/// Snapshot order is preserved for surviving items (tombstoned IDs removed, edited
/// items substituted) and pending creations are appended in journal order.
pub fn reconcile<E: Entity>(snapshot: &[E], journal: &Journal<E>) -> Vec<E> {
    let deleted: HashSet<&EntityId> = journal.deleted.iter().collect();
    let updated: HashMap<&EntityId, &E> = journal.updated.iter().map(|u| (u.id(), u)).collect();

    snapshot
        .iter()
        .filter(|item| !deleted.contains(item.id()))
        .map(|item| updated.get(item.id()).copied().unwrap_or(item).clone())
        .chain(journal.created.iter().cloned())
        .collect()
}

/// Attach each item's category from `categories`; unmatched items get `None`.
pub fn attach_categories<E: Entity>(items: &mut [E], categories: &[Category]) {
    let by_id: HashMap<&EntityId, &Category> = categories.iter().map(|c| (&c.id, c)).collect();
    for item in items.iter_mut() {
        let Some(category_id) = item.category_id().cloned() else {
            continue;
        };
        item.attach_category(by_id.get(&category_id).map(|c| (*c).clone()));
    }
}

/// Re-resolve categories against the local category view, keeping the existing
/// relation when the category is not known locally.
pub fn refresh_categories<E: Entity>(items: &mut [E], categories: &[Category]) {
    let by_id: HashMap<&EntityId, &Category> = categories.iter().map(|c| (&c.id, c)).collect();
    for item in items.iter_mut() {
        let Some(category_id) = item.category_id().cloned() else {
            continue;
        };
        if let Some(category) = by_id.get(&category_id) {
            item.attach_category(Some((*category).clone()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Image;

    fn cat(id: &str, name: &str) -> Category {
        Category {
            id: id.parse().unwrap(),
            name: name.to_string(),
        }
    }

    fn snapshot() -> Vec<Category> {
        vec![cat("1", "Cats"), cat("2", "Dogs")]
    }

    fn journal() -> Journal<Category> {
        Journal {
            created: vec![cat("local-99", "Birds")],
            updated: vec![cat("2", "Puppies")],
            deleted: vec![EntityId::number(1)],
        }
    }

    #[test]
    fn test_reconcile_scenario() {
        let view = reconcile(&snapshot(), &journal());
        assert_eq!(view, vec![cat("2", "Puppies"), cat("local-99", "Birds")]);
    }

    #[test]
    fn test_reconcile_is_idempotent_once_folded() {
        let view = reconcile(&snapshot(), &journal());
        assert_eq!(reconcile(&view, &Journal::default()), view);
    }

    #[test]
    fn test_deleted_ids_never_appear() {
        let mut journal = journal();
        journal.deleted.push(EntityId::text("2"));
        let view = reconcile(&snapshot(), &journal);
        assert!(view
            .iter()
            .all(|c| !journal.deleted.iter().any(|d| d.same_as(&c.id))));
    }

    #[test]
    fn test_updates_win_over_snapshot_with_mixed_id_types() {
        let snapshot = vec![Category {
            id: EntityId::text("2"),
            name: "Dogs".to_string(),
        }];
        let journal = Journal {
            created: vec![],
            updated: vec![cat("2", "Puppies")],
            deleted: vec![],
        };
        assert_eq!(reconcile(&snapshot, &journal)[0].name, "Puppies");
    }

    #[test]
    fn test_created_appended_once_in_order() {
        let journal = Journal {
            created: vec![cat("local-1", "A"), cat("local-2", "B"), cat("local-3", "C")],
            updated: vec![],
            deleted: vec![],
        };
        let view = reconcile(&snapshot(), &journal);
        let names: Vec<&str> = view.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Cats", "Dogs", "A", "B", "C"]);
    }

    #[test]
    fn test_updates_for_missing_ids_are_not_injected() {
        let journal = Journal {
            created: vec![],
            updated: vec![cat("7", "Orphan")],
            deleted: vec![],
        };
        assert_eq!(reconcile(&snapshot(), &journal), snapshot());
    }

    #[test]
    fn test_attach_categories_matches_string_ids() {
        let mut images = vec![Image {
            id: EntityId::number(1),
            name: "a".to_string(),
            category_id: EntityId::text("2"),
            url: None,
            upload_date: None,
            metadata: None,
            category: None,
        }];
        attach_categories(&mut images, &snapshot());
        assert_eq!(images[0].category, Some(cat("2", "Dogs")));

        refresh_categories(&mut images, &[]);
        assert_eq!(images[0].category, Some(cat("2", "Dogs")));

        attach_categories(&mut images, &[]);
        assert!(images[0].category.is_none());
    }
}

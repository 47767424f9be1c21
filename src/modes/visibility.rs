use std::collections::BTreeSet;

use crate::geometry::{CategoryFilter, FragmentStore, GeometryIndex};

const CATEGORY_ENTITIES: [(&str, &str); 5] = [
    ("IfcWall", "IFCWALLSTANDARDCASE"),
    ("IfcWindow", "IFCWINDOW"),
    ("IfcSlab", "IFCSLAB"),
    ("IfcColumn", "IFCCOLUMN"),
    ("IfcBeam", "IFCBEAM"),
];

/// Per-category show/hide toggles for the inspection mode.
#[derive(Debug, Default)]
pub struct CategoryVisibility {
    hidden: BTreeSet<&'static str>,
}

impl CategoryVisibility {
    pub fn new() -> Self {
        Self::default()
    }

    /// IFC entity behind a user-facing category name such as `IfcWall`.
    pub fn entity_for(name: &str) -> Option<&'static str> {
        CATEGORY_ENTITIES.iter().find(|(category, _)| *category == name).map(|(_, entity)| *entity)
    }

    pub fn is_hidden(&self, name: &str) -> bool {
        Self::entity_for(name).is_some_and(|entity| self.hidden.contains(entity))
    }

    /// Flips the category. Returns `Some(visible)` after a change, `None` for unknown names or
    /// categories with no elements.
    pub fn toggle(&mut self, store: &mut FragmentStore, name: &str) -> Option<bool> {
        let Some(entity) = Self::entity_for(name) else {
            tracing::debug!(category = name, "unknown category ignored");
            return None;
        };
        let items = store.find_by_category(&CategoryFilter::entity(entity));
        if items.is_empty() {
            tracing::info!(entity, "no elements found for category");
            return None;
        }
        let visible = self.hidden.remove(entity);
        if !visible {
            self.hidden.insert(entity);
        }
        store.set_visibility(&items, visible);
        tracing::debug!(entity, visible, fragments = items.len(), "category visibility toggled");
        Some(visible)
    }

    pub fn clear(&mut self) {
        self.hidden.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::test_support::box_mesh;
    use crate::geometry::FragmentId;
    use glam::Vec3;

    fn store() -> FragmentStore {
        let mut store = FragmentStore::new();
        store.insert_fragment("m", FragmentId::from("m/wall"), box_mesh(Vec3::ZERO, Vec3::ONE, 7));
        store.set_category("m", 7, "IFCWALLSTANDARDCASE");
        store
    }

    #[test]
    fn toggles_hide_then_show() {
        let mut store = store();
        let mut visibility = CategoryVisibility::new();
        let wall = FragmentId::from("m/wall");
        assert_eq!(visibility.toggle(&mut store, "IfcWall"), Some(false));
        assert!(!store.is_visible(&wall, 7));
        assert!(visibility.is_hidden("IfcWall"));
        assert_eq!(visibility.toggle(&mut store, "IfcWall"), Some(true));
        assert!(store.is_visible(&wall, 7));
    }

    #[test]
    fn unknown_or_empty_categories_are_no_ops() {
        let mut store = store();
        let mut visibility = CategoryVisibility::new();
        assert_eq!(visibility.toggle(&mut store, "IfcRoof"), None);
        assert_eq!(visibility.toggle(&mut store, "IfcBeam"), None);
        assert!(!visibility.is_hidden("IfcBeam"));
        assert!(store.hidden().is_empty());
    }
}

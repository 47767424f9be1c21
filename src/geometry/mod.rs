//! Loaded model geometry: fragments, element classification and the index the section tools
//! query.
//!
//! A fragment is a triangle mesh in world space. Each triangle belongs to one element, and each
//! element carries an IFC entity category (`IFCWALLSTANDARDCASE`, `IFCSLAB`, ...).

pub mod loader;
pub mod raycast;

pub use loader::{load_model, FileModelSource, LoadedModel, MemoryModelSource, ModelFile, ModelSource};
pub use raycast::{PickHit, PointerPicker, Raycaster};

use glam::Vec3;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

pub type ElementId = u32;

/// Globally unique fragment key, `<model>/<fragment>`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FragmentId(String);

impl FragmentId {
    pub fn new(model: &str, fragment: &str) -> Self {
        Self(format!("{model}/{fragment}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for FragmentId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for FragmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Fragment to element-subset mapping, ordered so every consumer iterates deterministically.
pub type FragmentIdMap = BTreeMap<FragmentId, BTreeSet<ElementId>>;

pub fn merge_into(target: &mut FragmentIdMap, other: &FragmentIdMap) {
    for (fragment, elements) in other {
        target.entry(fragment.clone()).or_default().extend(elements.iter().copied());
    }
}

pub fn element_count(map: &FragmentIdMap) -> usize {
    map.values().map(BTreeSet::len).sum()
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    pub fn from_points(points: &[Vec3]) -> Option<Self> {
        let first = *points.first()?;
        let (min, max) = points.iter().fold((first, first), |(min, max), p| (min.min(*p), max.max(*p)));
        Some(Self { min, max })
    }
}

/// World-space triangle mesh. `element_ids` holds one element per triangle.
#[derive(Debug, Clone)]
pub struct FragmentMesh {
    pub positions: Vec<Vec3>,
    pub indices: Vec<u32>,
    pub element_ids: Vec<ElementId>,
    pub color: [f32; 4],
    pub bounds: Option<Aabb>,
}

pub type SharedMesh = Arc<FragmentMesh>;

impl FragmentMesh {
    pub fn new(positions: Vec<Vec3>, indices: Vec<u32>, element_ids: Vec<ElementId>, color: [f32; 4]) -> Self {
        let bounds = Aabb::from_points(&positions);
        Self { positions, indices, element_ids, color, bounds }
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Checks the attributes section tooling relies on. Returns a human readable reason on failure.
    pub fn validate(&self) -> Result<(), String> {
        if self.positions.is_empty() {
            return Err("mesh has no positions".to_string());
        }
        if self.indices.len() % 3 != 0 {
            return Err(format!("index count {} is not a multiple of 3", self.indices.len()));
        }
        if self.element_ids.len() != self.triangle_count() {
            return Err(format!(
                "{} element ids for {} triangles",
                self.element_ids.len(),
                self.triangle_count()
            ));
        }
        let vertex_count = self.positions.len() as u32;
        if let Some(bad) = self.indices.iter().find(|index| **index >= vertex_count) {
            return Err(format!("index {bad} out of range for {vertex_count} vertices"));
        }
        if self.positions.iter().any(|p| !p.is_finite()) {
            return Err("non-finite vertex position".to_string());
        }
        Ok(())
    }

    /// Triangle corners and owning element. Callers must have validated the mesh.
    pub fn triangle(&self, index: usize) -> ([Vec3; 3], ElementId) {
        let base = index * 3;
        let corners = [
            self.positions[self.indices[base] as usize],
            self.positions[self.indices[base + 1] as usize],
            self.positions[self.indices[base + 2] as usize],
        ];
        (corners, self.element_ids[index])
    }

    pub fn elements(&self) -> BTreeSet<ElementId> {
        self.element_ids.iter().copied().collect()
    }
}

/// Classification query. Empty criteria match everything; non-empty criteria are intersected.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CategoryFilter {
    pub models: Vec<String>,
    pub entities: Vec<String>,
}

impl CategoryFilter {
    pub fn model(model: impl Into<String>) -> Self {
        Self { models: vec![model.into()], entities: Vec::new() }
    }

    pub fn entity(entity: impl Into<String>) -> Self {
        Self { models: Vec::new(), entities: vec![entity.into()] }
    }
}

/// Read access to loaded geometry, as consumed by the section tooling.
pub trait GeometryIndex {
    fn mesh_for(&self, fragment: &FragmentId) -> Option<SharedMesh>;
    fn find_by_category(&self, filter: &CategoryFilter) -> FragmentIdMap;
}

#[derive(Debug, Clone)]
struct FragmentEntry {
    model: String,
    mesh: SharedMesh,
}

/// In-memory geometry store holding every loaded model plus per-element visibility.
#[derive(Debug, Default)]
pub struct FragmentStore {
    fragments: BTreeMap<FragmentId, FragmentEntry>,
    categories: BTreeMap<String, BTreeMap<ElementId, String>>,
    hidden: FragmentIdMap,
}

impl FragmentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a loaded model and returns the key its fragments are stored under. A model whose
    /// name is already taken gets a `#n` suffix so neither load overwrites the other.
    pub fn insert_model(&mut self, model: LoadedModel) -> String {
        let LoadedModel { model: name, fragments, categories } = model;
        let key = self.unique_model_key(&name);
        if key != name {
            tracing::warn!(model = %name, key = %key, "duplicate model name, registered under a new key");
        }
        tracing::debug!(model = %key, fragments = fragments.len(), elements = categories.len(), "model registered");
        for (local, mesh) in fragments {
            self.insert_fragment(&key, FragmentId::new(&key, &local), mesh);
        }
        self.categories.entry(key.clone()).or_default().extend(categories);
        key
    }

    fn unique_model_key(&self, name: &str) -> String {
        let taken = |key: &str| {
            self.categories.contains_key(key) || self.fragments.values().any(|entry| entry.model == key)
        };
        if !taken(name) {
            return name.to_string();
        }
        (2..)
            .map(|n| format!("{name}#{n}"))
            .find(|key| !taken(key))
            .unwrap_or_else(|| name.to_string())
    }

    pub fn insert_fragment(&mut self, model: &str, id: FragmentId, mesh: FragmentMesh) {
        self.fragments.insert(id, FragmentEntry { model: model.to_string(), mesh: Arc::new(mesh) });
    }

    pub fn set_category(&mut self, model: &str, element: ElementId, category: impl Into<String>) {
        self.categories.entry(model.to_string()).or_default().insert(element, category.into());
    }

    pub fn models(&self) -> Vec<String> {
        let set: BTreeSet<&String> = self.fragments.values().map(|entry| &entry.model).collect();
        set.into_iter().cloned().collect()
    }

    pub fn fragment_ids(&self) -> impl Iterator<Item = &FragmentId> {
        self.fragments.keys()
    }

    pub fn meshes(&self) -> impl Iterator<Item = (&FragmentId, &SharedMesh)> {
        self.fragments.iter().map(|(id, entry)| (id, &entry.mesh))
    }

    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }

    pub fn set_visibility(&mut self, items: &FragmentIdMap, visible: bool) {
        for (fragment, elements) in items {
            if visible {
                if let Some(hidden) = self.hidden.get_mut(fragment) {
                    for element in elements {
                        hidden.remove(element);
                    }
                    if hidden.is_empty() {
                        self.hidden.remove(fragment);
                    }
                }
            } else {
                self.hidden.entry(fragment.clone()).or_default().extend(elements.iter().copied());
            }
        }
    }

    pub fn is_visible(&self, fragment: &FragmentId, element: ElementId) -> bool {
        self.hidden.get(fragment).map_or(true, |hidden| !hidden.contains(&element))
    }

    pub fn hidden(&self) -> &FragmentIdMap {
        &self.hidden
    }

    pub fn clear(&mut self) {
        self.fragments.clear();
        self.categories.clear();
        self.hidden.clear();
    }
}

impl GeometryIndex for FragmentStore {
    fn mesh_for(&self, fragment: &FragmentId) -> Option<SharedMesh> {
        self.fragments.get(fragment).map(|entry| Arc::clone(&entry.mesh))
    }

    fn find_by_category(&self, filter: &CategoryFilter) -> FragmentIdMap {
        let mut found = FragmentIdMap::new();
        for (id, entry) in &self.fragments {
            if !filter.models.is_empty() && !filter.models.iter().any(|model| model == &entry.model) {
                continue;
            }
            let categories = self.categories.get(&entry.model);
            let elements: BTreeSet<ElementId> = entry
                .mesh
                .element_ids
                .iter()
                .copied()
                .filter(|element| {
                    filter.entities.is_empty()
                        || categories
                            .and_then(|map| map.get(element))
                            .is_some_and(|category| filter.entities.iter().any(|e| e.eq_ignore_ascii_case(category)))
                })
                .collect();
            if !elements.is_empty() {
                found.insert(id.clone(), elements);
            }
        }
        found
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::box_mesh;
    use super::*;

    fn store() -> FragmentStore {
        let mut store = FragmentStore::new();
        store.insert_fragment("a", FragmentId::new("a", "0"), box_mesh(Vec3::ZERO, Vec3::ONE, 1));
        store.insert_fragment("b", FragmentId::new("b", "0"), box_mesh(Vec3::ONE, Vec3::splat(2.0), 7));
        store.set_category("a", 1, "IFCWALLSTANDARDCASE");
        store.set_category("b", 7, "IFCSLAB");
        store
    }

    #[test]
    fn classification_intersects_model_and_entity() {
        let store = store();
        let by_model = store.find_by_category(&CategoryFilter::model("a"));
        assert_eq!(by_model.keys().collect::<Vec<_>>(), vec![&FragmentId::new("a", "0")]);

        let walls = store.find_by_category(&CategoryFilter::entity("IFCWALLSTANDARDCASE"));
        assert_eq!(element_count(&walls), 1);

        let none = store.find_by_category(&CategoryFilter {
            models: vec!["b".into()],
            entities: vec!["IFCWALLSTANDARDCASE".into()],
        });
        assert!(none.is_empty());
    }

    #[test]
    fn duplicate_model_names_get_distinct_keys() {
        let loaded = || LoadedModel {
            model: "tower".into(),
            fragments: vec![("f0".into(), box_mesh(Vec3::ZERO, Vec3::ONE, 1))],
            categories: BTreeMap::from([(1, "IFCSLAB".to_string())]),
        };
        let mut store = FragmentStore::new();
        assert_eq!(store.insert_model(loaded()), "tower");
        assert_eq!(store.insert_model(loaded()), "tower#2");
        assert_eq!(store.insert_model(loaded()), "tower#3");

        let ids: Vec<_> = store.fragment_ids().map(FragmentId::as_str).collect();
        assert_eq!(ids, ["tower#2/f0", "tower#3/f0", "tower/f0"]);
        assert_eq!(store.find_by_category(&CategoryFilter::model("tower#2")).len(), 1);
    }

    #[test]
    fn visibility_round_trips() {
        let mut store = store();
        let id = FragmentId::new("a", "0");
        let items: FragmentIdMap = [(id.clone(), BTreeSet::from([1]))].into_iter().collect();
        store.set_visibility(&items, false);
        assert!(!store.is_visible(&id, 1));
        store.set_visibility(&items, true);
        assert!(store.is_visible(&id, 1));
        assert!(store.hidden().is_empty());
    }

    #[test]
    fn validation_reports_broken_indices() {
        let mut mesh = box_mesh(Vec3::ZERO, Vec3::ONE, 1);
        assert!(mesh.validate().is_ok());
        mesh.indices[4] = 99;
        assert!(mesh.validate().unwrap_err().contains("out of range"));
        mesh.indices.pop();
        assert!(mesh.validate().is_err());
    }
}

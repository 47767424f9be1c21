use anyhow::{anyhow, Context, Result};
use futures_util::future::LocalBoxFuture;
use glam::Vec3;
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

use super::{ElementId, FragmentMesh};

/// On-disk fragment model: pre-tessellated triangle meshes plus element classification.
#[derive(Debug, Clone, Deserialize)]
pub struct ModelFile {
    pub model: String,
    pub fragments: Vec<FragmentRecord>,
    /// Element id (as a JSON object key) to IFC entity name.
    #[serde(default)]
    pub elements: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FragmentRecord {
    pub id: String,
    pub positions: Vec<[f32; 3]>,
    pub indices: Vec<u32>,
    pub element_ids: Vec<ElementId>,
    #[serde(default = "FragmentRecord::default_color")]
    pub color: [f32; 4],
}

impl FragmentRecord {
    const fn default_color() -> [f32; 4] {
        [0.82, 0.82, 0.8, 1.0]
    }
}

/// A parsed model with its offset applied, ready for `FragmentStore::insert_model`. Fragment ids
/// are local to the file; the store qualifies them once the model has a unique key.
#[derive(Debug, Clone)]
pub struct LoadedModel {
    pub model: String,
    pub fragments: Vec<(String, FragmentMesh)>,
    pub categories: BTreeMap<ElementId, String>,
}

/// Where model bytes come from. Fetches are asynchronous so mode initialization can await them.
pub trait ModelSource {
    fn fetch<'a>(&'a self, path: &'a Path) -> LocalBoxFuture<'a, Result<Vec<u8>>>;
}

/// Reads model files relative to a root directory.
#[derive(Debug, Clone)]
pub struct FileModelSource {
    root: PathBuf,
}

impl FileModelSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl Default for FileModelSource {
    fn default() -> Self {
        Self::new(".")
    }
}

impl ModelSource for FileModelSource {
    fn fetch<'a>(&'a self, path: &'a Path) -> LocalBoxFuture<'a, Result<Vec<u8>>> {
        Box::pin(async move {
            let full = self.root.join(path);
            fs::read(&full).with_context(|| format!("Failed to read model file {}", full.display()))
        })
    }
}

/// Serves model files from memory; paths not present fail like a missing file.
#[derive(Debug, Clone, Default)]
pub struct MemoryModelSource {
    files: HashMap<PathBuf, Vec<u8>>,
}

impl MemoryModelSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, path: impl Into<PathBuf>, bytes: impl Into<Vec<u8>>) {
        self.files.insert(path.into(), bytes.into());
    }

    pub fn with_file(mut self, path: impl Into<PathBuf>, bytes: impl Into<Vec<u8>>) -> Self {
        self.insert(path, bytes);
        self
    }
}

impl ModelSource for MemoryModelSource {
    fn fetch<'a>(&'a self, path: &'a Path) -> LocalBoxFuture<'a, Result<Vec<u8>>> {
        Box::pin(async move {
            self.files.get(path).cloned().ok_or_else(|| anyhow!("Model file {} not found", path.display()))
        })
    }
}

/// Fetches and parses one model file, translating every vertex by `offset`.
pub async fn load_model(source: &dyn ModelSource, path: &Path, offset: Vec3) -> Result<LoadedModel> {
    let bytes = source.fetch(path).await?;
    let file: ModelFile = serde_json::from_slice(&bytes)
        .with_context(|| format!("Failed to parse model file {}", path.display()))?;
    let loaded = file.into_loaded(offset).with_context(|| format!("Invalid model file {}", path.display()))?;
    tracing::info!(
        path = %path.display(),
        model = %loaded.model,
        fragments = loaded.fragments.len(),
        "model loaded"
    );
    Ok(loaded)
}

impl ModelFile {
    pub fn into_loaded(self, offset: Vec3) -> Result<LoadedModel> {
        let mut categories = BTreeMap::new();
        for (key, category) in self.elements {
            let element: ElementId =
                key.trim().parse().with_context(|| format!("Element key '{key}' is not a numeric id"))?;
            categories.insert(element, category.to_ascii_uppercase());
        }
        let fragments = self
            .fragments
            .into_iter()
            .map(|record| {
                let positions = record.positions.iter().map(|p| Vec3::from_array(*p) + offset).collect();
                (record.id, FragmentMesh::new(positions, record.indices, record.element_ids, record.color))
            })
            .collect();
        Ok(LoadedModel { model: self.model, fragments, categories })
    }
}

//! BIM inspection: the loaded building model with section planes, cut edges and category
//! visibility toggles.

use anyhow::{bail, Context, Result};
use futures_util::future::LocalBoxFuture;
use std::rc::Rc;
use std::time::Instant;
use winit::dpi::PhysicalSize;

use super::view::{Overlays, SceneView};
use super::visibility::CategoryVisibility;
use super::{Mode, ModeKind};
use crate::config::{AppConfig, InspectionConfig};
use crate::container::ViewportContainer;
use crate::events::EventHub;
use crate::geometry::{
    load_model, merge_into, CategoryFilter, FragmentIdMap, FragmentStore, GeometryIndex, ModelSource, Raycaster,
};
use crate::renderer::{quad_triangles, screen_polyline, ColorVertex, RenderBackend};
use crate::section::ClipperManager;
use crate::time::FrameTime;

const RING_SEGMENTS: usize = 48;
const RING_COLOR: [f32; 4] = [1.0, 1.0, 1.0, 0.9];

pub struct InspectionMode {
    config: InspectionConfig,
    clear_color: [f32; 4],
    source: Rc<dyn ModelSource>,
    store: FragmentStore,
    clipper: ClipperManager,
    visibility: CategoryVisibility,
    view: SceneView,
    prepared: bool,
    active: bool,
    disposed: bool,
}

impl InspectionMode {
    pub fn new(config: &AppConfig, source: Rc<dyn ModelSource>, backend: Rc<dyn RenderBackend>) -> Self {
        let inspection = config.inspection.clone();
        let view = SceneView::new("inspection", backend, &inspection.camera, inspection.max_polar_angle);
        Self {
            clear_color: config.viewer.clear_color,
            source,
            store: FragmentStore::new(),
            clipper: ClipperManager::new(config.section.clone(), &config.gesture, &config.edges),
            visibility: CategoryVisibility::new(),
            view,
            config: inspection,
            prepared: false,
            active: false,
            disposed: false,
        }
    }

    pub fn visibility(&self) -> &CategoryVisibility {
        &self.visibility
    }

    pub fn triangle_count(&self) -> usize {
        self.view.triangle_count()
    }

    async fn load_models(&mut self) -> Result<()> {
        if self.config.models.is_empty() {
            bail!("no inspection models configured");
        }
        let mut per_model = Vec::with_capacity(self.config.models.len());
        for path in &self.config.models {
            let loaded = load_model(self.source.as_ref(), path, self.config.model_offset)
                .await
                .with_context(|| format!("Failed to load inspection model {}", path.display()))?;
            let model = self.store.insert_model(loaded);
            per_model.push(self.store.find_by_category(&CategoryFilter::model(model)));
        }
        let mut maps = per_model.into_iter();
        let primary = maps.next().unwrap_or_default();
        let mut secondary = FragmentIdMap::new();
        for rest in maps {
            merge_into(&mut secondary, &rest);
        }
        if let Err(err) = self.clipper.set_model_geometry(&self.store, Some(&primary), Some(&secondary)) {
            tracing::warn!(error = %err, "section edges not bound to model geometry");
        }
        self.view.mark_geometry_dirty();
        Ok(())
    }

    fn frame_overlays(&self) -> (Vec<ColorVertex>, Vec<ColorVertex>, Vec<ColorVertex>) {
        let mut lines = Vec::new();
        let mut fills = Vec::new();
        for plane in self.clipper.planes().values().filter(|plane| plane.enabled) {
            let [r, g, b] = plane.color;
            fills.extend_from_slice(&quad_triangles(plane.quad_corners(), [r, g, b, plane.opacity]));
        }
        if let Some(style) = self.clipper.style() {
            let edges = style.geometry();
            lines.extend_from_slice(&edges.lines);
            lines.extend_from_slice(&edges.outlines);
            fills.extend_from_slice(&edges.fills);
        }
        let indicator = self.clipper.indicator();
        let ring = if indicator.is_visible() {
            screen_polyline(&indicator.arc_points(RING_SEGMENTS), self.view.size(), RING_COLOR)
        } else {
            Vec::new()
        };
        (lines, fills, ring)
    }
}

impl Mode for InspectionMode {
    fn kind(&self) -> ModeKind {
        ModeKind::Inspection
    }

    fn initialize(&mut self) -> LocalBoxFuture<'_, Result<()>> {
        Box::pin(async move {
            if self.disposed {
                bail!("inspection mode was already disposed");
            }
            if !self.prepared {
                self.load_models().await?;
                self.prepared = true;
            }
            Ok(())
        })
    }

    fn attach(&mut self, container: &mut ViewportContainer, hub: &mut EventHub) -> Result<()> {
        if !self.prepared || self.disposed {
            bail!("inspection mode must be initialized before attach");
        }
        self.view.attach(container, hub)?;
        self.clipper.subscribe(hub);
        self.active = true;
        tracing::info!(fragments = self.store.fragment_ids().count(), "inspection mode attached");
        Ok(())
    }

    fn is_initialized(&self) -> bool {
        self.active
    }

    fn has_viewport(&self) -> bool {
        self.view.is_attached()
    }

    fn update(&mut self, frame: &FrameTime) -> Result<()> {
        if !self.active {
            return Ok(());
        }
        self.clipper.tick(frame.now);
        self.view.sync_geometry(&self.store);
        let clip_planes = self.clipper.clip_planes();
        let (lines, fills, ring) = self.frame_overlays();
        self.view.render(
            self.clear_color,
            Overlays {
                clip_planes: &clip_planes,
                world_lines: &lines,
                world_overlays: &fills,
                screen_lines: &ring,
            },
        )
    }

    fn process_events(&mut self, now: Instant) {
        if !self.active {
            return;
        }
        self.view.process_camera_events();
        let clip_planes = self.clipper.clip_planes();
        let picker = Raycaster::new(&self.store, &self.view.camera, self.view.size()).with_clip_planes(&clip_planes);
        self.clipper.process_events(now, &picker);
    }

    fn resize(&mut self, size: PhysicalSize<u32>) {
        self.view.resize(size);
    }

    fn toggle_category(&mut self, name: &str) -> Option<bool> {
        if self.disposed {
            return None;
        }
        let visible = self.visibility.toggle(&mut self.store, name)?;
        self.view.mark_geometry_dirty();
        Some(visible)
    }

    fn clear_sections(&mut self) -> usize {
        self.clipper.clear_all().unwrap_or(0)
    }

    fn clipper(&self) -> Option<&ClipperManager> {
        Some(&self.clipper)
    }

    fn clipper_mut(&mut self) -> Option<&mut ClipperManager> {
        Some(&mut self.clipper)
    }

    fn geometry(&self) -> Option<&FragmentStore> {
        Some(&self.store)
    }

    fn dispose(&mut self, container: &mut ViewportContainer) {
        if self.disposed {
            return;
        }
        // Section state first, then the GPU target.
        self.clipper.dispose();
        self.view.detach(container);
        self.visibility.clear();
        self.store.clear();
        self.active = false;
        self.disposed = true;
        tracing::info!("inspection mode disposed");
    }
}

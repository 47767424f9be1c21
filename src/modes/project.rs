use anyhow::{bail, Result};
use futures_util::future::LocalBoxFuture;
use glam::Vec3;
use std::path::PathBuf;
use std::rc::Rc;
use std::time::Instant;
use winit::dpi::PhysicalSize;

use super::view::{Overlays, SceneView};
use super::{Mode, ModeKind};
use crate::config::AppConfig;
use crate::container::ViewportContainer;
use crate::events::EventHub;
use crate::geometry::{load_model, FragmentStore, ModelSource};
use crate::renderer::RenderBackend;
use crate::time::FrameTime;

/// Site overview: orbit camera around an optional site model, no section tooling.
pub struct ProjectMode {
    site_model: Option<PathBuf>,
    clear_color: [f32; 4],
    source: Rc<dyn ModelSource>,
    store: FragmentStore,
    view: SceneView,
    prepared: bool,
    active: bool,
    disposed: bool,
}

impl ProjectMode {
    pub fn new(config: &AppConfig, source: Rc<dyn ModelSource>, backend: Rc<dyn RenderBackend>) -> Self {
        Self {
            site_model: config.project.site_model.clone(),
            clear_color: config.viewer.clear_color,
            source,
            store: FragmentStore::new(),
            view: SceneView::new("project", backend, &config.project.camera, std::f32::consts::PI),
            prepared: false,
            active: false,
            disposed: false,
        }
    }
}

impl Mode for ProjectMode {
    fn kind(&self) -> ModeKind {
        ModeKind::Project
    }

    fn initialize(&mut self) -> LocalBoxFuture<'_, Result<()>> {
        Box::pin(async move {
            if self.disposed {
                bail!("project mode was already disposed");
            }
            if self.prepared {
                return Ok(());
            }
            if let Some(path) = self.site_model.as_deref() {
                let loaded = load_model(self.source.as_ref(), path, Vec3::ZERO).await?;
                self.store.insert_model(loaded);
                self.view.mark_geometry_dirty();
            }
            self.prepared = true;
            Ok(())
        })
    }

    fn attach(&mut self, container: &mut ViewportContainer, hub: &mut EventHub) -> Result<()> {
        if !self.prepared || self.disposed {
            bail!("project mode must be initialized before attach");
        }
        self.view.attach(container, hub)?;
        self.active = true;
        tracing::info!(site_model = self.site_model.is_some(), "project mode attached");
        Ok(())
    }

    fn is_initialized(&self) -> bool {
        self.active
    }

    fn has_viewport(&self) -> bool {
        self.view.is_attached()
    }

    fn update(&mut self, _frame: &FrameTime) -> Result<()> {
        if !self.active {
            return Ok(());
        }
        self.view.sync_geometry(&self.store);
        self.view.render(self.clear_color, Overlays::default())
    }

    fn process_events(&mut self, _now: Instant) {
        if self.active {
            self.view.process_camera_events();
        }
    }

    fn resize(&mut self, size: PhysicalSize<u32>) {
        self.view.resize(size);
    }

    fn geometry(&self) -> Option<&FragmentStore> {
        Some(&self.store)
    }

    fn dispose(&mut self, container: &mut ViewportContainer) {
        if self.disposed {
            return;
        }
        self.view.detach(container);
        self.store.clear();
        self.active = false;
        self.disposed = true;
        tracing::info!("project mode disposed");
    }
}

use anyhow::{bail, Result};
use std::cell::RefCell;
use std::rc::Rc;
use winit::dpi::PhysicalSize;

use super::{FrameScene, RenderBackend, RenderTarget};
use crate::container::{ContainerLayer, ViewportContainer};

/// Shared record of what headless targets did, for assertions and diagnostics.
#[derive(Debug, Default, Clone)]
pub struct HeadlessLog {
    pub attached_now: usize,
    pub max_attached: usize,
    pub attaches: Vec<String>,
    pub detaches: Vec<String>,
    pub resizes: Vec<(String, PhysicalSize<u32>)>,
    pub frames: usize,
    pub last_clip_planes: usize,
    pub last_triangles: usize,
    pub last_world_lines: usize,
}

/// Backend that draws nothing. Targets behave like GPU targets otherwise, including owning a
/// container layer while attached.
#[derive(Debug, Clone, Default)]
pub struct HeadlessBackend {
    log: Rc<RefCell<HeadlessLog>>,
}

impl HeadlessBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn log(&self) -> HeadlessLog {
        self.log.borrow().clone()
    }
}

impl RenderBackend for HeadlessBackend {
    fn create_target(&self, label: &str) -> Box<dyn RenderTarget> {
        Box::new(HeadlessTarget { label: label.to_string(), attached: false, log: Rc::clone(&self.log) })
    }
}

struct HeadlessTarget {
    label: String,
    attached: bool,
    log: Rc<RefCell<HeadlessLog>>,
}

impl HeadlessTarget {
    fn layer(&self) -> ContainerLayer {
        ContainerLayer::Surface { owner: self.label.clone() }
    }
}

impl RenderTarget for HeadlessTarget {
    fn label(&self) -> &str {
        &self.label
    }

    fn is_attached(&self) -> bool {
        self.attached
    }

    fn attach(&mut self, container: &mut ViewportContainer) -> Result<()> {
        if self.attached {
            bail!("render target '{}' is already attached", self.label);
        }
        self.attached = true;
        container.push_layer(self.layer());
        let mut log = self.log.borrow_mut();
        log.attached_now += 1;
        log.max_attached = log.max_attached.max(log.attached_now);
        log.attaches.push(self.label.clone());
        Ok(())
    }

    fn detach(&mut self, container: &mut ViewportContainer) {
        if !self.attached {
            return;
        }
        self.attached = false;
        container.remove_layer(&self.layer());
        let mut log = self.log.borrow_mut();
        log.attached_now = log.attached_now.saturating_sub(1);
        log.detaches.push(self.label.clone());
    }

    fn resize(&mut self, size: PhysicalSize<u32>) {
        self.log.borrow_mut().resizes.push((self.label.clone(), size));
    }

    fn render(&mut self, scene: &FrameScene<'_>) -> Result<()> {
        if !self.attached {
            bail!("render target '{}' is not attached", self.label);
        }
        let mut log = self.log.borrow_mut();
        log.frames += 1;
        log.last_clip_planes = scene.clip_planes.len();
        log.last_triangles = scene.triangles.len() / 3;
        log.last_world_lines = scene.world_lines.len() / 2;
        Ok(())
    }
}

use anyhow::{Context, Result};
use glam::{Vec2, Vec4};
use std::rc::Rc;
use winit::dpi::PhysicalSize;
use winit::event::MouseButton;

use crate::camera3d::{Camera3D, OrbitControls};
use crate::config::CameraPoseConfig;
use crate::container::ViewportContainer;
use crate::events::{EventHub, EventScope, Subscription};
use crate::geometry::FragmentStore;
use crate::input::InputEvent;
use crate::renderer::{ColorVertex, FrameScene, RenderBackend, RenderTarget};

/// Camera, orbit controls and render target shared by the modes that draw a 3D scene.
pub(crate) struct SceneView {
    label: String,
    backend: Rc<dyn RenderBackend>,
    pub camera: Camera3D,
    pub controls: OrbitControls,
    target: Option<Box<dyn RenderTarget>>,
    size: PhysicalSize<u32>,
    camera_events: Option<Subscription>,
    triangles: Vec<ColorVertex>,
    revision: u64,
    geometry_dirty: bool,
}

/// Overlay geometry for one frame, on top of the model triangles.
#[derive(Default)]
pub(crate) struct Overlays<'a> {
    pub clip_planes: &'a [Vec4],
    pub world_lines: &'a [ColorVertex],
    pub world_overlays: &'a [ColorVertex],
    pub screen_lines: &'a [ColorVertex],
}

impl SceneView {
    pub fn new(label: &str, backend: Rc<dyn RenderBackend>, pose: &CameraPoseConfig, max_polar_angle: f32) -> Self {
        let mut camera = Camera3D::from_pose(pose);
        let mut controls = OrbitControls::new(&camera, max_polar_angle);
        controls.set_look_at(&mut camera, pose.eye, pose.target);
        Self {
            label: label.to_string(),
            backend,
            camera,
            controls,
            target: None,
            size: PhysicalSize::new(0, 0),
            camera_events: None,
            triangles: Vec::new(),
            revision: 0,
            geometry_dirty: true,
        }
    }

    pub fn attach(&mut self, container: &mut ViewportContainer, hub: &mut EventHub) -> Result<()> {
        let mut target = self.backend.create_target(&self.label);
        target.attach(container).with_context(|| format!("Failed to attach {} render target", self.label))?;
        self.size = container.size();
        target.resize(self.size);
        self.target = Some(target);
        self.camera_events = Some(hub.subscribe(EventScope::Viewport));
        Ok(())
    }

    pub fn is_attached(&self) -> bool {
        self.target.as_ref().is_some_and(|target| target.is_attached())
    }

    pub fn detach(&mut self, container: &mut ViewportContainer) {
        if let Some(mut events) = self.camera_events.take() {
            events.release();
        }
        if let Some(mut target) = self.target.take() {
            target.detach(container);
        }
        self.triangles.clear();
        self.geometry_dirty = true;
    }

    pub fn size(&self) -> PhysicalSize<u32> {
        self.size
    }

    pub fn resize(&mut self, size: PhysicalSize<u32>) {
        self.size = size;
        if let Some(target) = self.target.as_mut() {
            target.resize(size);
        }
    }

    /// Feeds queued pointer input to the orbit controls.
    pub fn process_camera_events(&mut self) {
        let Some(events) = self.camera_events.as_ref() else {
            return;
        };
        for event in events.drain() {
            match event {
                InputEvent::MouseButton { button: MouseButton::Left, pressed, x, y } => {
                    if pressed {
                        self.controls.begin_drag(Vec2::new(x, y));
                    } else {
                        self.controls.end_drag();
                    }
                }
                InputEvent::CursorMoved { x, y } => {
                    self.controls.cursor_moved(&mut self.camera, Vec2::new(x, y));
                }
                InputEvent::CursorLeft => self.controls.end_drag(),
                InputEvent::Wheel { delta } => self.controls.wheel(&mut self.camera, delta),
                _ => {}
            }
        }
    }

    pub fn mark_geometry_dirty(&mut self) {
        self.geometry_dirty = true;
    }

    /// Rebuilds the visible model triangles when the store or visibility changed.
    pub fn sync_geometry(&mut self, store: &FragmentStore) {
        if !self.geometry_dirty {
            return;
        }
        self.triangles = visible_triangles(store);
        self.revision += 1;
        self.geometry_dirty = false;
    }

    pub fn triangle_count(&self) -> usize {
        self.triangles.len() / 3
    }

    pub fn render(&mut self, clear_color: [f32; 4], overlays: Overlays<'_>) -> Result<()> {
        let target = self.target.as_mut().context("render target not attached")?;
        let scene = FrameScene {
            view_proj: self.camera.view_projection(self.size),
            clear_color,
            clip_planes: overlays.clip_planes,
            triangles: &self.triangles,
            triangles_revision: self.revision,
            world_lines: overlays.world_lines,
            world_overlays: overlays.world_overlays,
            screen_lines: overlays.screen_lines,
        };
        target.render(&scene)
    }
}

/// Flattens every visible triangle of the store into coloured vertices.
pub(crate) fn visible_triangles(store: &FragmentStore) -> Vec<ColorVertex> {
    let mut out = Vec::new();
    for (fragment, mesh) in store.meshes() {
        if mesh.validate().is_err() {
            tracing::warn!(fragment = %fragment, "skipping malformed fragment");
            continue;
        }
        for index in 0..mesh.triangle_count() {
            let (corners, element) = mesh.triangle(index);
            if !store.is_visible(fragment, element) {
                continue;
            }
            out.extend(corners.iter().map(|corner| ColorVertex::new(*corner, mesh.color)));
        }
    }
    out
}

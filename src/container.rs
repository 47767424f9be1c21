use std::sync::Arc;
use winit::dpi::PhysicalSize;
use winit::window::Window;

/// Something a mode has placed in the shared viewport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContainerLayer {
    /// A GPU surface owned by the named render target.
    Surface { owner: String },
    /// An externally rendered page shown in place of the 3D scene.
    Embedded { url: String },
}

/// The shared render target every mode attaches to. Exactly one mode populates it at a time;
/// [`ViewportContainer::clear`] empties it between activations.
#[derive(Debug)]
pub struct ViewportContainer {
    window: Option<Arc<Window>>,
    size: PhysicalSize<u32>,
    layers: Vec<ContainerLayer>,
}

impl ViewportContainer {
    /// Container with no backing window, used by tests and headless runs.
    pub fn headless(size: PhysicalSize<u32>) -> Self {
        Self { window: None, size, layers: Vec::new() }
    }

    pub fn for_window(window: Arc<Window>) -> Self {
        let size = window.inner_size();
        Self { window: Some(window), size, layers: Vec::new() }
    }

    pub fn window(&self) -> Option<&Arc<Window>> {
        self.window.as_ref()
    }

    pub fn size(&self) -> PhysicalSize<u32> {
        self.size
    }

    pub fn set_size(&mut self, size: PhysicalSize<u32>) {
        self.size = size;
    }

    pub fn aspect(&self) -> f32 {
        if self.size.height == 0 {
            1.0
        } else {
            self.size.width as f32 / self.size.height as f32
        }
    }

    pub fn push_layer(&mut self, layer: ContainerLayer) {
        self.layers.push(layer);
    }

    pub fn remove_layer(&mut self, layer: &ContainerLayer) -> bool {
        let before = self.layers.len();
        self.layers.retain(|existing| existing != layer);
        self.layers.len() != before
    }

    pub fn layers(&self) -> &[ContainerLayer] {
        &self.layers
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    pub fn clear(&mut self) {
        if !self.layers.is_empty() {
            tracing::debug!(layers = self.layers.len(), "clearing viewport container");
        }
        self.layers.clear();
    }

    pub fn request_redraw(&self) {
        if let Some(window) = &self.window {
            window.request_redraw();
        }
    }
}

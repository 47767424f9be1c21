//! Render seam between modes and the GPU.
//!
//! A mode asks its [`RenderBackend`] for one [`RenderTarget`] per activation, attaches it to the
//! shared viewport when it becomes active and detaches it on dispose. The wgpu backend only owns
//! a device and surface while attached, so two modes never hold GPU resources at once.

mod gpu_target;
mod headless;
mod line_pass;
mod mesh_pass;
mod window_surface;

pub use headless::{HeadlessBackend, HeadlessLog};
pub use gpu_target::WgpuBackend;
pub use window_surface::WindowSurface;

use anyhow::Result;
use glam::{Mat4, Vec2, Vec3, Vec4};
use winit::dpi::PhysicalSize;

use crate::container::ViewportContainer;

pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;
pub const MAX_CLIP_PLANES: usize = 8;

/// Position plus RGBA colour, shared by every pass.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ColorVertex {
    pub position: [f32; 3],
    pub color: [f32; 4],
}

impl ColorVertex {
    pub fn new(position: Vec3, color: [f32; 4]) -> Self {
        Self { position: position.to_array(), color }
    }

    pub fn layout<'a>() -> wgpu::VertexBufferLayout<'a> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<ColorVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &[
                wgpu::VertexAttribute { offset: 0, shader_location: 0, format: wgpu::VertexFormat::Float32x3 },
                wgpu::VertexAttribute { offset: 12, shader_location: 1, format: wgpu::VertexFormat::Float32x4 },
            ],
        }
    }
}

/// Everything a target needs to draw one frame. Model triangles are clipped against
/// `clip_planes`; overlays are drawn on top without clipping. `screen_lines` are in pixels.
#[derive(Debug, Clone, Copy)]
pub struct FrameScene<'a> {
    pub view_proj: Mat4,
    pub clear_color: [f32; 4],
    pub clip_planes: &'a [Vec4],
    pub triangles: &'a [ColorVertex],
    /// Bumped whenever `triangles` changes, so targets can skip re-uploading static geometry.
    pub triangles_revision: u64,
    pub world_lines: &'a [ColorVertex],
    pub world_overlays: &'a [ColorVertex],
    pub screen_lines: &'a [ColorVertex],
}

impl<'a> FrameScene<'a> {
    pub fn empty(view_proj: Mat4, clear_color: [f32; 4]) -> Self {
        Self {
            view_proj,
            clear_color,
            clip_planes: &[],
            triangles: &[],
            triangles_revision: 0,
            world_lines: &[],
            world_overlays: &[],
            screen_lines: &[],
        }
    }
}

/// Converts a pixel-space polyline into NDC line-list vertices for the overlay pass.
pub fn screen_polyline(points: &[Vec2], viewport: PhysicalSize<u32>, color: [f32; 4]) -> Vec<ColorVertex> {
    if viewport.width == 0 || viewport.height == 0 || points.len() < 2 {
        return Vec::new();
    }
    let to_ndc = |p: Vec2| {
        Vec3::new(
            p.x / viewport.width as f32 * 2.0 - 1.0,
            1.0 - p.y / viewport.height as f32 * 2.0,
            0.0,
        )
    };
    let mut out = Vec::with_capacity((points.len() - 1) * 2);
    for pair in points.windows(2) {
        out.push(ColorVertex::new(to_ndc(pair[0]), color));
        out.push(ColorVertex::new(to_ndc(pair[1]), color));
    }
    out
}

/// Triangle-list vertices for an axis-aligned quad, in world space.
pub fn quad_triangles(corners: [Vec3; 4], color: [f32; 4]) -> [ColorVertex; 6] {
    let [a, b, c, d] = corners.map(|corner| ColorVertex::new(corner, color));
    [a, b, c, a, c, d]
}

pub trait RenderTarget {
    fn label(&self) -> &str;
    fn is_attached(&self) -> bool;
    fn attach(&mut self, container: &mut ViewportContainer) -> Result<()>;
    fn detach(&mut self, container: &mut ViewportContainer);
    fn resize(&mut self, size: PhysicalSize<u32>);
    fn render(&mut self, scene: &FrameScene<'_>) -> Result<()>;
}

pub trait RenderBackend {
    fn create_target(&self, label: &str) -> Box<dyn RenderTarget>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn screen_polyline_maps_corners_to_ndc() {
        let verts = screen_polyline(
            &[Vec2::ZERO, Vec2::new(800.0, 600.0)],
            PhysicalSize::new(800, 600),
            [1.0; 4],
        );
        assert_eq!(verts.len(), 2);
        assert_eq!(verts[0].position, [-1.0, 1.0, 0.0]);
        assert_eq!(verts[1].position, [1.0, -1.0, 0.0]);
    }

    #[test]
    fn color_vertex_is_tightly_packed() {
        assert_eq!(std::mem::size_of::<ColorVertex>(), 28);
    }
}

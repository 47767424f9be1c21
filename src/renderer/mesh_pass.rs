use anyhow::{Context, Result};
use glam::{Mat4, Vec4};

use super::{ColorVertex, DEPTH_FORMAT, MAX_CLIP_PLANES};

#[repr(C)]
#[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
struct MeshGlobals {
    view_proj: [[f32; 4]; 4],
    planes: [[f32; 4]; MAX_CLIP_PLANES],
    plane_count: [u32; 4],
}

impl MeshGlobals {
    fn new(view_proj: Mat4, clip_planes: &[Vec4]) -> Self {
        let mut planes = [[0.0; 4]; MAX_CLIP_PLANES];
        let count = clip_planes.len().min(MAX_CLIP_PLANES);
        for (slot, plane) in planes.iter_mut().zip(clip_planes.iter()) {
            *slot = plane.to_array();
        }
        Self { view_proj: view_proj.to_cols_array_2d(), planes, plane_count: [count as u32, 0, 0, 0] }
    }
}

/// Opaque model geometry, discarded on the cut side of every active section plane.
pub(super) struct MeshPass {
    pipeline: wgpu::RenderPipeline,
    globals_buf: wgpu::Buffer,
    globals_bg: wgpu::BindGroup,
    vertex_buffer: Option<wgpu::Buffer>,
    vertex_capacity: usize,
    vertex_count: u32,
    uploaded_revision: Option<u64>,
}

impl MeshPass {
    pub fn new(device: &wgpu::Device, surface_format: wgpu::TextureFormat) -> Result<Self> {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Section Mesh Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("../../assets/shaders/section_mesh.wgsl").into()),
        });
        let globals_bgl = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Section Mesh Globals BGL"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });
        let globals_buf = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Section Mesh Globals"),
            size: std::mem::size_of::<MeshGlobals>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let globals_bg = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Section Mesh Globals BG"),
            layout: &globals_bgl,
            entries: &[wgpu::BindGroupEntry { binding: 0, resource: globals_buf.as_entire_binding() }],
        });
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Section Mesh Pipeline Layout"),
            bind_group_layouts: &[&globals_bgl],
            push_constant_ranges: &[],
        });
        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Section Mesh Pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                buffers: &[ColorVertex::layout()],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: surface_format,
                    blend: Some(wgpu::BlendState::REPLACE),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                cull_mode: None,
                ..Default::default()
            },
            depth_stencil: Some(wgpu::DepthStencilState {
                format: DEPTH_FORMAT,
                depth_write_enabled: true,
                depth_compare: wgpu::CompareFunction::Less,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });
        Ok(Self {
            pipeline,
            globals_buf,
            globals_bg,
            vertex_buffer: None,
            vertex_capacity: 0,
            vertex_count: 0,
            uploaded_revision: None,
        })
    }

    pub fn write_globals(&self, queue: &wgpu::Queue, view_proj: Mat4, clip_planes: &[Vec4]) {
        queue.write_buffer(&self.globals_buf, 0, bytemuck::bytes_of(&MeshGlobals::new(view_proj, clip_planes)));
    }

    /// Uploads model triangles unless this revision is already resident.
    pub fn upload(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        vertices: &[ColorVertex],
        revision: u64,
    ) -> Result<()> {
        if self.uploaded_revision == Some(revision) {
            return Ok(());
        }
        self.vertex_count = vertices.len() as u32;
        self.uploaded_revision = Some(revision);
        if vertices.is_empty() {
            return Ok(());
        }
        ensure_capacity(device, &mut self.vertex_buffer, &mut self.vertex_capacity, vertices.len(), "Section Mesh VB");
        let buffer = self.vertex_buffer.as_ref().context("Mesh vertex buffer missing")?;
        queue.write_buffer(buffer, 0, bytemuck::cast_slice(vertices));
        Ok(())
    }

    pub fn encode(&self, pass: &mut wgpu::RenderPass<'_>) {
        let Some(buffer) = self.vertex_buffer.as_ref() else {
            return;
        };
        if self.vertex_count == 0 {
            return;
        }
        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, &self.globals_bg, &[]);
        pass.set_vertex_buffer(0, buffer.slice(..));
        pass.draw(0..self.vertex_count, 0..1);
    }
}

/// Grows `buffer` geometrically until it holds `count` vertices.
pub(super) fn ensure_capacity(
    device: &wgpu::Device,
    buffer: &mut Option<wgpu::Buffer>,
    capacity: &mut usize,
    count: usize,
    label: &str,
) {
    let required = count.max(1);
    if *capacity >= required && buffer.is_some() {
        return;
    }
    let mut new_cap = (*capacity).max(256);
    while new_cap < required {
        new_cap *= 2;
    }
    *buffer = Some(device.create_buffer(&wgpu::BufferDescriptor {
        label: Some(label),
        size: (new_cap * std::mem::size_of::<ColorVertex>()) as u64,
        usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    }));
    *capacity = new_cap;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn globals_cap_plane_count() {
        let planes = vec![Vec4::new(0.0, 1.0, 0.0, -2.0); MAX_CLIP_PLANES + 3];
        let globals = MeshGlobals::new(Mat4::IDENTITY, &planes);
        assert_eq!(globals.plane_count[0], MAX_CLIP_PLANES as u32);
        assert_eq!(globals.planes[0], [0.0, 1.0, 0.0, -2.0]);
    }

    #[test]
    fn globals_layout_is_uniform_friendly() {
        assert_eq!(std::mem::size_of::<MeshGlobals>() % 16, 0);
    }
}

use anyhow::{Context, Result};
use glam::Mat4;

use super::mesh_pass::ensure_capacity;
use super::{ColorVertex, DEPTH_FORMAT};

#[repr(C)]
#[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
struct OverlayGlobals {
    view_proj: [[f32; 4]; 4],
}

struct VertexStream {
    label: &'static str,
    buffer: Option<wgpu::Buffer>,
    capacity: usize,
    count: u32,
}

impl VertexStream {
    fn new(label: &'static str) -> Self {
        Self { label, buffer: None, capacity: 0, count: 0 }
    }

    fn upload(&mut self, device: &wgpu::Device, queue: &wgpu::Queue, vertices: &[ColorVertex]) -> Result<()> {
        self.count = vertices.len() as u32;
        if vertices.is_empty() {
            return Ok(());
        }
        ensure_capacity(device, &mut self.buffer, &mut self.capacity, vertices.len(), self.label);
        let buffer = self.buffer.as_ref().with_context(|| format!("{} missing", self.label))?;
        queue.write_buffer(buffer, 0, bytemuck::cast_slice(vertices));
        Ok(())
    }

    fn draw(&self, pass: &mut wgpu::RenderPass<'_>) {
        if self.count == 0 {
            return;
        }
        if let Some(buffer) = self.buffer.as_ref() {
            pass.set_vertex_buffer(0, buffer.slice(..));
            pass.draw(0..self.count, 0..1);
        }
    }
}

/// Cut edges, section plane quads, caps and the screen-space countdown ring. World geometry
/// uses the camera matrix; screen geometry arrives in NDC and uses identity.
pub(super) struct LinePass {
    line_pipeline: wgpu::RenderPipeline,
    fill_pipeline: wgpu::RenderPipeline,
    world_buf: wgpu::Buffer,
    world_bg: wgpu::BindGroup,
    screen_bg: wgpu::BindGroup,
    world_lines: VertexStream,
    world_overlays: VertexStream,
    screen_lines: VertexStream,
}

impl LinePass {
    pub fn new(device: &wgpu::Device, queue: &wgpu::Queue, surface_format: wgpu::TextureFormat) -> Result<Self> {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Section Overlay Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("../../assets/shaders/section_lines.wgsl").into()),
        });
        let globals_bgl = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Section Overlay Globals BGL"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });
        let globals_size = std::mem::size_of::<OverlayGlobals>() as u64;
        let world_buf = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Section Overlay World Globals"),
            size: globals_size,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let screen_buf = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Section Overlay Screen Globals"),
            size: globals_size,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        queue.write_buffer(
            &screen_buf,
            0,
            bytemuck::bytes_of(&OverlayGlobals { view_proj: Mat4::IDENTITY.to_cols_array_2d() }),
        );
        let world_bg = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Section Overlay World BG"),
            layout: &globals_bgl,
            entries: &[wgpu::BindGroupEntry { binding: 0, resource: world_buf.as_entire_binding() }],
        });
        let screen_bg = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Section Overlay Screen BG"),
            layout: &globals_bgl,
            entries: &[wgpu::BindGroupEntry { binding: 0, resource: screen_buf.as_entire_binding() }],
        });
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Section Overlay Pipeline Layout"),
            bind_group_layouts: &[&globals_bgl],
            push_constant_ranges: &[],
        });
        let build = |label: &str, topology: wgpu::PrimitiveTopology| {
            device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some(label),
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
                        blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                }),
                primitive: wgpu::PrimitiveState { topology, cull_mode: None, ..Default::default() },
                depth_stencil: Some(wgpu::DepthStencilState {
                    format: DEPTH_FORMAT,
                    depth_write_enabled: false,
                    depth_compare: wgpu::CompareFunction::LessEqual,
                    stencil: wgpu::StencilState::default(),
                    bias: wgpu::DepthBiasState::default(),
                }),
                multisample: wgpu::MultisampleState::default(),
                multiview: None,
                cache: None,
            })
        };
        let line_pipeline = build("Section Overlay Line Pipeline", wgpu::PrimitiveTopology::LineList);
        let fill_pipeline = build("Section Overlay Fill Pipeline", wgpu::PrimitiveTopology::TriangleList);
        Ok(Self {
            line_pipeline,
            fill_pipeline,
            world_buf,
            world_bg,
            screen_bg,
            world_lines: VertexStream::new("Section Overlay Lines VB"),
            world_overlays: VertexStream::new("Section Overlay Fills VB"),
            screen_lines: VertexStream::new("Section Overlay Screen VB"),
        })
    }

    pub fn prepare(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        view_proj: Mat4,
        world_lines: &[ColorVertex],
        world_overlays: &[ColorVertex],
        screen_lines: &[ColorVertex],
    ) -> Result<()> {
        queue.write_buffer(
            &self.world_buf,
            0,
            bytemuck::bytes_of(&OverlayGlobals { view_proj: view_proj.to_cols_array_2d() }),
        );
        self.world_lines.upload(device, queue, world_lines)?;
        self.world_overlays.upload(device, queue, world_overlays)?;
        self.screen_lines.upload(device, queue, screen_lines)?;
        Ok(())
    }

    pub fn encode(&self, pass: &mut wgpu::RenderPass<'_>) {
        pass.set_pipeline(&self.fill_pipeline);
        pass.set_bind_group(0, &self.world_bg, &[]);
        self.world_overlays.draw(pass);

        pass.set_pipeline(&self.line_pipeline);
        self.world_lines.draw(pass);

        pass.set_bind_group(0, &self.screen_bg, &[]);
        self.screen_lines.draw(pass);
    }
}

use anyhow::{Context, Result};
use winit::dpi::PhysicalSize;

use super::line_pass::LinePass;
use super::mesh_pass::MeshPass;
use super::window_surface::WindowSurface;
use super::{FrameScene, RenderBackend, RenderTarget};
use crate::container::{ContainerLayer, ViewportContainer};

/// Creates wgpu targets bound to the container's window.
#[derive(Debug, Clone, Copy)]
pub struct WgpuBackend {
    vsync: bool,
}

impl WgpuBackend {
    pub fn new(vsync: bool) -> Self {
        Self { vsync }
    }
}

impl RenderBackend for WgpuBackend {
    fn create_target(&self, label: &str) -> Box<dyn RenderTarget> {
        Box::new(WgpuTarget {
            label: label.to_string(),
            surface: WindowSurface::new(self.vsync),
            mesh_pass: None,
            line_pass: None,
        })
    }
}

struct WgpuTarget {
    label: String,
    surface: WindowSurface,
    mesh_pass: Option<MeshPass>,
    line_pass: Option<LinePass>,
}

impl WgpuTarget {
    fn layer(&self) -> ContainerLayer {
        ContainerLayer::Surface { owner: self.label.clone() }
    }
}

impl RenderTarget for WgpuTarget {
    fn label(&self) -> &str {
        &self.label
    }

    fn is_attached(&self) -> bool {
        self.surface.is_attached()
    }

    fn attach(&mut self, container: &mut ViewportContainer) -> Result<()> {
        if self.surface.is_attached() {
            anyhow::bail!("render target '{}' is already attached", self.label);
        }
        let window = container.window().context("viewport container has no window")?.clone();
        self.surface.attach(&window)?;
        let built = (|| -> Result<(MeshPass, LinePass)> {
            let (device, queue) = self.surface.device_and_queue()?;
            let format = self.surface.surface_format()?;
            Ok((MeshPass::new(device, format)?, LinePass::new(device, queue, format)?))
        })();
        match built {
            Ok((mesh_pass, line_pass)) => {
                self.mesh_pass = Some(mesh_pass);
                self.line_pass = Some(line_pass);
            }
            Err(err) => {
                self.surface.detach();
                return Err(err.context(format!("failed to build passes for '{}'", self.label)));
            }
        }
        container.push_layer(self.layer());
        tracing::debug!(owner = %self.label, "render target attached");
        Ok(())
    }

    fn detach(&mut self, container: &mut ViewportContainer) {
        if !self.surface.is_attached() {
            return;
        }
        self.mesh_pass = None;
        self.line_pass = None;
        self.surface.detach();
        container.remove_layer(&self.layer());
        tracing::debug!(owner = %self.label, "render target detached");
    }

    fn resize(&mut self, size: PhysicalSize<u32>) {
        self.surface.resize(size);
    }

    fn render(&mut self, scene: &FrameScene<'_>) -> Result<()> {
        let frame = self.surface.acquire_surface_frame()?;
        let (device, queue) = self.surface.device_and_queue()?;
        let depth_view = self.surface.depth_view()?;
        let mesh_pass = self.mesh_pass.as_mut().context("mesh pass missing")?;
        let line_pass = self.line_pass.as_mut().context("overlay pass missing")?;

        mesh_pass.write_globals(queue, scene.view_proj, scene.clip_planes);
        mesh_pass.upload(device, queue, scene.triangles, scene.triangles_revision)?;
        line_pass.prepare(
            device,
            queue,
            scene.view_proj,
            scene.world_lines,
            scene.world_overlays,
            scene.screen_lines,
        )?;

        let [r, g, b, a] = scene.clear_color;
        let mut encoder =
            device.create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some("Viewer Encoder") });
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Viewer Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: frame.view(),
                    depth_slice: None,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color {
                            r: r as f64,
                            g: g as f64,
                            b: b as f64,
                            a: a as f64,
                        }),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: depth_view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                occlusion_query_set: None,
                timestamp_writes: None,
            });
            mesh_pass.encode(&mut pass);
            line_pass.encode(&mut pass);
        }
        queue.submit(Some(encoder.finish()));
        frame.present();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attach_without_window_fails_and_leaves_container_empty() {
        let backend = WgpuBackend::new(true);
        let mut target = backend.create_target("inspection");
        let mut container = ViewportContainer::headless(PhysicalSize::new(640, 480));
        assert!(target.attach(&mut container).is_err());
        assert!(!target.is_attached());
        assert!(container.is_empty());
    }

    #[test]
    fn render_before_attach_fails() {
        let backend = WgpuBackend::new(false);
        let mut target = backend.create_target("project");
        let scene = FrameScene::empty(glam::Mat4::IDENTITY, [0.0; 4]);
        assert!(target.render(&scene).is_err());
    }
}

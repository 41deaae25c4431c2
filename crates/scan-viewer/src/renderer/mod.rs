//! GPU backend of the scene. Owns the context, the depth target, every
//! pipeline and the per-asset buffers installed by the scene manager.

pub mod context;
pub mod pipelines;
pub mod targets;

use self::{
    context::GfxContext,
    pipelines::{
        glow::GlowPipeline,
        grid::GridPipeline,
        hex_to_linear,
        markers::{MarkerGpu, MarkerPipeline},
        points::{CloudGpu, PointsPipeline, POINT_SIZE},
        srgb_to_linear, SceneBindings,
    },
    targets::DepthTarget,
};
use crate::{
    camera::Camera,
    data::{types::SceneUniformStd140, GlowInstance, MarkerInstance, PointCloud},
    markers::GLOW_SIZE_PX,
    scene::RenderBackend,
};
use glam::{Mat4, Vec3};
use std::sync::Arc;
use winit::window::Window;

pub const BACKGROUND: u32 = 0x0b0b0b;
pub const AMBIENT: u32 = 0x808080;
/// Direction towards the key light.
pub const LIGHT_FROM: Vec3 = Vec3::new(1.0, 1.0, 1.0);

pub struct Renderer {
    pub gfx: GfxContext,
    depth: DepthTarget,
    scene: SceneBindings,
    points: PointsPipeline,
    markers: MarkerPipeline,
    glow: GlowPipeline,
    grid: GridPipeline,
    pub egui_renderer: egui_wgpu::Renderer,

    cloud: Option<CloudGpu>,
    marker_gpu: Option<MarkerGpu>,
    released: bool,
}

impl Renderer {
    pub async fn new(window: Arc<Window>) -> anyhow::Result<Self> {
        let gfx = GfxContext::new(window).await?;
        let color_fmt = gfx.config.format;
        let depth = DepthTarget::new(&gfx.device, gfx.config.width, gfx.config.height);

        let scene = SceneBindings::new(&gfx.device);
        let points = PointsPipeline::new(&gfx.device, &scene.layout, color_fmt, depth.format);
        let markers = MarkerPipeline::new(&gfx.device, &scene.layout, color_fmt, depth.format);
        let glow = GlowPipeline::new(&gfx.device, &gfx.queue, &scene.layout, color_fmt, depth.format);
        let grid = GridPipeline::new(&gfx.device, &scene.layout, color_fmt, depth.format);

        let egui_renderer = egui_wgpu::Renderer::new(&gfx.device, color_fmt, None, 1);

        Ok(Self {
            gfx,
            depth,
            scene,
            points,
            markers,
            glow,
            grid,
            egui_renderer,
            cloud: None,
            marker_gpu: None,
            released: false,
        })
    }

    fn scene_uniform(&self, camera: &Camera, world: Mat4) -> SceneUniformStd140 {
        SceneUniformStd140 {
            view_proj: camera.view_proj().to_cols_array_2d(),
            world: world.to_cols_array_2d(),
            viewport_size: self.gfx.viewport(),
            point_size: POINT_SIZE,
            glow_size_px: GLOW_SIZE_PX,
            light_dir: LIGHT_FROM.normalize().to_array(),
            ambient: hex_to_linear(AMBIENT)[0],
            camera_pos: camera.position.to_array(),
            _pad0: 0.0,
        }
    }

    /// Draws grid, cloud, marker spheres and glows into `swap_view`.
    pub fn render(&mut self, swap_view: &wgpu::TextureView, camera: &Camera, world: Mat4) {
        if self.released {
            return;
        }

        self.scene
            .write(&self.gfx.queue, &self.scene_uniform(camera, world));

        let mut encoder = self
            .gfx
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Frame Encoder"),
            });

        let bg = srgb_to_linear(((BACKGROUND >> 16) & 0xff) as f32 / 255.0) as f64;

        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Scene Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: swap_view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color {
                            r: bg,
                            g: bg,
                            b: bg,
                            a: 1.0,
                        }),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.depth.view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            let scene = &self.scene.bind_group;
            self.grid.draw(&mut pass, scene);

            if let Some(cloud) = &self.cloud {
                self.points.draw(&mut pass, scene, cloud);
            }

            // Glows last: additive and unoccluded.
            if let Some(markers) = &self.marker_gpu {
                self.markers.draw(&mut pass, scene, markers);
                self.glow.draw(&mut pass, scene, markers);
            }
        }

        self.gfx.queue.submit(std::iter::once(encoder.finish()));
    }

    /// Paints tessellated egui output on top of the frame.
    pub fn render_ui(
        &mut self,
        swap_view: &wgpu::TextureView,
        shapes: &[egui::ClippedPrimitive],
        textures_delta: &egui::TexturesDelta,
        pixels_per_point: f32,
    ) {
        if self.released {
            return;
        }

        let screen_descriptor = egui_wgpu::ScreenDescriptor {
            size_in_pixels: [self.gfx.config.width, self.gfx.config.height],
            pixels_per_point,
        };

        let mut encoder = self
            .gfx
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("UI Encoder"),
            });

        for (id, delta) in &textures_delta.set {
            self.egui_renderer
                .update_texture(&self.gfx.device, &self.gfx.queue, *id, delta);
        }

        self.egui_renderer.update_buffers(
            &self.gfx.device,
            &self.gfx.queue,
            &mut encoder,
            shapes,
            &screen_descriptor,
        );

        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("EGUI Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: swap_view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Load,
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            self.egui_renderer
                .render(&mut render_pass, shapes, &screen_descriptor);
        }

        for id in &textures_delta.free {
            self.egui_renderer.free_texture(id);
        }

        self.gfx.queue.submit(std::iter::once(encoder.finish()));
    }

    pub fn is_released(&self) -> bool {
        self.released
    }
}

impl RenderBackend for Renderer {
    fn install_point_cloud(&mut self, cloud: &PointCloud) {
        debug_assert!(self.cloud.is_none(), "point cloud installed over a live one");
        self.cloud = Some(CloudGpu::upload(&self.gfx.device, cloud));
    }

    fn release_point_cloud(&mut self) {
        if let Some(cloud) = self.cloud.take() {
            cloud.release();
        }
    }

    fn rebuild_markers(&mut self, instances: &[MarkerInstance], glows: &[GlowInstance]) {
        self.release_markers();
        self.marker_gpu = MarkerGpu::upload(&self.gfx.device, instances, glows);
    }

    fn rescale_markers(&mut self, instances: &[MarkerInstance]) {
        if let Some(gpu) = &self.marker_gpu {
            if !gpu.rewrite(&self.gfx.queue, instances) {
                log::warn!(
                    "Marker rescale with {} instances against {} allocated; skipped",
                    instances.len(),
                    gpu.len
                );
            }
        }
    }

    fn release_markers(&mut self) {
        if let Some(gpu) = self.marker_gpu.take() {
            gpu.release();
        }
    }

    fn resize(&mut self, width: u32, height: u32) {
        if self.released || width == 0 || height == 0 {
            return;
        }
        self.gfx.resize(width, height);
        self.depth.resize(&self.gfx.device, width, height);
    }

    fn release_all(&mut self) {
        if self.released {
            return;
        }
        self.release_point_cloud();
        self.release_markers();
        self.glow.release();
        self.markers.release();
        self.grid.release();
        self.depth.release();
        self.gfx.detach_surface();
        self.released = true;
    }
}

use crate::{
    config::Config,
    render_loop::RenderLoop,
    renderer::Renderer,
    scene::SceneManager,
    ui::{self, HudState},
};
use anyhow::Result;
use std::sync::Arc;
use winit::{event::WindowEvent, window::Window};

pub struct App {
    pub scene: SceneManager<Renderer>,
    pub render_loop: RenderLoop,
    pub egui_ctx: egui::Context,
    pub egui_state: egui_winit::State,
}

impl App {
    pub async fn new(window: Arc<Window>, config: &Config) -> Result<Self> {
        let renderer = Renderer::new(window.clone()).await?;
        let size = renderer.gfx.size;

        let scene = SceneManager::new(renderer, config.scene_settings((size.width, size.height)));
        let render_loop = RenderLoop::new(scene.stop_flag());

        let egui_ctx = egui::Context::default();
        let egui_state = egui_winit::State::new(
            egui_ctx.clone(),
            egui_ctx.viewport_id(),
            &*window,
            None,
            None,
        );

        Ok(Self {
            scene,
            render_loop,
            egui_ctx,
            egui_state,
        })
    }

    /// Kicks off the configured asset loads.
    pub fn start_loads(&mut self, config: &Config) {
        self.scene
            .load_scene(config.ply_url.as_deref(), config.points_url.as_deref());
    }

    pub fn resize(&mut self, new_size: winit::dpi::PhysicalSize<u32>) {
        self.render_loop
            .resize(&mut self.scene, new_size.width, new_size.height);
    }

    /// Returns true when egui consumed the event.
    pub fn handle_event(&mut self, window: &Window, event: &WindowEvent) -> bool {
        let response = self.egui_state.on_window_event(window, event);
        if response.consumed {
            return true;
        }

        self.scene.handle_window_event(event);

        if let WindowEvent::Resized(physical_size) = event {
            self.resize(*physical_size);
        }

        false
    }

    /// Runs one frame. `Ok(false)` once the scene has been disposed.
    pub fn frame(&mut self, window: &Window) -> Result<bool, wgpu::SurfaceError> {
        let egui_ctx = &self.egui_ctx;
        let egui_state = &mut self.egui_state;

        match self
            .render_loop
            .frame(&mut self.scene, |scene, _dt| draw_frame(scene, egui_ctx, egui_state, window))
        {
            Some(result) => result.map(|()| true),
            None => Ok(false),
        }
    }

    pub fn reconfigure_surface(&mut self) {
        self.scene.backend().gfx.reconfigure();
    }

    pub fn shutdown(&mut self) {
        self.scene.dispose();
    }
}

fn draw_frame(
    scene: &mut SceneManager<Renderer>,
    egui_ctx: &egui::Context,
    egui_state: &mut egui_winit::State,
    window: &Window,
) -> Result<(), wgpu::SurfaceError> {
    // UI first so a slider change lands in this frame's markers.
    let egui_input = egui_state.take_egui_input(window);
    egui_ctx.begin_frame(egui_input);

    let new_scale = {
        let hud = HudState {
            cloud: scene.cloud_state(),
            markers: scene.marker_state(),
            loading: scene.is_loading(),
            points: scene.point_count(),
            marker_count: scene.markers().len(),
        };
        ui::draw_hud(egui_ctx, &hud, scene.marker_scale())
    };

    let egui_output = egui_ctx.end_frame();
    egui_state.handle_platform_output(window, egui_output.platform_output);

    if let Some(scale) = new_scale {
        scene.set_scale(scale);
    }

    let frame = scene.backend().gfx.current_frame()?;
    let swap_view = frame
        .texture
        .create_view(&wgpu::TextureViewDescriptor::default());

    let camera = scene.camera().clone();
    let world = scene.world();
    let renderer = scene.backend_mut();
    renderer.render(&swap_view, &camera, world);

    let pixels_per_point = egui_ctx.pixels_per_point();
    let shapes = egui_ctx.tessellate(egui_output.shapes, pixels_per_point);
    renderer.render_ui(
        &swap_view,
        &shapes,
        &egui_output.textures_delta,
        pixels_per_point,
    );

    frame.present();
    Ok(())
}

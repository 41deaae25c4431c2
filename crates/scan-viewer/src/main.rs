//! Entry point for the scan viewer.

use anyhow::Result;
use clap::Parser;
use scan_viewer::{app::App, config::Config};
use std::sync::Arc;
use winit::{
    event::{Event, WindowEvent},
    event_loop::{ControlFlow, EventLoop},
    keyboard::{KeyCode, PhysicalKey},
    window::WindowBuilder,
};

fn main() -> Result<()> {
    // Default to "info" if RUST_LOG is unset.
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = Config::parse();
    log::info!("Starting scan viewer: {:?}", config);

    let event_loop = EventLoop::new()?;
    let window = Arc::new(
        WindowBuilder::new()
            .with_title("Scan Viewer")
            .with_inner_size(winit::dpi::LogicalSize::new(
                config.width.max(1),
                config.height.max(1),
            ))
            .build(&event_loop)?,
    );

    let mut app = pollster::block_on(App::new(window.clone(), &config))?;
    app.start_loads(&config);

    event_loop.run(move |event, elwt| {
        elwt.set_control_flow(ControlFlow::Poll);

        match event {
            Event::WindowEvent { window_id, event } if window_id == window.id() => {
                if app.handle_event(&window, &event) {
                    return;
                }
                match event {
                    WindowEvent::CloseRequested => {
                        app.shutdown();
                        elwt.exit();
                    }
                    WindowEvent::KeyboardInput { event, .. } => {
                        if event.physical_key == PhysicalKey::Code(KeyCode::Escape) {
                            app.shutdown();
                            elwt.exit();
                        }
                    }
                    WindowEvent::RedrawRequested => match app.frame(&window) {
                        Ok(true) => {}
                        Ok(false) => elwt.exit(),
                        Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                            app.reconfigure_surface();
                        }
                        Err(wgpu::SurfaceError::OutOfMemory) => {
                            log::error!("WGPU out of memory – exiting.");
                            app.shutdown();
                            elwt.exit();
                        }
                        Err(e) => log::error!("Render error: {:?}", e),
                    },
                    _ => {}
                }
            }
            Event::AboutToWait => {
                window.request_redraw();
            }
            Event::LoopExiting => {
                app.shutdown();
            }
            _ => {}
        }
    })?;

    Ok(())
}

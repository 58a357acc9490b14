//! Platform layer: configuration, scene assembly, model loading and the
//! winit event loop.

pub mod app;
pub mod assembly;
pub mod config;
pub mod loader;

use anyhow::{Context, Result};
use winit::event_loop::{ControlFlow, EventLoop};

pub use app::App;
pub use config::AppConfig;

/// Open the viewer window and block until it is closed.
pub fn run(config: AppConfig) -> Result<()> {
    let event_loop = EventLoop::new().context("Failed to create event loop")?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = App::new(config);
    event_loop
        .run_app(&mut app)
        .context("Event loop error")?;

    match app.take_fatal() {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

//! Window, input and the render loop.

use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use anyhow::anyhow;
use corelib::{Vec2, camera::Camera, orbit::OrbitControls, scene::Scene};
use renderer::GpuState;
use winit::{
    application::ApplicationHandler,
    dpi::{PhysicalPosition, PhysicalSize},
    event::{ElementState, MouseButton, MouseScrollDelta, WindowEvent},
    event_loop::ActiveEventLoop,
    window::{Window, WindowId},
};

use crate::{
    assembly::{PreparedModel, attach_nodes, populate_base_scene},
    config::{AppConfig, WINDOW_TITLE},
    loader::{PendingModel, spawn_model_load},
};

/// Pixel-delta wheel events per line step.
const PIXELS_PER_WHEEL_STEP: f32 = 50.0;

#[derive(Default)]
struct PointerState {
    rotating: bool,
    panning: bool,
    last: Option<Vec2>,
}

/// Frames counted over one-second windows.
struct FpsCounter {
    frames: u32,
    since: Instant,
}

impl FpsCounter {
    fn new() -> Self {
        Self {
            frames: 0,
            since: Instant::now(),
        }
    }

    /// Returns the rate once per elapsed second.
    fn tick(&mut self) -> Option<f32> {
        self.frames += 1;
        let elapsed = self.since.elapsed();
        if elapsed < Duration::from_secs(1) {
            return None;
        }
        let fps = self.frames as f32 / elapsed.as_secs_f32();
        self.frames = 0;
        self.since = Instant::now();
        Some(fps)
    }
}

pub struct App {
    config: AppConfig,
    window: Option<Arc<Window>>,
    gpu: Option<GpuState>,
    scene: Scene,
    camera: Camera,
    orbit: OrbitControls,
    pending: Option<PendingModel>,
    pointer: PointerState,
    fps: FpsCounter,
    fatal: Option<anyhow::Error>,
}

impl App {
    pub fn new(config: AppConfig) -> Self {
        let camera = Camera::z_up(config.fov_rad(), config.aspect());
        let orbit = OrbitControls::new(camera.target);
        Self {
            config,
            window: None,
            gpu: None,
            scene: Scene::new(),
            camera,
            orbit,
            pending: None,
            pointer: PointerState::default(),
            fps: FpsCounter::new(),
            fatal: None,
        }
    }

    /// Error that stopped the event loop, if any.
    pub fn take_fatal(&mut self) -> Option<anyhow::Error> {
        self.fatal.take()
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, err: anyhow::Error) {
        log::error!("{err:#}");
        self.fatal = Some(err);
        event_loop.exit();
    }

    /// Phase 0: window, GPU, camera, base scene and the loader thread.
    fn init(&mut self, event_loop: &ActiveEventLoop) -> anyhow::Result<()> {
        let attrs = Window::default_attributes()
            .with_title(WINDOW_TITLE)
            .with_inner_size(PhysicalSize::new(self.config.width, self.config.height));
        let window = Arc::new(event_loop.create_window(attrs)?);
        let PhysicalSize { width, height } = window.inner_size();
        log::info!("Window created: {width}x{height}");

        let gpu = pollster::block_on(GpuState::new(
            window.clone(),
            &self.config.renderer_options(),
        ))?;

        self.camera = Camera::z_up(
            self.config.fov_rad(),
            width.max(1) as f32 / height.max(1) as f32,
        );
        self.orbit = OrbitControls::new(self.camera.target);
        populate_base_scene(&mut self.scene, self.config.material);

        self.pending = Some(spawn_model_load(self.config.clone()));
        self.window = Some(window);
        self.gpu = Some(gpu);
        Ok(())
    }

    /// Phase 1, render-thread half: frame the camera, upload, append nodes.
    fn attach_model(&mut self, prepared: PreparedModel) {
        let Some(gpu) = self.gpu.as_mut() else {
            return;
        };
        self.camera.apply_framing(&prepared.framing);
        self.orbit.target = prepared.framing.target;
        log::info!(
            "Camera framed: eye {:?}, target {:?}",
            prepared.framing.eye,
            prepared.framing.target
        );

        match gpu.upload_mesh(&prepared.mesh, &prepared.material) {
            Ok(handle) => {
                attach_nodes(&mut self.scene, handle, &prepared.framing);
            }
            Err(err) => log::error!("Model not attached: {err}"),
        }
    }

    fn poll_model(&mut self) {
        let Some(outcome) = self.pending.as_mut().and_then(PendingModel::poll) else {
            return;
        };
        match outcome {
            Ok(prepared) => self.attach_model(prepared),
            Err(err) => log::error!("Model loading failed: {err:#}"),
        }
    }

    fn redraw(&mut self, event_loop: &ActiveEventLoop) {
        self.poll_model();
        self.orbit.update(&mut self.camera);

        let Some(gpu) = self.gpu.as_mut() else {
            return;
        };
        match gpu.render(&self.scene, &self.camera) {
            Ok(()) => {}
            Err(err) if GpuState::is_surface_lost(&err) => {
                log::warn!("Surface {err:?}; reconfiguring");
                gpu.recreate_surface();
            }
            Err(wgpu::SurfaceError::Timeout) => {
                log::warn!("Surface timeout; skipping frame");
            }
            Err(err) => {
                self.fail(event_loop, anyhow!("Render failed: {err:?}"));
                return;
            }
        }

        if self.config.show_fps {
            if let (Some(fps), Some(window)) = (self.fps.tick(), &self.window) {
                window.set_title(&format!("{WINDOW_TITLE} | {fps:.0} FPS"));
            }
        }
    }

    fn viewport_height(&self) -> f32 {
        self.gpu.as_ref().map_or(1.0, |gpu| gpu.size().1 as f32)
    }

    fn cursor_moved(&mut self, position: PhysicalPosition<f64>) {
        let pos = Vec2::new(position.x as f32, position.y as f32);
        let delta = self.pointer.last.map_or(Vec2::ZERO, |last| pos - last);
        self.pointer.last = Some(pos);

        let height = self.viewport_height();
        if self.pointer.rotating {
            self.orbit.rotate(delta, height);
        } else if self.pointer.panning {
            self.orbit.pan(delta, &self.camera, height);
        }
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }
        if let Err(err) = self.init(event_loop) {
            self.fail(event_loop, err.context("Startup failed"));
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => {
                log::info!("Close requested. Exiting event loop.");
                event_loop.exit();
            }

            WindowEvent::Resized(size) => {
                if let Some(gpu) = &mut self.gpu {
                    gpu.resize(size.width, size.height);
                    if self.config.track_resize {
                        self.camera.aspect = size.width.max(1) as f32 / size.height.max(1) as f32;
                    }
                }
            }

            WindowEvent::MouseInput { state, button, .. } => {
                let pressed = state == ElementState::Pressed;
                match button {
                    MouseButton::Left => self.pointer.rotating = pressed,
                    MouseButton::Right => self.pointer.panning = pressed,
                    _ => {}
                }
            }

            WindowEvent::CursorMoved { position, .. } => self.cursor_moved(position),

            WindowEvent::CursorLeft { .. } => self.pointer.last = None,

            WindowEvent::MouseWheel { delta, .. } => {
                let steps = match delta {
                    MouseScrollDelta::LineDelta(_, y) => y,
                    MouseScrollDelta::PixelDelta(pos) => pos.y as f32 / PIXELS_PER_WHEEL_STEP,
                };
                self.orbit.zoom(steps);
            }

            WindowEvent::RedrawRequested => self.redraw(event_loop),

            _ => {}
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(window) = &self.window {
            window.request_redraw();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fps_counter_waits_a_second() {
        let mut fps = FpsCounter::new();
        assert!(fps.tick().is_none());
        fps.since -= Duration::from_secs(2);
        let rate = fps.tick().unwrap();
        assert!(rate > 0.0 && rate <= 1.0);
        assert_eq!(fps.frames, 0);
    }

    #[test]
    fn new_app_uses_configured_projection() {
        let config = AppConfig {
            fov_deg: 60.0,
            width: 800,
            height: 400,
            ..Default::default()
        };
        let app = App::new(config);
        assert_eq!(app.camera.aspect, 2.0);
        assert!((app.camera.fov_y_rad - 60f32.to_radians()).abs() < 1e-6);
        assert_eq!(app.orbit.target, app.camera.target);
        assert!(app.scene.is_empty());
    }
}

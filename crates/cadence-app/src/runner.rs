//! Application runner and event loop.

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use cadence_core::Extent2d;
use cadence_frame::FrameError;
use cadence_gpu::GpuContextBuilder;
use raw_window_handle::HasDisplayHandle;
use tracing::{error, info, trace, warn};
use winit::application::ApplicationHandler;
use winit::dpi::PhysicalSize;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::window::{Window, WindowId};

use crate::config::AppConfig;
use crate::context::AppContext;
use crate::logging::init_logging;
use crate::renderer::{Renderer, RendererScene};

/// Run a [`Renderer`] with the given configuration.
///
/// Initializes logging, creates the window, GPU context and frame driver, and
/// runs the event loop until the window is closed or the device is lost.
pub fn run_app<R: Renderer + 'static>(config: AppConfig) -> anyhow::Result<()> {
    init_logging(&config.log)?;
    config.frame.validate()?;

    info!("{} starting...", config.title);

    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut runner = AppRunner::<R> {
        config,
        state: None,
        failure: None,
    };
    event_loop.run_app(&mut runner)?;

    if let Some(state) = runner.state.take() {
        state.cleanup();
    }
    runner.failure.map_or(Ok(()), Err)
}

struct AppRunner<R: Renderer> {
    config: AppConfig,
    state: Option<AppState<R>>,
    /// First fatal error; returned from [`run_app`].
    failure: Option<anyhow::Error>,
}

struct AppState<R: Renderer> {
    ctx: AppContext,
    renderer: R,
    target_frame_time: Option<Duration>,
}

impl<R: Renderer + 'static> AppRunner<R> {
    fn create_state(&self, event_loop: &ActiveEventLoop) -> anyhow::Result<AppState<R>> {
        let window_attrs = Window::default_attributes()
            .with_title(&self.config.title)
            .with_inner_size(PhysicalSize::new(self.config.width, self.config.height));
        let window = Arc::new(event_loop.create_window(window_attrs)?);

        let gpu = GpuContextBuilder::new()
            .app_name(&self.config.title)
            .validation(self.config.validation)
            .display(event_loop.display_handle()?.as_raw())
            .build()?;
        info!("GPU: {}", gpu.capabilities().summary());

        // SAFETY: the context owns the window and drops it after the surface
        let mut ctx = unsafe { AppContext::new(window, gpu, &self.config.frame)? };
        let renderer = R::init(&mut ctx)?;

        let target_frame_time = self
            .config
            .target_fps
            .filter(|&fps| fps > 0)
            .map(|fps| Duration::from_secs(1) / fps);

        Ok(AppState {
            ctx,
            renderer,
            target_frame_time,
        })
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, err: anyhow::Error) {
        error!("{err:#}");
        self.failure.get_or_insert(err);
        event_loop.exit();
    }
}

impl<R: Renderer + 'static> ApplicationHandler for AppRunner<R> {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.state.is_some() {
            return;
        }

        match self.create_state(event_loop) {
            Ok(state) => {
                self.state = Some(state);
                info!("Application ready");
            }
            Err(e) => self.fail(event_loop, e.context("failed to initialize application")),
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        if matches!(event, WindowEvent::CloseRequested) {
            info!("Close requested");
            if let Some(state) = self.state.take() {
                state.cleanup();
            }
            event_loop.exit();
            return;
        }

        let result = match (&event, self.state.as_mut()) {
            (WindowEvent::RedrawRequested, Some(state)) => state.render_frame(),
            (WindowEvent::Resized(size), Some(state)) => {
                state.handle_resize(Extent2d::new(size.width, size.height))
            }
            _ => Ok(()),
        };

        if let Err(e) = result {
            self.fail(event_loop, e);
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(state) = &self.state {
            state.ctx.window.request_redraw();
        }
    }
}

impl<R: Renderer> AppState<R> {
    fn render_frame(&mut self) -> anyhow::Result<()> {
        let size = self.ctx.window.inner_size();
        if size.width == 0 || size.height == 0 {
            return Ok(());
        }

        let frame_start = Instant::now();
        let dt = frame_start
            .duration_since(self.ctx.last_frame_time)
            .as_secs_f32();
        self.ctx.last_frame_time = frame_start;

        self.renderer.update(&self.ctx, dt);

        let mut scene = RendererScene(&mut self.renderer);
        match self.ctx.driver.render_frame(&mut scene) {
            Ok(report) => {
                trace!(
                    frame = report.frame_number,
                    slot = report.slot,
                    image_index = report.image_index,
                    fence_target = report.fence_target,
                    "frame presented"
                );
                if report.needs_resize() {
                    self.resize_to_window()?;
                }
            }
            Err(err) if err.is_out_of_date() => self.resize_to_window()?,
            Err(err @ (FrameError::RecordingFailure(_) | FrameError::TimeoutExceeded { .. })) => {
                warn!(%err, "frame dropped");
            }
            Err(err) => return Err(err.into()),
        }

        if let Some(target) = self.target_frame_time {
            let elapsed = frame_start.elapsed();
            if elapsed < target {
                thread::sleep(target - elapsed);
            }
        }

        Ok(())
    }

    fn resize_to_window(&mut self) -> anyhow::Result<()> {
        let size = self.ctx.window.inner_size();
        self.handle_resize(Extent2d::new(size.width, size.height))
    }

    fn handle_resize(&mut self, extent: Extent2d) -> anyhow::Result<()> {
        if extent.is_empty() {
            return Ok(());
        }

        self.ctx.driver.resize(extent)?;
        let actual = self.ctx.extent();
        self.renderer.on_resize(&mut self.ctx, actual)?;
        Ok(())
    }

    /// Drain, destroy the renderer, then tear down in dependency order.
    fn cleanup(self) {
        let Self {
            mut ctx,
            mut renderer,
            ..
        } = self;

        info!("Starting cleanup...");
        if let Err(e) = ctx.driver.drain() {
            error!("Failed to drain frames: {e}");
        }
        if let Err(e) = ctx.gpu.wait_idle() {
            error!("Failed to wait idle: {e}");
        }
        renderer.destroy(&mut ctx);

        let AppContext {
            driver,
            gpu,
            window,
            ..
        } = ctx;
        if let Err(e) = driver.shutdown() {
            error!("Frame driver shutdown failed: {e}");
        }
        drop(gpu);
        drop(window);
        info!("Cleanup complete");
    }
}

//! Application framework for the Cadence frame engine.
//!
//! This crate handles the boilerplate around the frame engine:
//! - Logging setup
//! - Window creation and event loop handling
//! - GPU context, surface and frame driver initialization
//! - Swapchain recreation on resize
//!
//! # Example
//!
//! ```no_run
//! use cadence_app::{run_app, AppConfig, AppContext, Renderer};
//! use cadence_frame::ColorTarget;
//! use cadence_gpu::{VulkanApi, VulkanCommandList};
//!
//! struct Blank;
//!
//! impl Renderer for Blank {
//!     fn init(_ctx: &mut AppContext) -> anyhow::Result<Self> {
//!         Ok(Blank)
//!     }
//!
//!     fn clear_color(&self) -> [f32; 4] {
//!         [0.0, 0.0, 0.0, 1.0]
//!     }
//!
//!     fn render(
//!         &mut self,
//!         _commands: &mut VulkanCommandList,
//!         _target: &ColorTarget<VulkanApi>,
//!     ) -> cadence_frame::Result<()> {
//!         Ok(())
//!     }
//! }
//!
//! fn main() -> anyhow::Result<()> {
//!     run_app::<Blank>(AppConfig::default())
//! }
//! ```

mod config;
mod context;
pub mod logging;
mod renderer;
mod runner;

pub use config::AppConfig;
pub use context::AppContext;
pub use logging::init_logging;
pub use renderer::Renderer;
pub use runner::run_app;

pub use cadence_gpu::{GpuContext, GpuContextBuilder};
pub use winit::event::WindowEvent;

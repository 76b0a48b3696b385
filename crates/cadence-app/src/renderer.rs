//! `Renderer` trait definition.

use cadence_core::Extent2d;
use cadence_frame::{ColorTarget, SceneContent};
use cadence_gpu::{VulkanApi, VulkanCommandList};

use crate::context::AppContext;

/// A renderer variant driven by the runner.
///
/// The runner owns the frame cycle: slot reuse, image acquisition, layout
/// transitions, clearing, submission and presentation. A renderer only creates
/// its own GPU resources and records draw calls into an already cleared target.
pub trait Renderer: Sized {
    /// Create GPU resources.
    ///
    /// Called once, after the window, device and swapchain exist.
    fn init(ctx: &mut AppContext) -> anyhow::Result<Self>;

    /// Advance time-dependent state. `dt` is in seconds.
    #[allow(unused_variables)]
    fn update(&mut self, ctx: &AppContext, dt: f32) {}

    /// Color the frame is cleared to.
    fn clear_color(&self) -> [f32; 4];

    /// Record draw calls for one frame.
    ///
    /// Dynamic rendering is active on `target`, and viewport and scissor cover it.
    fn render(
        &mut self,
        commands: &mut VulkanCommandList,
        target: &ColorTarget<VulkanApi>,
    ) -> cadence_frame::Result<()>;

    /// React to a new swapchain extent. The swapchain is already recreated.
    #[allow(unused_variables)]
    fn on_resize(&mut self, ctx: &mut AppContext, extent: Extent2d) -> anyhow::Result<()> {
        Ok(())
    }

    /// Release GPU resources. Every submitted frame has completed by now.
    #[allow(unused_variables)]
    fn destroy(&mut self, ctx: &mut AppContext) {}
}

/// Presents a [`Renderer`] to the frame driver as scene content.
pub(crate) struct RendererScene<'a, R>(pub &'a mut R);

impl<R: Renderer> SceneContent<VulkanApi> for RendererScene<'_, R> {
    fn clear_color(&self) -> [f32; 4] {
        self.0.clear_color()
    }

    fn draw(
        &mut self,
        commands: &mut VulkanCommandList,
        target: &ColorTarget<VulkanApi>,
    ) -> cadence_frame::Result<()> {
        self.0.render(commands, target)
    }
}

//! Backend seam between the frame engine and a graphics API.
//!
//! A backend implements [`GpuApi`] by naming one concrete type per role. The
//! engine only talks to those types through the traits below, so the same
//! synchronization rules drive the Vulkan backend and the simulated one used in
//! tests.

use std::fmt;
use std::time::Duration;

use cadence_core::Extent2d;

use crate::error::Result;

/// States a swapchain image moves between during a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceState {
    /// Owned by the presentation engine.
    Present,
    /// Bound as a color attachment.
    RenderTarget,
}

/// Family of types making up one graphics backend.
pub trait GpuApi: Sized + 'static {
    /// Monotonic GPU completion counter.
    type Fence: TimelineFence;
    /// The single graphics queue.
    type Queue: GpuQueue<Self>;
    /// Memory backing command lists, reset once per frame.
    type Allocator: CommandAllocator<Self>;
    /// A command list in the recording or closed state.
    type CommandList: CommandList<Self>;
    /// The swapchain and its presentation engine.
    type Presenter: Presenter<Self>;
    /// Handle of a presentable image.
    type Image: Copy + fmt::Debug;
    /// Descriptor binding an image as an output target.
    type RenderTargetView: Copy + fmt::Debug;
    /// Token linking image acquisition, submission and present.
    type ImageSync: Copy + fmt::Debug;
}

/// GPU-to-CPU completion counter.
pub trait TimelineFence {
    /// Current completed value. Never blocks.
    fn completed_value(&self) -> Result<u64>;

    /// Block until the completed value reaches `value`.
    ///
    /// Returns `Ok(false)` if `timeout` elapsed first. `None` waits forever.
    fn wait(&self, value: u64, timeout: Option<Duration>) -> Result<bool>;
}

/// The graphics queue. Work executes in submission order.
pub trait GpuQueue<A: GpuApi> {
    /// Submit a closed command list, ordered after the image acquisition in `sync`.
    fn submit(&mut self, commands: &A::CommandList, sync: A::ImageSync) -> Result<()>;

    /// Enqueue a signal that sets `fence` to `value` once all prior work completes.
    fn signal(&mut self, fence: &A::Fence, value: u64) -> Result<()>;
}

/// Memory that command lists are recorded into.
pub trait CommandAllocator<A: GpuApi> {
    /// Return all command memory to the empty state.
    ///
    /// The GPU must have finished every command list recorded since the last
    /// reset. The frame slot pool only calls this after the slot's fence wait.
    fn reset(&mut self) -> Result<()>;

    /// Start recording a command list backed by this allocator.
    fn begin(&mut self) -> Result<A::CommandList>;
}

/// A command list being recorded.
pub trait CommandList<A: GpuApi> {
    /// Record a state transition barrier for `image`.
    fn transition(&mut self, image: A::Image, from: ResourceState, to: ResourceState)
        -> Result<()>;

    /// Bind `target` (and `depth`, if any) as the output and clear it.
    fn begin_rendering(
        &mut self,
        target: &ColorTarget<A>,
        depth: Option<A::RenderTargetView>,
        clear_color: [f32; 4],
    ) -> Result<()>;

    /// Unbind the output targets.
    fn end_rendering(&mut self) -> Result<()>;

    /// Close the list. It is immutable afterwards.
    fn finish(&mut self) -> Result<()>;
}

/// Image handed out by the presentation engine for one frame.
pub struct AcquiredImage<A: GpuApi> {
    pub index: u32,
    pub sync: A::ImageSync,
}

impl<A: GpuApi> Clone for AcquiredImage<A> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<A: GpuApi> Copy for AcquiredImage<A> {}

impl<A: GpuApi> fmt::Debug for AcquiredImage<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AcquiredImage")
            .field("index", &self.index)
            .field("sync", &self.sync)
            .finish()
    }
}

/// Everything the recorder needs to draw into one swapchain image.
pub struct ColorTarget<A: GpuApi> {
    pub image_index: u32,
    pub image: A::Image,
    pub view: A::RenderTargetView,
    pub extent: Extent2d,
}

impl<A: GpuApi> Clone for ColorTarget<A> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<A: GpuApi> Copy for ColorTarget<A> {}

impl<A: GpuApi> fmt::Debug for ColorTarget<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ColorTarget")
            .field("image_index", &self.image_index)
            .field("image", &self.image)
            .field("view", &self.view)
            .field("extent", &self.extent)
            .finish()
    }
}

/// Outcome of a present call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PresentStatus {
    /// The swapchain matches the surface.
    Optimal,
    /// Presented, but the swapchain should be re-created.
    Suboptimal,
    /// Not presented; the swapchain must be re-created.
    OutOfDate,
}

impl PresentStatus {
    /// Whether the caller should resize before the next frame.
    pub const fn needs_resize(self) -> bool {
        !matches!(self, Self::Optimal)
    }
}

/// Presentation engine owning the swapchain images.
pub trait Presenter<A: GpuApi> {
    /// Ask the presentation engine for the next image to render into.
    ///
    /// `slot` selects the per-slot acquisition sync, which is safe to reuse once
    /// that slot's fence target has been reached.
    fn acquire(&mut self, slot: usize) -> Result<AcquiredImage<A>>;

    /// Queue `image` for presentation after the frame's submission.
    fn present(&mut self, queue: &mut A::Queue, image: AcquiredImage<A>) -> Result<PresentStatus>;

    /// Hand back an image whose frame was abandoned before submission.
    fn release(&mut self, queue: &mut A::Queue, image: AcquiredImage<A>) -> Result<()>;

    /// Number of images in the swapchain.
    fn image_count(&self) -> usize;

    /// Image handle for `index`.
    fn image(&self, index: u32) -> Option<A::Image>;

    /// Render target view for `index`.
    fn render_target_view(&self, index: u32) -> Option<A::RenderTargetView>;

    /// Depth attachment shared by all images, if one was requested.
    fn depth_view(&self) -> Option<A::RenderTargetView>;

    /// Current image size.
    fn extent(&self) -> Extent2d;

    /// Re-create the images at a new size.
    ///
    /// No GPU work may reference the current images.
    fn resize(&mut self, extent: Extent2d) -> Result<()>;
}

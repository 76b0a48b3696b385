//! Application context.

use std::sync::Arc;
use std::time::{Duration, Instant};

use ash::vk;
use cadence_core::{Extent2d, FrameConfig};
use cadence_frame::{FrameDriver, Presenter};
use cadence_gpu::{create_driver_parts, GpuContext, SurfaceContext, VulkanApi, VulkanPresenter};
use winit::window::Window;

/// Everything a [`Renderer`](crate::Renderer) may need from the host.
///
/// Field order is drop order: the frame driver (and the surface it owns)
/// goes before the device, and the device before the window.
pub struct AppContext {
    /// Frame driver over the window's swapchain.
    pub driver: FrameDriver<VulkanApi>,
    /// GPU context with device and queues.
    pub gpu: GpuContext,
    /// The window handle.
    pub window: Arc<Window>,
    pub(crate) last_frame_time: Instant,
    start_time: Instant,
}

impl AppContext {
    /// Create the surface, swapchain and frame driver for `window`.
    ///
    /// # Safety
    /// The window must have valid handles and outlive the returned context.
    pub(crate) unsafe fn new(
        window: Arc<Window>,
        gpu: GpuContext,
        frame: &FrameConfig,
    ) -> anyhow::Result<Self> {
        // SAFETY: the window is kept alive by this context and dropped last
        let surface = unsafe { SurfaceContext::from_window(&gpu, window.as_ref())? };

        let size = window.inner_size();
        let extent = Extent2d::new(size.width.max(1), size.height.max(1));

        let parts = create_driver_parts(&gpu, surface, extent, frame)?;
        let driver = FrameDriver::new(parts, frame)?;

        let now = Instant::now();
        Ok(Self {
            driver,
            gpu,
            window,
            last_frame_time: now,
            start_time: now,
        })
    }

    /// The swapchain owner.
    pub fn presenter(&self) -> &VulkanPresenter {
        self.driver.images().presenter()
    }

    /// Format of the swapchain images, for pipeline creation.
    pub fn color_format(&self) -> vk::Format {
        self.presenter().format()
    }

    /// Format of the depth attachment, if the driver was configured with one.
    pub fn depth_format(&self) -> Option<vk::Format> {
        self.presenter().depth_format()
    }

    /// Current swapchain extent.
    pub fn extent(&self) -> Extent2d {
        self.presenter().extent()
    }

    /// Time since the context was created.
    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }
}

use std::sync::Arc;

use ash::vk;
use cadence_core::{Extent2d, FrameConfig};
use cadence_frame::{AcquiredImage, FrameError, PresentStatus, Presenter};
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use super::{VulkanApi, VulkanImageSync, VulkanQueue, VulkanView};
use crate::command::{
    begin_command_buffer, end_command_buffer, transition_image, CommandPool, ImageAccess,
};
use crate::context::GpuContext;
use crate::error::{frame_error, Result};
use crate::memory::GpuAllocator;
use crate::surface::SurfaceContext;
use crate::swapchain::{DepthBuffer, Swapchain};
use crate::sync::{create_semaphores, destroy_semaphores};

/// Surface, swapchain and depth buffer.
///
/// Owns the surface and destroys it on drop, after the swapchain.
pub struct VulkanPresenter {
    device: Arc<ash::Device>,
    allocator: Arc<Mutex<GpuAllocator>>,
    surface: SurfaceContext,
    swapchain: Swapchain,
    depth: Option<DepthBuffer>,
    want_depth: bool,
    vsync: bool,
    /// Acquisition semaphores, one per frame slot.
    image_available: Vec<vk::Semaphore>,
    /// Submission semaphores, one per swapchain image.
    render_finished: Vec<vk::Semaphore>,
    release_pool: CommandPool,
    release_commands: vk::CommandBuffer,
}

impl VulkanPresenter {
    /// Create the swapchain for `surface`.
    pub fn new(
        gpu: &GpuContext,
        surface: SurfaceContext,
        extent: Extent2d,
        config: &FrameConfig,
    ) -> Result<Self> {
        let device = gpu.shared_device();

        let release_pool = match unsafe {
            CommandPool::new(
                &device,
                gpu.graphics_queue_family(),
                vk::CommandPoolCreateFlags::TRANSIENT,
            )
        } {
            Ok(pool) => pool,
            Err(e) => {
                unsafe { surface.destroy() };
                return Err(e);
            }
        };

        // From here on, Drop cleans up whatever was created.
        let mut presenter = Self {
            device,
            allocator: Arc::clone(gpu.allocator()),
            surface,
            swapchain: Swapchain {
                swapchain: vk::SwapchainKHR::null(),
                images: Vec::new(),
                image_views: Vec::new(),
                format: vk::Format::UNDEFINED,
                extent: vk::Extent2D::default(),
            },
            depth: None,
            want_depth: config.depth,
            vsync: config.vsync,
            image_available: Vec::new(),
            render_finished: Vec::new(),
            release_pool,
            release_commands: vk::CommandBuffer::null(),
        };

        presenter.release_commands =
            unsafe { presenter.release_pool.allocate_command_buffer(&presenter.device)? };
        presenter.image_available =
            unsafe { create_semaphores(&presenter.device, config.frames_in_flight)? };
        presenter.create_swapchain(extent)?;

        info!(
            "Swapchain created: {}x{} ({} images, {:?})",
            presenter.swapchain.extent.width,
            presenter.swapchain.extent.height,
            presenter.swapchain.images.len(),
            presenter.swapchain.format
        );

        Ok(presenter)
    }

    /// Color format of the swapchain images.
    pub const fn format(&self) -> vk::Format {
        self.swapchain.format
    }

    /// Format of the depth attachment, if one is attached.
    pub fn depth_format(&self) -> Option<vk::Format> {
        self.depth.as_ref().map(|_| DepthBuffer::FORMAT)
    }

    /// (Re)create the swapchain and everything sized to it.
    fn create_swapchain(&mut self, extent: Extent2d) -> Result<()> {
        let old = (self.swapchain.swapchain != vk::SwapchainKHR::null())
            .then_some(self.swapchain.swapchain);

        let swapchain = unsafe {
            self.surface
                .create_swapchain(&self.device, extent.width, extent.height, self.vsync, old)?
        };
        let old = std::mem::replace(&mut self.swapchain, swapchain);
        unsafe { old.destroy(&self.device, &self.surface.swapchain_loader) };

        unsafe { destroy_semaphores(&self.device, &self.render_finished) };
        self.render_finished.clear();
        self.render_finished =
            unsafe { create_semaphores(&self.device, self.swapchain.images.len())? };

        let mut allocator = self.allocator.lock();
        if let Some(mut depth) = self.depth.take() {
            unsafe { depth.destroy(&self.device, &mut allocator)? };
        }
        if self.want_depth {
            self.depth =
                Some(unsafe { DepthBuffer::new(&self.device, &mut allocator, self.swapchain.extent)? });
        }

        Ok(())
    }

    fn sync_for(&self, slot: usize, index: u32) -> cadence_frame::Result<VulkanImageSync> {
        let image_available = self.image_available.get(slot).copied().ok_or_else(|| {
            FrameError::Backend(format!("no acquisition semaphore for slot {slot}"))
        })?;
        let render_finished = self
            .render_finished
            .get(index as usize)
            .copied()
            .ok_or(FrameError::InvalidImageIndex {
                index,
                count: self.render_finished.len(),
            })?;
        Ok(VulkanImageSync {
            image_available,
            render_finished,
        })
    }
}

impl Presenter<VulkanApi> for VulkanPresenter {
    fn acquire(&mut self, slot: usize) -> cadence_frame::Result<AcquiredImage<VulkanApi>> {
        let semaphore = self.image_available.get(slot).copied().ok_or_else(|| {
            FrameError::Backend(format!("no acquisition semaphore for slot {slot}"))
        })?;

        let (index, suboptimal) = unsafe {
            self.swapchain
                .acquire_next_image(&self.surface.swapchain_loader, semaphore)
        }
        .map_err(frame_error)?;
        if suboptimal {
            debug!(image_index = index, "acquired image from a suboptimal swapchain");
        }

        Ok(AcquiredImage {
            index,
            sync: self.sync_for(slot, index)?,
        })
    }

    fn present(
        &mut self,
        queue: &mut VulkanQueue,
        image: AcquiredImage<VulkanApi>,
    ) -> cadence_frame::Result<PresentStatus> {
        unsafe {
            self.swapchain.present(
                &self.surface.swapchain_loader,
                queue.handle(),
                image.index,
                &[image.sync.render_finished],
            )
        }
        .map_err(frame_error)
    }

    fn release(
        &mut self,
        queue: &mut VulkanQueue,
        image: AcquiredImage<VulkanApi>,
    ) -> cadence_frame::Result<()> {
        let handle = self.image(image.index).ok_or(FrameError::InvalidImageIndex {
            index: image.index,
            count: self.swapchain.images.len(),
        })?;

        // Consume the acquisition semaphore and hand the untouched image back.
        unsafe {
            self.release_pool.reset(&self.device)?;
            begin_command_buffer(&self.device, self.release_commands)?;
            transition_image(
                &self.device,
                self.release_commands,
                handle,
                vk::ImageAspectFlags::COLOR,
                ImageAccess::DISCARD,
                ImageAccess::PRESENT,
            );
            end_command_buffer(&self.device, self.release_commands)?;
        }

        let waits = [vk::SemaphoreSubmitInfo::default()
            .semaphore(image.sync.image_available)
            .stage_mask(vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT)];
        let command_buffers =
            [vk::CommandBufferSubmitInfo::default().command_buffer(self.release_commands)];
        let signals = [vk::SemaphoreSubmitInfo::default()
            .semaphore(image.sync.render_finished)
            .stage_mask(vk::PipelineStageFlags2::ALL_COMMANDS)];
        queue.submit2(&[vk::SubmitInfo2::default()
            .wait_semaphore_infos(&waits)
            .command_buffer_infos(&command_buffers)
            .signal_semaphore_infos(&signals)])?;

        let index = image.index;
        let status = self.present(queue, image)?;
        debug!(image_index = index, ?status, "abandoned image handed back");

        // The release command buffer is reused by the next abandoned frame.
        unsafe { self.device.queue_wait_idle(queue.handle()) }.map_err(frame_error)
    }

    fn image_count(&self) -> usize {
        self.swapchain.images.len()
    }

    fn image(&self, index: u32) -> Option<vk::Image> {
        self.swapchain.images.get(index as usize).copied()
    }

    fn render_target_view(&self, index: u32) -> Option<VulkanView> {
        let index = index as usize;
        Some(VulkanView {
            view: *self.swapchain.image_views.get(index)?,
            image: *self.swapchain.images.get(index)?,
        })
    }

    fn depth_view(&self) -> Option<VulkanView> {
        self.depth.as_ref().map(|depth| VulkanView {
            view: depth.view,
            image: depth.image.image,
        })
    }

    fn extent(&self) -> Extent2d {
        Extent2d::new(self.swapchain.extent.width, self.swapchain.extent.height)
    }

    fn resize(&mut self, extent: Extent2d) -> cadence_frame::Result<()> {
        // Frames are drained, but the presentation engine may still hold semaphores.
        unsafe { self.device.device_wait_idle() }.map_err(frame_error)?;
        self.create_swapchain(extent)?;
        Ok(())
    }
}

impl Drop for VulkanPresenter {
    fn drop(&mut self) {
        unsafe {
            if let Err(e) = self.device.device_wait_idle() {
                warn!("device_wait_idle failed while destroying swapchain: {e}");
            }

            if let Some(mut depth) = self.depth.take() {
                if let Err(e) = depth.destroy(&self.device, &mut self.allocator.lock()) {
                    warn!("Failed to free depth buffer: {e}");
                }
            }
            destroy_semaphores(&self.device, &self.render_finished);
            destroy_semaphores(&self.device, &self.image_available);
            self.swapchain
                .destroy(&self.device, &self.surface.swapchain_loader);
            self.release_pool.destroy(&self.device);
            self.surface.destroy();
        }
    }
}

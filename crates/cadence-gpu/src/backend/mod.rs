//! Vulkan implementation of the frame engine's backend traits.
//!
//! | Frame engine role  | Vulkan object                                  |
//! |--------------------|------------------------------------------------|
//! | fence              | timeline semaphore                             |
//! | command allocator  | one command pool with a single primary buffer  |
//! | image sync         | binary semaphores (per slot and per image)     |
//! | presenter          | surface, swapchain and optional depth image    |

mod commands;
mod fence;
mod presenter;
mod queue;

use ash::vk;
use cadence_core::{Extent2d, FrameConfig};
use cadence_frame::{DriverParts, GpuApi};

pub use commands::{VulkanCommandList, VulkanCommandPool};
pub use fence::VulkanFence;
pub use presenter::VulkanPresenter;
pub use queue::VulkanQueue;

use crate::context::GpuContext;
use crate::error::Result;
use crate::surface::SurfaceContext;

/// The Vulkan backend.
#[derive(Debug, Clone, Copy)]
pub struct VulkanApi;

impl GpuApi for VulkanApi {
    type Fence = VulkanFence;
    type Queue = VulkanQueue;
    type Allocator = VulkanCommandPool;
    type CommandList = VulkanCommandList;
    type Presenter = VulkanPresenter;
    type Image = vk::Image;
    type RenderTargetView = VulkanView;
    type ImageSync = VulkanImageSync;
}

/// An image view together with the image it views.
///
/// Layout transitions need the image; attachments need the view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VulkanView {
    pub view: vk::ImageView,
    pub image: vk::Image,
}

/// Semaphores chaining acquire → submit → present for one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VulkanImageSync {
    /// Signaled by the presentation engine; one per frame slot.
    pub image_available: vk::Semaphore,
    /// Signaled by the frame's submission; one per swapchain image.
    pub render_finished: vk::Semaphore,
}

/// Create every backend object the frame driver needs.
///
/// `surface` is handed to the presenter, which destroys it on drop.
pub fn create_driver_parts(
    gpu: &GpuContext,
    surface: SurfaceContext,
    extent: Extent2d,
    config: &FrameConfig,
) -> Result<DriverParts<VulkanApi>> {
    // The presenter takes the surface first so every later failure destroys it.
    let presenter = VulkanPresenter::new(gpu, surface, extent, config)?;

    let fence = VulkanFence::new(gpu.shared_device(), 0)?;
    let queue = VulkanQueue::new(gpu);

    let allocators = (0..config.frames_in_flight)
        .map(|_| VulkanCommandPool::new(gpu.shared_device(), gpu.graphics_queue_family()))
        .collect::<Result<Vec<_>>>()?;

    Ok(DriverParts {
        queue,
        fence,
        allocators,
        presenter,
    })
}

use std::sync::Arc;

use ash::vk;
use cadence_frame::{ColorTarget, CommandAllocator, CommandList, FrameError, ResourceState};

use super::{VulkanApi, VulkanView};
use crate::command::{
    begin_command_buffer, end_command_buffer, transition_image, CommandPool, ImageAccess,
};
use crate::error::Result;

/// Per-slot command pool holding one primary command buffer.
pub struct VulkanCommandPool {
    device: Arc<ash::Device>,
    pool: CommandPool,
    buffer: vk::CommandBuffer,
}

impl VulkanCommandPool {
    pub fn new(device: Arc<ash::Device>, queue_family: u32) -> Result<Self> {
        let pool = unsafe {
            CommandPool::new(&device, queue_family, vk::CommandPoolCreateFlags::TRANSIENT)?
        };
        let buffer = match unsafe { pool.allocate_command_buffer(&device) } {
            Ok(buffer) => buffer,
            Err(e) => {
                unsafe { pool.destroy(&device) };
                return Err(e);
            }
        };
        Ok(Self {
            device,
            pool,
            buffer,
        })
    }
}

impl CommandAllocator<VulkanApi> for VulkanCommandPool {
    fn reset(&mut self) -> cadence_frame::Result<()> {
        unsafe { self.pool.reset(&self.device) }.map_err(FrameError::from)
    }

    fn begin(&mut self) -> cadence_frame::Result<VulkanCommandList> {
        unsafe { begin_command_buffer(&self.device, self.buffer) }?;
        Ok(VulkanCommandList {
            device: Arc::clone(&self.device),
            buffer: self.buffer,
        })
    }
}

impl Drop for VulkanCommandPool {
    fn drop(&mut self) {
        unsafe { self.pool.destroy(&self.device) };
    }
}

/// A recording primary command buffer.
///
/// Scene content records its own draw calls through [`Self::device`] and
/// [`Self::handle`].
pub struct VulkanCommandList {
    device: Arc<ash::Device>,
    buffer: vk::CommandBuffer,
}

impl VulkanCommandList {
    pub fn device(&self) -> &ash::Device {
        &self.device
    }

    pub const fn handle(&self) -> vk::CommandBuffer {
        self.buffer
    }
}

const fn image_access(state: ResourceState, entering: bool) -> ImageAccess {
    match state {
        ResourceState::RenderTarget => ImageAccess::COLOR_ATTACHMENT,
        ResourceState::Present if entering => ImageAccess::PRESENT,
        // Contents are discarded; every frame clears the image.
        ResourceState::Present => ImageAccess::DISCARD,
    }
}

impl CommandList<VulkanApi> for VulkanCommandList {
    fn transition(
        &mut self,
        image: vk::Image,
        from: ResourceState,
        to: ResourceState,
    ) -> cadence_frame::Result<()> {
        unsafe {
            transition_image(
                &self.device,
                self.buffer,
                image,
                vk::ImageAspectFlags::COLOR,
                image_access(from, false),
                image_access(to, true),
            );
        }
        Ok(())
    }

    fn begin_rendering(
        &mut self,
        target: &ColorTarget<VulkanApi>,
        depth: Option<VulkanView>,
        clear_color: [f32; 4],
    ) -> cadence_frame::Result<()> {
        let extent = vk::Extent2D {
            width: target.extent.width,
            height: target.extent.height,
        };

        let color_attachments = [vk::RenderingAttachmentInfo::default()
            .image_view(target.view.view)
            .image_layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)
            .load_op(vk::AttachmentLoadOp::CLEAR)
            .store_op(vk::AttachmentStoreOp::STORE)
            .clear_value(vk::ClearValue {
                color: vk::ClearColorValue {
                    float32: clear_color,
                },
            })];

        let depth_attachment = depth.map(|depth| {
            unsafe {
                transition_image(
                    &self.device,
                    self.buffer,
                    depth.image,
                    vk::ImageAspectFlags::DEPTH,
                    ImageAccess::DEPTH_DISCARD,
                    ImageAccess::DEPTH_ATTACHMENT,
                );
            }
            vk::RenderingAttachmentInfo::default()
                .image_view(depth.view)
                .image_layout(vk::ImageLayout::DEPTH_ATTACHMENT_OPTIMAL)
                .load_op(vk::AttachmentLoadOp::CLEAR)
                .store_op(vk::AttachmentStoreOp::DONT_CARE)
                .clear_value(vk::ClearValue {
                    depth_stencil: vk::ClearDepthStencilValue {
                        depth: 1.0,
                        stencil: 0,
                    },
                })
        });

        let mut rendering_info = vk::RenderingInfo::default()
            .render_area(extent.into())
            .layer_count(1)
            .color_attachments(&color_attachments);
        if let Some(depth_attachment) = depth_attachment.as_ref() {
            rendering_info = rendering_info.depth_attachment(depth_attachment);
        }

        // Negative height flips Y so +Y points up in clip space.
        #[allow(clippy::cast_precision_loss)]
        let viewport = vk::Viewport {
            x: 0.0,
            y: extent.height as f32,
            width: extent.width as f32,
            height: -(extent.height as f32),
            min_depth: 0.0,
            max_depth: 1.0,
        };

        unsafe {
            self.device.cmd_begin_rendering(self.buffer, &rendering_info);
            self.device.cmd_set_viewport(self.buffer, 0, &[viewport]);
            self.device.cmd_set_scissor(self.buffer, 0, &[extent.into()]);
        }
        Ok(())
    }

    fn end_rendering(&mut self) -> cadence_frame::Result<()> {
        unsafe { self.device.cmd_end_rendering(self.buffer) };
        Ok(())
    }

    fn finish(&mut self) -> cadence_frame::Result<()> {
        unsafe { end_command_buffer(&self.device, self.buffer) }.map_err(FrameError::from)
    }
}

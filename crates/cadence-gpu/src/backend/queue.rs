use std::sync::Arc;

use ash::vk;
use cadence_frame::GpuQueue;

use super::{VulkanApi, VulkanCommandList, VulkanFence, VulkanImageSync};
use crate::context::GpuContext;
use crate::error::frame_error;

/// The graphics queue.
pub struct VulkanQueue {
    device: Arc<ash::Device>,
    queue: vk::Queue,
}

impl VulkanQueue {
    pub fn new(gpu: &GpuContext) -> Self {
        Self {
            device: gpu.shared_device(),
            queue: gpu.graphics_queue(),
        }
    }

    pub const fn handle(&self) -> vk::Queue {
        self.queue
    }

    pub(crate) fn submit2(&self, submits: &[vk::SubmitInfo2<'_>]) -> cadence_frame::Result<()> {
        unsafe { self.device.queue_submit2(self.queue, submits, vk::Fence::null()) }
            .map_err(frame_error)
    }
}

impl GpuQueue<VulkanApi> for VulkanQueue {
    fn submit(
        &mut self,
        commands: &VulkanCommandList,
        sync: VulkanImageSync,
    ) -> cadence_frame::Result<()> {
        let waits = [vk::SemaphoreSubmitInfo::default()
            .semaphore(sync.image_available)
            .stage_mask(vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT)];
        let command_buffers =
            [vk::CommandBufferSubmitInfo::default().command_buffer(commands.handle())];
        let signals = [vk::SemaphoreSubmitInfo::default()
            .semaphore(sync.render_finished)
            .stage_mask(vk::PipelineStageFlags2::ALL_COMMANDS)];

        let submit = vk::SubmitInfo2::default()
            .wait_semaphore_infos(&waits)
            .command_buffer_infos(&command_buffers)
            .signal_semaphore_infos(&signals);

        self.submit2(&[submit])
    }

    fn signal(&mut self, fence: &VulkanFence, value: u64) -> cadence_frame::Result<()> {
        // Covers every command earlier in submission order, not only this batch.
        let signals = [vk::SemaphoreSubmitInfo::default()
            .semaphore(fence.handle())
            .value(value)
            .stage_mask(vk::PipelineStageFlags2::ALL_COMMANDS)];
        let submit = vk::SubmitInfo2::default().signal_semaphore_infos(&signals);

        self.submit2(&[submit])
    }
}

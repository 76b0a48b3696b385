use std::sync::Arc;
use std::time::Duration;

use ash::vk;
use cadence_frame::TimelineFence;

use crate::error::{frame_error, Result};
use crate::sync::{create_timeline_semaphore, timeout_ns};

/// Timeline semaphore used as the frame fence.
pub struct VulkanFence {
    device: Arc<ash::Device>,
    semaphore: vk::Semaphore,
}

impl VulkanFence {
    pub fn new(device: Arc<ash::Device>, initial_value: u64) -> Result<Self> {
        let semaphore = unsafe { create_timeline_semaphore(&device, initial_value)? };
        Ok(Self { device, semaphore })
    }

    pub const fn handle(&self) -> vk::Semaphore {
        self.semaphore
    }
}

impl TimelineFence for VulkanFence {
    fn completed_value(&self) -> cadence_frame::Result<u64> {
        unsafe { self.device.get_semaphore_counter_value(self.semaphore) }.map_err(frame_error)
    }

    fn wait(&self, value: u64, timeout: Option<Duration>) -> cadence_frame::Result<bool> {
        let semaphores = [self.semaphore];
        let values = [value];
        let wait_info = vk::SemaphoreWaitInfo::default()
            .semaphores(&semaphores)
            .values(&values);

        match unsafe { self.device.wait_semaphores(&wait_info, timeout_ns(timeout)) } {
            Ok(()) => Ok(true),
            Err(vk::Result::TIMEOUT) => Ok(false),
            Err(e) => Err(frame_error(e)),
        }
    }
}

impl Drop for VulkanFence {
    fn drop(&mut self) {
        unsafe { self.device.destroy_semaphore(self.semaphore, None) };
    }
}

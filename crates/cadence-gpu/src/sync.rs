//! Synchronization primitives.

use crate::error::Result;
use ash::vk;
use std::time::Duration;

/// Create a binary semaphore.
///
/// # Safety
/// The device must be valid.
pub unsafe fn create_semaphore(device: &ash::Device) -> Result<vk::Semaphore> {
    let create_info = vk::SemaphoreCreateInfo::default();
    Ok(unsafe { device.create_semaphore(&create_info, None)? })
}

/// Create a timeline semaphore starting at `initial_value`.
///
/// # Safety
/// The device must be valid and have the timeline semaphore feature enabled.
pub unsafe fn create_timeline_semaphore(
    device: &ash::Device,
    initial_value: u64,
) -> Result<vk::Semaphore> {
    let mut type_info = vk::SemaphoreTypeCreateInfo::default()
        .semaphore_type(vk::SemaphoreType::TIMELINE)
        .initial_value(initial_value);
    let create_info = vk::SemaphoreCreateInfo::default().push_next(&mut type_info);
    Ok(unsafe { device.create_semaphore(&create_info, None)? })
}

/// Create `count` binary semaphores, destroying the partial set on failure.
///
/// # Safety
/// The device must be valid.
pub unsafe fn create_semaphores(device: &ash::Device, count: usize) -> Result<Vec<vk::Semaphore>> {
    let mut semaphores = Vec::with_capacity(count);
    for _ in 0..count {
        match unsafe { create_semaphore(device) } {
            Ok(semaphore) => semaphores.push(semaphore),
            Err(e) => {
                unsafe { destroy_semaphores(device, &semaphores) };
                return Err(e);
            }
        }
    }
    Ok(semaphores)
}

/// Destroy a set of semaphores.
///
/// # Safety
/// The semaphores must not be in use.
pub unsafe fn destroy_semaphores(device: &ash::Device, semaphores: &[vk::Semaphore]) {
    for &semaphore in semaphores {
        unsafe { device.destroy_semaphore(semaphore, None) };
    }
}

/// Convert an optional wait deadline to Vulkan's nanosecond timeout.
pub fn timeout_ns(timeout: Option<Duration>) -> u64 {
    timeout.map_or(u64::MAX, |t| u64::try_from(t.as_nanos()).unwrap_or(u64::MAX))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_timeout_waits_forever() {
        assert_eq!(timeout_ns(None), u64::MAX);
    }

    #[test]
    fn timeouts_convert_to_nanoseconds() {
        assert_eq!(timeout_ns(Some(Duration::from_millis(3))), 3_000_000);
        assert_eq!(timeout_ns(Some(Duration::MAX)), u64::MAX);
    }
}

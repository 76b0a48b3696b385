//! GPU capability detection.

use ash::vk;
use std::ffi::CStr;

/// GPU vendor identification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GpuVendor {
    Nvidia,
    Amd,
    Intel,
    Apple,
    Other(u32),
}

impl GpuVendor {
    /// Identify vendor from PCI vendor ID.
    pub const fn from_vendor_id(id: u32) -> Self {
        match id {
            0x10DE => Self::Nvidia,
            0x1002 => Self::Amd,
            0x8086 => Self::Intel,
            0x106B => Self::Apple,
            other => Self::Other(other),
        }
    }
}

/// Detected GPU capabilities.
#[derive(Debug, Clone)]
pub struct GpuCapabilities {
    pub vendor: GpuVendor,
    pub device_name: String,
    pub device_type: vk::PhysicalDeviceType,
    /// Vulkan API version
    pub api_version: u32,
    pub driver_version: u32,

    /// Timeline semaphores (VK 1.2 core, feature bit)
    pub supports_timeline_semaphore: bool,
    /// Dynamic rendering (VK 1.3 core, feature bit)
    pub supports_dynamic_rendering: bool,
    /// Synchronization2 (VK 1.3 core, feature bit)
    pub supports_synchronization2: bool,
    pub supports_swapchain: bool,

    /// Device-local memory in MB
    pub device_local_memory_mb: u64,
}

impl GpuCapabilities {
    /// Query capabilities from a physical device.
    ///
    /// # Safety
    /// The instance and physical device must be valid.
    pub unsafe fn query(instance: &ash::Instance, physical_device: vk::PhysicalDevice) -> Self {
        let properties = unsafe { instance.get_physical_device_properties(physical_device) };
        let memory_properties =
            unsafe { instance.get_physical_device_memory_properties(physical_device) };

        let mut vulkan_1_2 = vk::PhysicalDeviceVulkan12Features::default();
        let mut vulkan_1_3 = vk::PhysicalDeviceVulkan13Features::default();
        let mut features2 = vk::PhysicalDeviceFeatures2::default()
            .push_next(&mut vulkan_1_2)
            .push_next(&mut vulkan_1_3);
        unsafe { instance.get_physical_device_features2(physical_device, &mut features2) };

        let supports_swapchain = unsafe {
            instance
                .enumerate_device_extension_properties(physical_device)
                .unwrap_or_default()
                .iter()
                .any(|ext| CStr::from_ptr(ext.extension_name.as_ptr()) == ash::khr::swapchain::NAME)
        };

        let device_name = unsafe { CStr::from_ptr(properties.device_name.as_ptr()) }
            .to_string_lossy()
            .into_owned();

        Self {
            vendor: GpuVendor::from_vendor_id(properties.vendor_id),
            device_name,
            device_type: properties.device_type,
            api_version: properties.api_version,
            driver_version: properties.driver_version,
            supports_timeline_semaphore: vulkan_1_2.timeline_semaphore == vk::TRUE,
            supports_dynamic_rendering: vulkan_1_3.dynamic_rendering == vk::TRUE,
            supports_synchronization2: vulkan_1_3.synchronization2 == vk::TRUE,
            supports_swapchain,
            device_local_memory_mb: device_local_memory_mb(&memory_properties),
        }
    }

    /// Check if the GPU can run the frame engine.
    pub const fn meets_requirements(&self) -> bool {
        is_vulkan_1_3(self.api_version)
            && self.supports_timeline_semaphore
            && self.supports_dynamic_rendering
            && self.supports_synchronization2
            && self.supports_swapchain
    }

    /// Get a human-readable summary of capabilities.
    pub fn summary(&self) -> String {
        format!(
            "{} ({:?}, {:?}) - Vulkan {}.{}.{} - {} MB VRAM",
            self.device_name,
            self.vendor,
            self.device_type,
            vk::api_version_major(self.api_version),
            vk::api_version_minor(self.api_version),
            vk::api_version_patch(self.api_version),
            self.device_local_memory_mb,
        )
    }
}

/// Whether `api_version` is at least Vulkan 1.3.
pub const fn is_vulkan_1_3(api_version: u32) -> bool {
    let major = vk::api_version_major(api_version);
    let minor = vk::api_version_minor(api_version);
    major > 1 || (major == 1 && minor >= 3)
}

fn device_local_memory_mb(memory: &vk::PhysicalDeviceMemoryProperties) -> u64 {
    memory
        .memory_heaps
        .iter()
        .take(memory.memory_heap_count as usize)
        .filter(|heap| heap.flags.contains(vk::MemoryHeapFlags::DEVICE_LOCAL))
        .map(|heap| heap.size / (1024 * 1024))
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vendor_identification() {
        assert_eq!(GpuVendor::from_vendor_id(0x10DE), GpuVendor::Nvidia);
        assert_eq!(GpuVendor::from_vendor_id(0x1002), GpuVendor::Amd);
        assert_eq!(GpuVendor::from_vendor_id(0x8086), GpuVendor::Intel);
        assert_eq!(GpuVendor::from_vendor_id(0x1234), GpuVendor::Other(0x1234));
    }

    #[test]
    fn api_version_gate() {
        assert!(is_vulkan_1_3(vk::API_VERSION_1_3));
        assert!(is_vulkan_1_3(vk::make_api_version(0, 1, 4, 0)));
        assert!(!is_vulkan_1_3(vk::API_VERSION_1_2));
    }

    #[test]
    fn requirements_need_timeline_semaphores() {
        let mut caps = GpuCapabilities {
            vendor: GpuVendor::Other(0),
            device_name: "test".to_string(),
            device_type: vk::PhysicalDeviceType::DISCRETE_GPU,
            api_version: vk::API_VERSION_1_3,
            driver_version: 0,
            supports_timeline_semaphore: true,
            supports_dynamic_rendering: true,
            supports_synchronization2: true,
            supports_swapchain: true,
            device_local_memory_mb: 4096,
        };
        assert!(caps.meets_requirements());

        caps.supports_timeline_semaphore = false;
        assert!(!caps.meets_requirements());
    }
}

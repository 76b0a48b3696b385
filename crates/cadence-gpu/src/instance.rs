//! Vulkan instance creation and physical device selection.

use crate::capabilities::{is_vulkan_1_3, GpuCapabilities};
use crate::error::{GpuError, Result};
use ash::vk;
use raw_window_handle::RawDisplayHandle;
use std::ffi::{c_char, CStr, CString};

/// Instance extensions needed to present to `display`.
///
/// Without a display the platform surface extensions are guessed per target OS.
pub fn required_instance_extensions(display: Option<RawDisplayHandle>) -> Result<Vec<*const c_char>> {
    if let Some(display) = display {
        let mut extensions = ash_window::enumerate_required_extensions(display)
            .map_err(|e| GpuError::SurfaceCreation(e.to_string()))?
            .to_vec();
        #[cfg(target_os = "macos")]
        extensions.push(ash::khr::portability_enumeration::NAME.as_ptr());
        return Ok(extensions);
    }

    let extensions: Vec<&'static CStr> = vec![
        ash::khr::surface::NAME,
        #[cfg(target_os = "windows")]
        ash::khr::win32_surface::NAME,
        #[cfg(target_os = "linux")]
        ash::khr::xlib_surface::NAME,
        #[cfg(target_os = "linux")]
        ash::khr::wayland_surface::NAME,
        #[cfg(target_os = "macos")]
        ash::ext::metal_surface::NAME,
        #[cfg(target_os = "macos")]
        ash::khr::portability_enumeration::NAME,
    ];
    Ok(extensions.iter().map(|ext| ext.as_ptr()).collect())
}

const VALIDATION_LAYER: &CStr = c"VK_LAYER_KHRONOS_validation";

/// Create a Vulkan 1.3 instance.
///
/// # Safety
/// The entry must be a valid Vulkan entry point.
pub unsafe fn create_instance(
    entry: &ash::Entry,
    app_name: &str,
    enable_validation: bool,
    display: Option<RawDisplayHandle>,
) -> Result<ash::Instance> {
    let app_name = CString::new(app_name)
        .map_err(|e| GpuError::InvalidState(format!("application name: {e}")))?;

    let app_info = vk::ApplicationInfo::default()
        .application_name(&app_name)
        .application_version(vk::make_api_version(0, 0, 1, 0))
        .engine_name(c"Cadence")
        .engine_version(vk::make_api_version(0, 0, 1, 0))
        .api_version(vk::API_VERSION_1_3);

    let extension_names = required_instance_extensions(display)?;

    let mut layer_names = Vec::new();
    if enable_validation {
        let available = unsafe { entry.enumerate_instance_layer_properties()? };
        let found = available
            .iter()
            .any(|props| unsafe { CStr::from_ptr(props.layer_name.as_ptr()) } == VALIDATION_LAYER);
        if found {
            layer_names.push(VALIDATION_LAYER.as_ptr());
        } else {
            tracing::warn!("Validation layer {VALIDATION_LAYER:?} not available");
        }
    }

    // Required for MoltenVK on macOS
    #[cfg(target_os = "macos")]
    let create_flags = vk::InstanceCreateFlags::ENUMERATE_PORTABILITY_KHR;
    #[cfg(not(target_os = "macos"))]
    let create_flags = vk::InstanceCreateFlags::empty();

    let create_info = vk::InstanceCreateInfo::default()
        .application_info(&app_info)
        .enabled_extension_names(&extension_names)
        .enabled_layer_names(&layer_names)
        .flags(create_flags);

    Ok(unsafe { entry.create_instance(&create_info, None)? })
}

/// Select the best physical device that meets the engine's requirements.
///
/// # Safety
/// The instance must be valid.
pub unsafe fn select_physical_device(
    instance: &ash::Instance,
) -> Result<(vk::PhysicalDevice, GpuCapabilities)> {
    let devices = unsafe { instance.enumerate_physical_devices()? };

    devices
        .into_iter()
        .map(|device| (device, unsafe { GpuCapabilities::query(instance, device) }))
        .filter(|(_, caps)| {
            let usable = caps.meets_requirements();
            if !usable {
                tracing::debug!("Skipping GPU without required features: {}", caps.summary());
            }
            usable
        })
        .max_by_key(|(_, caps)| score_device(caps))
        .ok_or(GpuError::NoSuitableDevice)
}

/// Score a device for selection. Higher is better.
fn score_device(caps: &GpuCapabilities) -> u64 {
    if !is_vulkan_1_3(caps.api_version) {
        return 0;
    }

    let type_score = match caps.device_type {
        vk::PhysicalDeviceType::DISCRETE_GPU => 1000,
        vk::PhysicalDeviceType::INTEGRATED_GPU => 100,
        vk::PhysicalDeviceType::VIRTUAL_GPU => 50,
        _ => 1,
    };

    // +1 per GB of VRAM
    type_score + caps.device_local_memory_mb / 1024
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capabilities::GpuVendor;

    fn caps(device_type: vk::PhysicalDeviceType, vram_mb: u64) -> GpuCapabilities {
        GpuCapabilities {
            vendor: GpuVendor::Other(0),
            device_name: "test".to_string(),
            device_type,
            api_version: vk::API_VERSION_1_3,
            driver_version: 0,
            supports_timeline_semaphore: true,
            supports_dynamic_rendering: true,
            supports_synchronization2: true,
            supports_swapchain: true,
            device_local_memory_mb: vram_mb,
        }
    }

    #[test]
    fn discrete_beats_integrated() {
        let discrete = caps(vk::PhysicalDeviceType::DISCRETE_GPU, 2048);
        let integrated = caps(vk::PhysicalDeviceType::INTEGRATED_GPU, 16384);
        assert!(score_device(&discrete) > score_device(&integrated));
    }

    #[test]
    fn more_memory_breaks_ties() {
        let small = caps(vk::PhysicalDeviceType::DISCRETE_GPU, 4096);
        let large = caps(vk::PhysicalDeviceType::DISCRETE_GPU, 8192);
        assert!(score_device(&large) > score_device(&small));
    }
}

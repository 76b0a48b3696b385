//! GPU error types.

use ash::vk;
use cadence_frame::FrameError;
use thiserror::Error;

/// GPU-related errors.
#[derive(Error, Debug)]
pub enum GpuError {
    /// Vulkan error.
    #[error("Vulkan error: {0}")]
    Vulkan(#[from] vk::Result),

    /// Vulkan loader could not be opened.
    #[error("Failed to load Vulkan: {0}")]
    Loading(String),

    /// No suitable GPU found.
    #[error("No suitable GPU found")]
    NoSuitableDevice,

    /// Memory allocation failed.
    #[error("Memory allocation failed: {0}")]
    AllocationFailed(String),

    /// Surface creation failed.
    #[error("Surface creation failed: {0}")]
    SurfaceCreation(String),

    /// Swapchain creation failed.
    #[error("Swapchain creation failed: {0}")]
    SwapchainCreation(String),

    /// Shader module creation failed.
    #[error("Shader module creation failed: {0}")]
    ShaderModule(String),

    /// Pipeline creation failed.
    #[error("Pipeline creation failed: {0}")]
    PipelineCreation(String),

    /// Invalid state.
    #[error("Invalid state: {0}")]
    InvalidState(String),
}

/// Result type alias.
pub type Result<T> = std::result::Result<T, GpuError>;

/// Classify a raw Vulkan result for the frame engine.
pub fn frame_error(result: vk::Result) -> FrameError {
    match result {
        vk::Result::ERROR_DEVICE_LOST => FrameError::DeviceLost(result.to_string()),
        vk::Result::ERROR_OUT_OF_DATE_KHR | vk::Result::ERROR_SURFACE_LOST_KHR => {
            FrameError::SurfaceOutOfDate
        }
        other => FrameError::Backend(format!("Vulkan error: {other}")),
    }
}

impl From<GpuError> for FrameError {
    fn from(err: GpuError) -> Self {
        match err {
            GpuError::Vulkan(result) => frame_error(result),
            other => Self::Backend(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_loss_is_preserved() {
        assert!(frame_error(vk::Result::ERROR_DEVICE_LOST).is_device_lost());
        let err: FrameError = GpuError::Vulkan(vk::Result::ERROR_DEVICE_LOST).into();
        assert!(err.is_device_lost());
    }

    #[test]
    fn out_of_date_asks_for_resize() {
        assert!(frame_error(vk::Result::ERROR_OUT_OF_DATE_KHR).is_out_of_date());
    }

    #[test]
    fn other_results_are_backend_errors() {
        let err = frame_error(vk::Result::ERROR_OUT_OF_DEVICE_MEMORY);
        assert!(matches!(err, FrameError::Backend(_)));
        let err: FrameError = GpuError::NoSuitableDevice.into();
        assert!(matches!(err, FrameError::Backend(msg) if msg.contains("No suitable GPU")));
    }
}

//! Vulkan backend for the Cadence frame engine.
//!
//! This crate provides:
//! - Vulkan instance, device and graphics queue setup
//! - GPU capability detection
//! - Memory allocation via gpu-allocator
//! - Swapchain, surface and graphics pipeline helpers
//! - [`backend::VulkanApi`], the frame engine's Vulkan backend

pub mod backend;
pub mod capabilities;
pub mod command;
pub mod context;
pub mod error;
pub mod instance;
pub mod memory;
pub mod pipeline;
pub mod surface;
pub mod swapchain;
pub mod sync;

pub use backend::{create_driver_parts, VulkanApi, VulkanCommandList, VulkanPresenter, VulkanView};
pub use capabilities::{GpuCapabilities, GpuVendor};
pub use context::{GpuContext, GpuContextBuilder};
pub use error::{GpuError, Result};
pub use memory::{GpuAllocator, GpuBuffer, GpuImage};
pub use pipeline::{GraphicsPipeline, GraphicsPipelineConfig, ShaderStage};
pub use surface::{SurfaceCapabilities, SurfaceContext};

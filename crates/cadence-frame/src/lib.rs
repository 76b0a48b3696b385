//! Frame synchronization and resource-lifecycle engine.
//!
//! This crate decides how many frames may be in flight, how GPU completion is
//! observed from the CPU, when command-recording memory may be recycled, and how
//! swapchain images are borrowed and handed back. It is written against the
//! [`GpuApi`] abstraction and never names a concrete graphics API.
//!
//! Components, leaves first:
//! - [`FenceTracker`]: monotonic GPU completion counter
//! - [`FrameSlotPool`]: ring of per-frame command allocators with fence targets
//! - [`SwapchainImageSet`]: presentable images chosen by the presentation engine
//! - [`CommandRecorder`]: builds one closed command list per frame
//! - [`FrameDriver`]: runs the per-frame cycle over all of the above

pub mod backend;
pub mod driver;
pub mod error;
pub mod fence;
pub mod images;
pub mod recorder;
pub mod slots;

pub use backend::{
    AcquiredImage, ColorTarget, CommandAllocator, CommandList, GpuApi, GpuQueue, PresentStatus,
    Presenter, ResourceState, TimelineFence,
};
pub use driver::{DriverParts, FrameCursor, FrameDriver, FrameReport, FrameStats};
pub use error::{FrameError, Result};
pub use fence::FenceTracker;
pub use images::SwapchainImageSet;
pub use recorder::{CommandRecorder, SceneContent};
pub use slots::{FrameSlot, FrameSlotPool, ReadySlot, RecordingSlot, SlotState};

pub use cadence_core::WaitPolicy;

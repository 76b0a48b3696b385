//! Frame engine error types.

use std::time::Duration;

use thiserror::Error;

use crate::slots::SlotState;

/// Errors produced by the frame engine and its backends.
///
/// None of these are recoverable within a frame. The only retry is the next
/// frame's normal cycle.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
    /// The GPU or driver stopped responding.
    #[error("GPU device lost: {0}")]
    DeviceLost(String),

    /// A diagnostic fence wait elapsed before the target was reached.
    #[error("Fence wait for {target} timed out after {timeout:?} (completed: {completed})")]
    TimeoutExceeded {
        target: u64,
        completed: u64,
        timeout: Duration,
    },

    /// A fence value was reused, issued out of order, or never signaled.
    #[error("Invalid fence target {value}: {reason}")]
    InvalidFenceTarget { value: u64, reason: &'static str },

    /// Building the frame's command list failed.
    #[error("Command recording failed: {0}")]
    RecordingFailure(String),

    /// The swapchain no longer matches the surface.
    #[error("Surface is out of date")]
    SurfaceOutOfDate,

    /// A frame slot was used from the wrong state.
    #[error("Frame slot {slot} is {found:?}, expected {expected}")]
    InvalidSlotState {
        slot: usize,
        found: SlotState,
        expected: &'static str,
    },

    /// An image index was used without being borrowed for the current frame.
    #[error("Swapchain image {0} is not borrowed by the current frame")]
    ImageNotBorrowed(u32),

    /// The presentation engine returned an index outside the image set.
    #[error("Swapchain image index {index} out of range ({count} images)")]
    InvalidImageIndex { index: u32, count: usize },

    /// Construction parameters were rejected.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Any other backend API failure.
    #[error("Backend error: {0}")]
    Backend(String),
}

impl FrameError {
    /// Whether the error means the device can no longer be used.
    pub const fn is_device_lost(&self) -> bool {
        matches!(self, Self::DeviceLost(_))
    }

    /// Whether the caller should re-create the swapchain and keep going.
    pub const fn is_out_of_date(&self) -> bool {
        matches!(self, Self::SurfaceOutOfDate)
    }
}

impl From<cadence_core::Error> for FrameError {
    fn from(err: cadence_core::Error) -> Self {
        Self::Config(err.to_string())
    }
}

/// Result type alias.
pub type Result<T> = std::result::Result<T, FrameError>;

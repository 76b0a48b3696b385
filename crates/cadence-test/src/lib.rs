//! Test support for the Cadence frame engine.
//!
//! Provides a simulated GPU backend whose timeline is driven by the test, so
//! synchronization properties can be checked without a device.

pub mod sim;

pub use sim::{
    SimAllocator, SimApi, SimCommand, SimCommandList, SimConfig, SimEvent, SimFence, SimGpu,
    SimImage, SimImageSync, SimPresenter, SimQueue, SimScene, SimStep, SimSubmission, SimView,
};

use thiserror::Error;
use tracing_subscriber::EnvFilter;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SimError {
    #[error("allocator {allocator} reset with {pending} submission(s) still on the GPU")]
    PrematureReuse { allocator: usize, pending: usize },
    #[error("allocator {allocator} recorded into before being reset")]
    StaleAllocator { allocator: usize },
    #[error("command list from allocator {allocator} submitted before it was finished")]
    UnfinishedCommandList { allocator: usize },
    #[error("command list used after it was finished")]
    ListClosed,
    #[error("swapchain resized with {pending} submission(s) still on the GPU")]
    ResizeWhileBusy { pending: usize },
    #[error("injected failure at {0:?}")]
    Injected(SimStep),
    #[error("simulated device loss")]
    DeviceLost,
}

impl From<SimError> for cadence_frame::FrameError {
    fn from(err: SimError) -> Self {
        match err {
            SimError::DeviceLost => Self::DeviceLost(err.to_string()),
            other => Self::Backend(other.to_string()),
        }
    }
}

/// Route `tracing` output through the test harness' captured stdout.
pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug")),
        )
        .with_test_writer()
        .try_init();
}

//! Core types and configuration for the Cadence frame engine.
//!
//! This crate provides the foundational types shared by every other crate:
//! - Frame pacing and logging configuration
//! - Surface extents
//! - Common error types

pub mod config;
pub mod error;
pub mod types;

pub use config::{FrameConfig, LogConfig, WaitPolicy};
pub use error::{Error, Result};
pub use types::Extent2d;

/// Engine-wide constants
pub mod constants {
    /// Smallest number of frames that may be buffered.
    pub const MIN_FRAMES_IN_FLIGHT: usize = 1;
    /// Largest number of frames that may be buffered.
    pub const MAX_FRAMES_IN_FLIGHT: usize = 8;
    /// Frames buffered when nothing else is configured.
    pub const DEFAULT_FRAMES_IN_FLIGHT: usize = 2;
}

//! Application configuration.

use cadence_core::{FrameConfig, LogConfig};
use serde::{Deserialize, Serialize};

/// Application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Window title.
    pub title: String,
    /// Initial window width.
    pub width: u32,
    /// Initial window height.
    pub height: u32,
    /// Target frames per second (None for unlimited).
    pub target_fps: Option<u32>,
    /// Enable Vulkan validation layers (default: debug builds only).
    pub validation: bool,
    /// Frame pacing.
    pub frame: FrameConfig,
    pub log: LogConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            title: "Cadence".to_string(),
            width: 1600,
            height: 900,
            target_fps: None,
            validation: cfg!(debug_assertions),
            frame: FrameConfig::default(),
            log: LogConfig::default(),
        }
    }
}

impl AppConfig {
    /// Create a new config with the given title.
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Default::default()
        }
    }

    /// Set the window dimensions.
    #[must_use]
    pub const fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    /// Set the target FPS.
    #[must_use]
    pub const fn with_target_fps(mut self, fps: u32) -> Self {
        self.target_fps = Some(fps);
        self
    }

    /// Enable or disable vsync.
    #[must_use]
    pub const fn with_vsync(mut self, vsync: bool) -> Self {
        self.frame.vsync = vsync;
        self
    }

    /// Enable or disable validation layers.
    #[must_use]
    pub const fn with_validation(mut self, validation: bool) -> Self {
        self.validation = validation;
        self
    }

    #[must_use]
    pub fn with_frame_config(mut self, frame: FrameConfig) -> Self {
        self.frame = frame;
        self
    }

    #[must_use]
    pub fn with_log_config(mut self, log: LogConfig) -> Self {
        self.log = log;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_demo_window() {
        let config = AppConfig::new("demo");
        assert_eq!(config.title, "demo");
        assert_eq!((config.width, config.height), (1600, 900));
        assert_eq!(config.target_fps, None);
        assert_eq!(config.frame, FrameConfig::default());
    }

    #[test]
    fn vsync_lands_in_frame_config() {
        let config = AppConfig::default().with_vsync(false);
        assert!(!config.frame.vsync);
        let config = config.with_frame_config(FrameConfig::default().with_frames_in_flight(3));
        assert_eq!(config.frame.frames_in_flight, 3);
    }
}

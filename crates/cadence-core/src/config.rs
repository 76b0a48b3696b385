//! Configuration values threaded through initialization.
//!
//! Nothing here is global: the application builds these values and hands them to
//! whichever component needs them.

use std::fs::{self, File};
use std::path::PathBuf;
use std::time::Duration;

use chrono::{Local, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_FRAMES_IN_FLIGHT, MAX_FRAMES_IN_FLIGHT, MIN_FRAMES_IN_FLIGHT};
use crate::error::{Error, Result};

/// How long a blocking fence wait may take and what an elapsed deadline means.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum WaitPolicy {
    /// Wait forever. Used for correctness-critical waits.
    #[default]
    Infinite,
    /// Give up after the duration and report the device as lost.
    DeviceLostAfter(Duration),
    /// Give up after the duration and report a plain timeout to the caller.
    Diagnostic(Duration),
}

impl WaitPolicy {
    /// The deadline for a single wait, if any.
    pub const fn timeout(&self) -> Option<Duration> {
        match self {
            Self::Infinite => None,
            Self::DeviceLostAfter(timeout) | Self::Diagnostic(timeout) => Some(*timeout),
        }
    }

    /// Whether an elapsed deadline should be surfaced as a recoverable timeout
    /// instead of device loss.
    pub const fn is_diagnostic(&self) -> bool {
        matches!(self, Self::Diagnostic(_))
    }
}

/// Frame pacing configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FrameConfig {
    /// Number of frame slots, i.e. how far the CPU may run ahead of the GPU.
    pub frames_in_flight: usize,
    /// Policy for the per-frame backpressure wait.
    pub wait_policy: WaitPolicy,
    /// Prefer a vsync'd present mode.
    pub vsync: bool,
    /// Attach a depth buffer to every render target.
    pub depth: bool,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            frames_in_flight: DEFAULT_FRAMES_IN_FLIGHT,
            wait_policy: WaitPolicy::Infinite,
            vsync: true,
            depth: true,
        }
    }
}

impl FrameConfig {
    /// Set the number of frames in flight.
    #[must_use]
    pub const fn with_frames_in_flight(mut self, frames: usize) -> Self {
        self.frames_in_flight = frames;
        self
    }

    /// Set the backpressure wait policy.
    #[must_use]
    pub const fn with_wait_policy(mut self, policy: WaitPolicy) -> Self {
        self.wait_policy = policy;
        self
    }

    /// Enable or disable vsync.
    #[must_use]
    pub const fn with_vsync(mut self, vsync: bool) -> Self {
        self.vsync = vsync;
        self
    }

    /// Enable or disable the depth attachment.
    #[must_use]
    pub const fn with_depth(mut self, depth: bool) -> Self {
        self.depth = depth;
        self
    }

    /// Check that the configuration describes a usable frame ring.
    pub fn validate(&self) -> Result<()> {
        if !(MIN_FRAMES_IN_FLIGHT..=MAX_FRAMES_IN_FLIGHT).contains(&self.frames_in_flight) {
            return Err(Error::InvalidConfig(format!(
                "frames_in_flight must be in {MIN_FRAMES_IN_FLIGHT}..={MAX_FRAMES_IN_FLIGHT}, got {}",
                self.frames_in_flight
            )));
        }
        if self.wait_policy.timeout() == Some(Duration::ZERO) {
            return Err(Error::InvalidConfig(
                "wait timeout must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Logging configuration.
///
/// By default every run also writes `logs/<prefix>_<YYYYmmdd_HHMMSS>.log`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is not set.
    pub filter: String,
    /// Fixed log file. Takes precedence over `directory`.
    pub file: Option<PathBuf>,
    /// Directory receiving one timestamped log file per run.
    pub directory: Option<PathBuf>,
    /// File name prefix for timestamped log files.
    pub prefix: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
            file: None,
            directory: Some(PathBuf::from("logs")),
            prefix: "cadence".to_string(),
        }
    }
}

impl LogConfig {
    /// Set the default filter directive.
    #[must_use]
    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = filter.into();
        self
    }

    /// Mirror log output into a fixed file.
    #[must_use]
    pub fn with_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.file = Some(path.into());
        self
    }

    /// Write timestamped log files into `directory`.
    #[must_use]
    pub fn with_directory(mut self, directory: impl Into<PathBuf>) -> Self {
        self.directory = Some(directory.into());
        self
    }

    #[must_use]
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Log to the console only.
    #[must_use]
    pub fn without_file(mut self) -> Self {
        self.file = None;
        self.directory = None;
        self
    }

    /// Log file for a run started at `started`, if file logging is enabled.
    pub fn file_path(&self, started: NaiveDateTime) -> Option<PathBuf> {
        if let Some(file) = &self.file {
            return Some(file.clone());
        }
        self.directory.as_ref().map(|directory| {
            directory.join(format!(
                "{}_{}.log",
                self.prefix,
                started.format("%Y%m%d_%H%M%S")
            ))
        })
    }

    /// Create the log file for a run starting now, including its directory.
    pub fn create_file(&self) -> Result<Option<(PathBuf, File)>> {
        let Some(path) = self.file_path(Local::now().naive_local()) else {
            return Ok(None);
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let file = File::create(&path)?;
        Ok(Some((path, file)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        FrameConfig::default().validate().unwrap();
    }

    #[test]
    fn rejects_out_of_range_frame_counts() {
        assert!(FrameConfig::default().with_frames_in_flight(0).validate().is_err());
        assert!(FrameConfig::default()
            .with_frames_in_flight(MAX_FRAMES_IN_FLIGHT + 1)
            .validate()
            .is_err());
        FrameConfig::default()
            .with_frames_in_flight(MAX_FRAMES_IN_FLIGHT)
            .validate()
            .unwrap();
    }

    #[test]
    fn rejects_zero_timeout() {
        let config =
            FrameConfig::default().with_wait_policy(WaitPolicy::Diagnostic(Duration::ZERO));
        assert!(config.validate().is_err());
    }

    #[test]
    fn log_config_builder() {
        let config = LogConfig::default()
            .with_filter("cadence_frame=trace")
            .with_file("frames.log");
        assert_eq!(config.filter, "cadence_frame=trace");
        assert_eq!(config.file, Some(PathBuf::from("frames.log")));
        assert_eq!(LogConfig::default().filter, "info");
    }

    #[test]
    fn log_file_path_is_timestamped() {
        let started = chrono::NaiveDate::from_ymd_opt(2024, 3, 9)
            .and_then(|date| date.and_hms_opt(7, 5, 30))
            .unwrap();

        let config = LogConfig::default().with_prefix("demo");
        assert_eq!(
            config.file_path(started),
            Some(PathBuf::from("logs").join("demo_20240309_070530.log"))
        );

        let fixed = config.clone().with_file("run.log");
        assert_eq!(fixed.file_path(started), Some(PathBuf::from("run.log")));
        assert_eq!(config.without_file().file_path(started), None);
    }

    #[test]
    fn create_file_makes_the_directory() {
        let root = std::env::temp_dir().join(format!("cadence-logs-{}", std::process::id()));
        let config = LogConfig::default().with_directory(root.join("nested"));

        let (path, _file) = config.create_file().unwrap().unwrap();
        assert!(path.exists());
        assert!(path.starts_with(root.join("nested")));
        let _ = fs::remove_dir_all(root);

        assert!(LogConfig::default().without_file().create_file().unwrap().is_none());
    }

    #[test]
    fn create_file_reports_io_errors() {
        let blocker = std::env::temp_dir().join(format!("cadence-blocker-{}", std::process::id()));
        File::create(&blocker).unwrap();
        let config = LogConfig::default().with_directory(blocker.join("logs"));

        assert!(matches!(config.create_file(), Err(Error::Io(_))));
        let _ = fs::remove_file(blocker);
    }

    #[test]
    fn wait_policy_timeouts() {
        let ms = Duration::from_millis(5);
        assert_eq!(WaitPolicy::Infinite.timeout(), None);
        assert_eq!(WaitPolicy::DeviceLostAfter(ms).timeout(), Some(ms));
        assert!(WaitPolicy::Diagnostic(ms).is_diagnostic());
        assert!(!WaitPolicy::DeviceLostAfter(ms).is_diagnostic());
    }
}

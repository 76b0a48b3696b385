//! Cadence demo renderers.
//!
//! Opens a window and drives one of the demo renderers through the frame engine.
//!
//! ## Usage
//!
//! ```bash
//! cargo run -p cadence-demo -- [OPTIONS]
//! ```
//!
//! ## Options
//!
//! - `--variant <NAME>`: `hello-triangle` (default) or `clear-color`
//! - `--frames-in-flight <N>`: Frames the CPU may run ahead (1-8, default: 2)
//! - `--vsync`: Use a vsync'd present mode
//! - `--no-depth`: Do not attach a depth buffer
//! - `--log-file <PATH>`: Write the log file to PATH instead of `logs/`
//! - `--no-log-file`: Log to the console only
//! - `-h, --help`: Print help message
//!
//! ## Environment Variables
//!
//! - `RUST_LOG`: Set log level (e.g., info, debug, trace)

mod clear_color;
mod hello_triangle;

use anyhow::{bail, Context};
use cadence_app::{run_app, AppConfig};
use cadence_core::{FrameConfig, LogConfig};

use crate::clear_color::ClearColor;
use crate::hello_triangle::HelloTriangle;

const WIDTH: u32 = 1600;
const HEIGHT: u32 = 900;

/// Which renderer to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum Variant {
    #[default]
    HelloTriangle,
    ClearColor,
}

impl Variant {
    const fn name(self) -> &'static str {
        match self {
            Self::HelloTriangle => "hello-triangle",
            Self::ClearColor => "clear-color",
        }
    }

    fn parse(name: &str) -> anyhow::Result<Self> {
        match name {
            "hello-triangle" => Ok(Self::HelloTriangle),
            "clear-color" => Ok(Self::ClearColor),
            other => bail!("unknown variant {other:?} (expected hello-triangle or clear-color)"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct DemoArgs {
    variant: Variant,
    frame: FrameConfig,
    log: LogConfig,
}

impl Default for DemoArgs {
    fn default() -> Self {
        Self {
            variant: Variant::default(),
            frame: FrameConfig::default().with_vsync(false),
            log: LogConfig::default(),
        }
    }
}

impl DemoArgs {
    /// Parse arguments (without the program name). `None` means help was requested.
    fn parse<I>(args: I) -> anyhow::Result<Option<Self>>
    where
        I: IntoIterator<Item = String>,
    {
        let mut parsed = Self::default();
        let mut args = args.into_iter();

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "-h" | "--help" => return Ok(None),
                "--variant" => {
                    let name = args.next().context("--variant needs a value")?;
                    parsed.variant = Variant::parse(&name)?;
                }
                "--frames-in-flight" => {
                    let value = args.next().context("--frames-in-flight needs a value")?;
                    let frames = value
                        .parse()
                        .with_context(|| format!("invalid frame count {value:?}"))?;
                    parsed.frame = parsed.frame.with_frames_in_flight(frames);
                }
                "--vsync" => parsed.frame = parsed.frame.with_vsync(true),
                "--no-depth" => parsed.frame = parsed.frame.with_depth(false),
                "--log-file" => {
                    let path = args.next().context("--log-file needs a path")?;
                    parsed.log = parsed.log.with_file(path);
                }
                "--no-log-file" => parsed.log = parsed.log.without_file(),
                other => bail!("unknown argument {other:?} (see --help)"),
            }
        }

        parsed.frame.validate()?;
        Ok(Some(parsed))
    }

    fn app_config(&self) -> AppConfig {
        AppConfig::new(format!("[winit] Cadence: {}", self.variant.name()))
            .with_size(WIDTH, HEIGHT)
            .with_frame_config(self.frame.clone())
            .with_log_config(self.log.clone().with_prefix(self.variant.name()))
    }
}

fn main() -> anyhow::Result<()> {
    let Some(args) = DemoArgs::parse(std::env::args().skip(1))? else {
        print_help();
        return Ok(());
    };

    let config = args.app_config();
    match args.variant {
        Variant::HelloTriangle => run_app::<HelloTriangle>(config),
        Variant::ClearColor => run_app::<ClearColor>(config),
    }
}

fn print_help() {
    eprintln!(
        "Cadence frame engine demo

USAGE:
    cargo run -p cadence-demo -- [OPTIONS]

OPTIONS:
    --variant <NAME>        Renderer to run: hello-triangle, clear-color
                            Default: hello-triangle
    --frames-in-flight <N>  Frames the CPU may run ahead of the GPU (1-8)
                            Default: 2
    --vsync                 Use a vsync'd present mode
    --no-depth              Do not attach a depth buffer
    --log-file <PATH>       Write the log to PATH
                            Default: logs/<variant>_<YYYYmmdd_HHMMSS>.log
    --no-log-file           Log to the console only
    -h, --help              Print this help message

EXAMPLES:
    # Triple-buffered triangle
    cargo run -p cadence-demo -- --frames-in-flight 3

    # Animated clear color with vsync
    cargo run -p cadence-demo -- --variant clear-color --vsync

ENVIRONMENT VARIABLES:
    RUST_LOG                Set log level (e.g., info, debug, trace)"
    );
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    fn parse(args: &[&str]) -> anyhow::Result<Option<DemoArgs>> {
        DemoArgs::parse(args.iter().map(ToString::to_string))
    }

    #[test]
    fn defaults() {
        let args = parse(&[]).unwrap().unwrap();
        assert_eq!(args, DemoArgs::default());
        assert_eq!(args.app_config().title, "[winit] Cadence: hello-triangle");
        assert_eq!((args.app_config().width, args.app_config().height), (1600, 900));
        let log = args.app_config().log;
        assert_eq!(log.prefix, "hello-triangle");
        assert_eq!(log.directory, Some(PathBuf::from("logs")));
    }

    #[test]
    fn all_options() {
        let args = parse(&[
            "--variant",
            "clear-color",
            "--frames-in-flight",
            "3",
            "--vsync",
            "--no-depth",
            "--log-file",
            "demo.log",
        ])
        .unwrap()
        .unwrap();

        assert_eq!(args.variant, Variant::ClearColor);
        assert_eq!(args.frame.frames_in_flight, 3);
        assert!(args.frame.vsync);
        assert!(!args.frame.depth);
        let config = args.app_config();
        assert_eq!(config.title, "[winit] Cadence: clear-color");
        assert_eq!(config.log.file, Some(PathBuf::from("demo.log")));

        let quiet = parse(&["--no-log-file"]).unwrap().unwrap();
        let log = quiet.app_config().log;
        assert_eq!((log.file, log.directory), (None, None));
    }

    #[test]
    fn help_short_circuits() {
        assert!(parse(&["--help", "--bogus"]).unwrap().is_none());
    }

    #[test]
    fn rejects_bad_input() {
        assert!(parse(&["--variant", "ray-tracer"]).is_err());
        assert!(parse(&["--frames-in-flight", "0"]).is_err());
        assert!(parse(&["--frames-in-flight", "many"]).is_err());
        assert!(parse(&["--frames-in-flight"]).is_err());
        assert!(parse(&["--bogus"]).is_err());
    }
}

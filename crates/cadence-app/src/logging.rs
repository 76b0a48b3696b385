//! Logging setup.

use std::sync::Arc;

use anyhow::Context;
use cadence_core::LogConfig;
use tracing::{debug, info};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Install the global `tracing` subscriber described by `config`.
///
/// `RUST_LOG` takes precedence over `config.filter`. Unless file logging is
/// disabled every line is also written, without ANSI colors, to the file picked
/// by [`LogConfig::file_path`].
/// If a global subscriber is already installed, it is left in place.
pub fn init_logging(config: &LogConfig) -> anyhow::Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.filter)
            .with_context(|| format!("invalid log filter {:?}", config.filter))?,
    };

    let (log_path, file_layer) = match config.create_file().context("failed to create log file")? {
        Some((path, file)) => {
            let layer = fmt::layer().with_ansi(false).with_writer(Arc::new(file));
            (Some(path), Some(layer))
        }
        None => (None, None),
    };

    let installed = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .with(file_layer)
        .try_init()
        .is_ok();
    if !installed {
        debug!("a global subscriber is already installed; keeping it");
    }
    if let Some(path) = log_path {
        info!(path = %path.display(), "logging to file");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_init_is_not_an_error() {
        let path = std::env::temp_dir().join(format!("cadence-log-{}.log", std::process::id()));
        let config = LogConfig::default().with_file(&path);

        init_logging(&config).unwrap();
        init_logging(&LogConfig::default().without_file()).unwrap();

        assert!(path.exists());
        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn unwritable_log_file_is_reported() {
        let blocker = std::env::temp_dir().join(format!("cadence-not-a-dir-{}", std::process::id()));
        std::fs::write(&blocker, b"").unwrap();
        let config = LogConfig::default().with_file(blocker.join("out.log"));

        assert!(init_logging(&config).is_err());
        let _ = std::fs::remove_file(blocker);
    }
}

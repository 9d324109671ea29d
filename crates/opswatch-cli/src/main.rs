//! `opswatch`: the operator console.
//!
//! Reads one command per line from stdin and drives an
//! [`EventMonitor`]. Alerts are reported through `tracing` on stderr, so
//! command output on stdout stays readable.
//!
//! # Startup Sequence
//!
//! 1. Load configuration from `$OPSWATCH_CONFIG` or `opswatch.yaml`
//! 2. Initialize structured logging (tracing)
//! 3. Build the monitor with a tracing emitter
//! 4. Read commands until `quit` or end of input
//! 5. Cancel every running alert

mod command;
mod console;
mod render;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use opswatch_core::config::MonitorConfig;
use opswatch_core::emitter::TracingEmitter;
use opswatch_core::monitor::EventMonitor;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::command::{Command, CommandError};

/// Config file used when `OPSWATCH_CONFIG` is not set.
const DEFAULT_CONFIG_PATH: &str = "opswatch.yaml";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Load configuration.
    let (config, config_path) = load_config()?;

    // 2. Initialize structured logging.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.logging.level)),
        )
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    match &config_path {
        Some(path) => info!(path = %path.display(), "Configuration loaded"),
        None => info!("Config file not found, using defaults"),
    }

    // 3. Build the monitor.
    let monitor = EventMonitor::from_config(&config, Arc::new(TracingEmitter))
        .context("failed to build event monitor")?;
    info!(
        repeat_interval_ms = u64::try_from(monitor.repeat_interval().as_millis()).unwrap_or(u64::MAX),
        sound = config.alert.enable_sound,
        visual = config.alert.enable_visual,
        "opswatch ready"
    );

    // 4. Command loop.
    let mut stdout = tokio::io::stdout();
    stdout.write_all(b"opswatch: type `help` for commands\n").await?;
    stdout.flush().await?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let output = match command::parse(&line) {
            Ok(Command::Quit) => break,
            Ok(cmd) => console::execute(&monitor, cmd).await,
            Err(CommandError::Empty) => continue,
            Err(e) => {
                warn!(input = %line.trim(), "Rejected operator input: {e}");
                format!("{e}\n")
            }
        };
        stdout.write_all(output.as_bytes()).await?;
        stdout.flush().await?;
    }

    // 5. Shut down.
    monitor.shutdown().await;
    info!("opswatch shutdown complete");
    Ok(())
}

/// Load configuration from `$OPSWATCH_CONFIG`, falling back to
/// `opswatch.yaml` in the working directory.
fn load_config() -> anyhow::Result<(MonitorConfig, Option<PathBuf>)> {
    resolve_config(
        std::env::var_os("OPSWATCH_CONFIG").map(PathBuf::from),
        Path::new(DEFAULT_CONFIG_PATH),
    )
}

/// Load `explicit` if given, else `default_path` if it exists.
///
/// Only a missing default file yields the defaults (with environment
/// overrides applied); the returned path is `None` in that case. An
/// explicit path must exist.
fn resolve_config(
    explicit: Option<PathBuf>,
    default_path: &Path,
) -> anyhow::Result<(MonitorConfig, Option<PathBuf>)> {
    let path = match explicit {
        Some(path) if !path.exists() => {
            anyhow::bail!("OPSWATCH_CONFIG points to {}, which does not exist", path.display())
        }
        Some(path) => path,
        None if default_path.exists() => default_path.to_path_buf(),
        None => {
            let mut config = MonitorConfig::default();
            config.apply_env_overrides()?;
            config.validate()?;
            return Ok((config, None));
        }
    };

    let config = MonitorConfig::from_file(&path)
        .with_context(|| format!("failed to load {}", path.display()))?;
    Ok((config, Some(path)))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn scratch_file(name: &str, contents: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!("opswatch-{}-{name}", std::process::id()));
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn explicit_missing_config_is_an_error() {
        let missing = std::env::temp_dir().join("opswatch-no-such-config.yaml");
        let err = resolve_config(Some(missing), Path::new(DEFAULT_CONFIG_PATH)).unwrap_err();
        assert!(err.to_string().starts_with("OPSWATCH_CONFIG points to"));
    }

    #[test]
    fn explicit_config_overrides_default() {
        let path = scratch_file("explicit.yaml", "alert:\n  max_active_alerts: 7\n");
        let (config, loaded) =
            resolve_config(Some(path.clone()), Path::new("/definitely/not/here.yaml")).unwrap();
        assert_eq!(config.alert.max_active_alerts, 7);
        assert_eq!(loaded, Some(path.clone()));
        std::fs::remove_file(path).unwrap();
    }

    #[test]
    fn missing_default_config_falls_back_to_defaults() {
        let (config, loaded) = resolve_config(None, Path::new("/definitely/not/here.yaml")).unwrap();
        assert_eq!(loaded, None);
        assert_eq!(config.alert.max_active_alerts, MonitorConfig::default().alert.max_active_alerts);
    }

    #[test]
    fn present_default_config_is_loaded() {
        let path = scratch_file("default.yaml", "repository:\n  max_events: 12\n");
        let (config, loaded) = resolve_config(None, &path).unwrap();
        assert_eq!(config.repository.max_events, Some(12));
        assert_eq!(loaded.as_deref(), Some(path.as_path()));
        std::fs::remove_file(path).unwrap();
    }
}

//! Logging setup: a rotating file sink plus a human-readable stdout sink,
//! both driven by `tracing-subscriber`'s `EnvFilter`.

use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing_subscriber::{
    fmt,
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

/// Configuration for the logging system.
pub struct LogConfig {
    /// Directory where rotating log files are stored.
    pub log_dir: PathBuf,
    /// Filename prefix for rotated log files.
    pub file_prefix: String,
    /// Whether to also write logs to file (on top of stdout).
    pub log_to_file: bool,
    /// Default level filter, overridden by `RUST_LOG` when set.
    pub log_level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        let log_dir = dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".config")
            .join("park")
            .join("logs");

        Self {
            log_dir,
            file_prefix: "park-sync".to_string(),
            log_to_file: true,
            log_level: "info".to_string(),
        }
    }
}

/// Guard that must be kept alive for the program's lifetime so buffered log
/// writes are flushed on shutdown.
pub struct LogGuard {
    _worker_guard: Option<tracing_appender::non_blocking::WorkerGuard>,
}

/// Initialize `tracing` with an env-filter, a compact stdout layer, and
/// (when enabled) a daily-rotating file layer.
pub fn init_logging(config: LogConfig) -> Result<LogGuard> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let stdout_layer = fmt::layer()
        .compact()
        .with_target(true)
        .with_line_number(true)
        .with_ansi(true);

    if config.log_to_file {
        std::fs::create_dir_all(&config.log_dir)
            .context("failed to create log directory")?;

        let file_appender = tracing_appender::rolling::daily(&config.log_dir, &config.file_prefix);
        let (non_blocking_file, worker_guard) = tracing_appender::non_blocking(file_appender);

        let file_layer = fmt::layer()
            .compact()
            .with_writer(non_blocking_file)
            .with_target(true)
            .with_ansi(false);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(stdout_layer)
            .with(file_layer)
            .init();

        tracing::info!(target: "main", log_dir = %config.log_dir.display(), "Logging initialized");

        Ok(LogGuard {
            _worker_guard: Some(worker_guard),
        })
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(stdout_layer)
            .init();

        tracing::info!(target: "main", "Logging initialized (stdout only)");

        Ok(LogGuard {
            _worker_guard: None,
        })
    }
}

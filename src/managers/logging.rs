//! Logging setup with file rotation
//!
//! Two outputs:
//! - Console (stderr): INFO and above, concise
//! - File: the configured level, rotated daily, old files pruned at start-up

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

use crate::config::{expand_tilde, GlobalConfig};

/// Prefix of every log file name
const LOG_FILE_PREFIX: &str = "packvault";

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub log_directory: PathBuf,
    /// Level of the file output (console is always INFO)
    pub log_level: Level,
    /// Number of rotated files kept
    pub max_files: u32,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_directory: PathBuf::from("~/.packvault/logs"),
            log_level: Level::INFO,
            max_files: 10,
        }
    }
}

impl LoggingConfig {
    pub fn from_global(global: &GlobalConfig) -> Self {
        Self {
            log_directory: expand_tilde(&global.log_directory),
            log_level: parse_level(&global.log_level),
            max_files: global.log_max_files,
        }
    }
}

/// Unknown level names fall back to INFO
pub fn parse_level(name: &str) -> Level {
    match name.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" | "warning" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    }
}

/// Install the console and file subscribers.
///
/// The returned guard flushes buffered file output when dropped, so keep it
/// alive until the process exits.
pub fn init_logging(config: &LoggingConfig) -> Result<LogGuard> {
    let log_dir = expand_tilde(&config.log_directory);
    fs::create_dir_all(&log_dir)
        .with_context(|| format!("Failed to create log directory: {}", log_dir.display()))?;

    let file_appender = RollingFileAppender::new(
        Rotation::DAILY,
        &log_dir,
        format!("{}.log", LOG_FILE_PREFIX),
    );
    let (non_blocking, file_guard) = tracing_appender::non_blocking(file_appender);

    let file_layer = fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_target(true)
        .with_level(true)
        .with_filter(level_filter(config.log_level));

    let console_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(true)
        .with_target(false)
        .with_level(true)
        .with_filter(level_filter(Level::INFO));

    tracing_subscriber::registry()
        .with(file_layer)
        .with(console_layer)
        .try_init()
        .context("Failed to install the log subscriber")?;

    cleanup_old_logs(&log_dir, config.max_files)?;

    Ok(LogGuard {
        _file_guard: file_guard,
    })
}

/// Console-only logging, for commands that run without a config file
pub fn init_console_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    // A subscriber may already be installed (tests); keep it
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_level(true)
        .try_init();
}

/// `RUST_LOG` wins; otherwise our crate at `level` and everything else at WARN
fn level_filter(level: Level) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("warn,packvault={}", level)))
}

/// Keep only the newest `max_files` log files
fn cleanup_old_logs(log_dir: &Path, max_files: u32) -> Result<()> {
    let mut log_files: Vec<_> = fs::read_dir(log_dir)?
        .filter_map(|entry| entry.ok())
        .filter(|entry| {
            entry
                .file_name()
                .to_string_lossy()
                .starts_with(LOG_FILE_PREFIX)
        })
        .collect();

    // Newest first
    log_files.sort_by(|a, b| {
        let a_time = a.metadata().and_then(|m| m.modified()).ok();
        let b_time = b.metadata().and_then(|m| m.modified()).ok();
        b_time.cmp(&a_time)
    });

    for file in log_files.into_iter().skip(max_files as usize) {
        if let Err(e) = fs::remove_file(file.path()) {
            tracing::warn!("Failed to remove old log file {}: {}", file.path().display(), e);
        } else {
            tracing::debug!("Removed old log file: {}", file.path().display());
        }
    }

    Ok(())
}

/// Keeps the background log writer alive
pub struct LogGuard {
    _file_guard: WorkerGuard,
}

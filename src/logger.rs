//! Logging setup: stderr output plus an optional daily-rotated log file.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use time::macros::format_description;
use tracing::Level;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::fmt;
use tracing_subscriber::fmt::time::OffsetTime;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

use crate::error::{Error, Result};

const LOG_RETENTION: Duration = Duration::from_secs(2 * 24 * 60 * 60);

/// Inputs to [`init`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogSettings {
    /// Used as the log file name prefix
    pub app_name: String,
    /// Count of `-d/--debug` flags
    pub verbosity: u8,
    /// Directory for rotated log files; none means stderr only
    pub log_dir: Option<PathBuf>,
}

impl LogSettings {
    pub fn new(app_name: impl Into<String>, verbosity: u8) -> Self {
        Self {
            app_name: app_name.into(),
            verbosity,
            log_dir: None,
        }
    }

    pub fn log_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.log_dir = Some(dir.into());
        self
    }
}

/// Map a debug count to the most verbose level shown.
pub fn level_for(verbosity: u8) -> Level {
    match verbosity {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    }
}

/// Install the global subscriber.
///
/// `RUST_LOG` takes precedence over the verbosity count. Fails if a global
/// subscriber is already set.
pub fn init(settings: &LogSettings) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::default().add_directive(level_for(settings.verbosity).into())
    });

    let time_format = format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");
    let local_offset = time::UtcOffset::current_local_offset().unwrap_or(time::UtcOffset::UTC);
    let timer = OffsetTime::new(local_offset, time_format);

    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .with_target(false)
        .with_timer(timer.clone());

    let file_layer = match &settings.log_dir {
        Some(dir) => {
            fs::create_dir_all(dir)?;
            cleanup_old_logs(dir, &settings.app_name)?;
            let appender = RollingFileAppender::builder()
                .rotation(Rotation::DAILY)
                .filename_prefix(settings.app_name.as_str())
                .filename_suffix("log")
                .build(dir)
                .map_err(|e| Error::Logging(e.to_string()))?;
            Some(
                fmt::layer()
                    .with_writer(appender)
                    .with_ansi(false)
                    .with_target(true)
                    .with_file(true)
                    .with_line_number(true)
                    .with_timer(timer),
            )
        }
        None => None,
    };

    let subscriber = tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer);

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| Error::Logging(format!("Failed to set global subscriber: {e}")))
}

/// Remove `prefix*` log files in `log_dir` older than two days.
pub fn cleanup_old_logs(log_dir: &Path, prefix: &str) -> Result<()> {
    let cutoff = SystemTime::now() - LOG_RETENTION;

    if !log_dir.exists() {
        return Ok(());
    }

    for entry in fs::read_dir(log_dir)? {
        let entry = entry?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }

        let is_ours = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.starts_with(prefix));
        if !is_ours {
            continue;
        }

        if let Ok(modified) = entry.metadata().and_then(|m| m.modified()) {
            if modified < cutoff {
                let _ = fs::remove_file(&path);
            }
        }
    }

    Ok(())
}

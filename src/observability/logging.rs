//! Structured logging.
//!
//! # Responsibilities
//! - Map the operator's numeric level (0..=3) onto tracing levels
//! - Append log lines to the configured file through a non-blocking writer
//! - Flush everything on close
//!
//! # Design Decisions
//! - Uses tracing crate for structured logging
//! - Text format by default, JSON when configured
//! - `RUST_LOG` overrides the configured level when set

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::level_filters::LevelFilter;
use tracing::Subscriber;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{EnvFilter, Layer};

use crate::config::{LogFormat, LoggingConfig};

/// Highest accepted numeric log level.
pub const MAX_LOG_LEVEL: u8 = 3;

/// Operator-facing log levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Debug = 0,
    Info = 1,
    Warn = 2,
    /// Only conditions that stop the daemon.
    Emerg = 3,
}

impl LogLevel {
    pub fn level_filter(&self) -> LevelFilter {
        match self {
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Warn => LevelFilter::WARN,
            LogLevel::Emerg => LevelFilter::ERROR,
        }
    }
}

impl TryFrom<u8> for LogLevel {
    type Error = LoggingError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(LogLevel::Debug),
            1 => Ok(LogLevel::Info),
            2 => Ok(LogLevel::Warn),
            3 => Ok(LogLevel::Emerg),
            other => Err(LoggingError::InvalidLevel(other)),
        }
    }
}

/// Error type for logger setup.
#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("log level must be one of 0 1 2 3, got {0}")]
    InvalidLevel(u8),

    #[error("log level is not configured")]
    MissingLevel,

    #[error("log file is not configured")]
    MissingFile,

    #[error("cannot open log file {path:?}: {source}")]
    OpenFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("a global logger is already installed")]
    AlreadyInstalled,
}

/// Keeps the background log writer alive.
///
/// Dropping or closing the handle flushes buffered lines to the file.
#[derive(Debug)]
pub struct LoggerHandle {
    _guard: WorkerGuard,
}

impl LoggerHandle {
    /// Flush and stop the log writer.
    pub fn close(self) {
        drop(self);
    }
}

/// Install the global subscriber described by `config`.
pub fn init_logging(config: &LoggingConfig) -> Result<LoggerHandle, LoggingError> {
    let level = LogLevel::try_from(config.level.ok_or(LoggingError::MissingLevel)?)?;
    let path = config.file.as_deref().ok_or(LoggingError::MissingFile)?;

    let (writer, guard) = open_log_file(path)?;
    let subscriber = build_subscriber(level, config.format, writer);
    tracing::subscriber::set_global_default(subscriber)
        .map_err(|_| LoggingError::AlreadyInstalled)?;

    Ok(LoggerHandle { _guard: guard })
}

/// Open `path` for appending behind a non-blocking writer.
pub fn open_log_file(path: &Path) -> Result<(NonBlocking, WorkerGuard), LoggingError> {
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|source| LoggingError::OpenFile {
            path: path.to_path_buf(),
            source,
        })?;
    Ok(tracing_appender::non_blocking(file))
}

/// Build a subscriber writing to `writer` at `level`.
pub fn build_subscriber(
    level: LogLevel,
    format: LogFormat,
    writer: NonBlocking,
) -> Box<dyn Subscriber + Send + Sync> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::default().add_directive(level.level_filter().into()));

    let fmt_layer = match format {
        LogFormat::Text => tracing_subscriber::fmt::layer()
            .with_writer(writer)
            .with_ansi(false)
            .boxed(),
        LogFormat::Json => tracing_subscriber::fmt::layer()
            .json()
            .with_writer(writer)
            .boxed(),
    };

    Box::new(tracing_subscriber::registry().with(fmt_layer).with(filter))
}

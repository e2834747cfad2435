//! Top-level error type for the daemon binary.

use thiserror::Error;

use crate::config::ConfigError;
use crate::lifecycle::StartupError;
use crate::observability::LoggingError;
use crate::server::ServerError;

/// Everything that can end the process with a failure.
#[derive(Debug, Error)]
pub enum DaemonError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("logger setup failed: {0}")]
    Logging(#[from] LoggingError),

    #[error("startup failed: {0}")]
    Startup(#[from] StartupError),

    #[error("server stopped: {0}")]
    Server(#[from] ServerError),

    #[error("cannot build runtime: {0}")]
    Runtime(#[source] std::io::Error),
}

impl DaemonError {
    /// Process exit status for this error.
    pub fn exit_code(&self) -> u8 {
        1
    }
}

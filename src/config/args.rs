//! Command-line arguments.
//!
//! Every flag overrides the matching value from the optional `--config` file.

use std::path::PathBuf;

use clap::Parser;

use crate::config::loader::{finalize, load_config, ConfigError};
use crate::config::schema::DaemonConfig;

#[derive(Parser, Debug, Clone)]
#[command(name = "flash-policyd", version)]
#[command(about = "Answers Flash socket policy requests with a preloaded policy file", long_about = None)]
pub struct Args {
    /// Listening port
    #[arg(short, long, env = "POLICYD_PORT")]
    pub port: Option<u16>,

    /// Policy file to send
    #[arg(short = 'f', long = "policy-file", env = "POLICYD_POLICY_FILE")]
    pub policy_file: Option<PathBuf>,

    /// Log output level: 0 = DEBUG, 1 = INFO, 2 = WARN, 3 = EMERG
    #[arg(short = 'l', long = "log-level", env = "POLICYD_LOG_LEVEL")]
    pub log_level: Option<u8>,

    /// Log file path
    #[arg(short = 'r', long = "log-file", env = "POLICYD_LOG_FILE")]
    pub log_file: Option<PathBuf>,

    /// Optional TOML configuration file
    #[arg(short, long, env = "POLICYD_CONFIG")]
    pub config: Option<PathBuf>,

    /// Address to bind
    #[arg(long)]
    pub bind: Option<String>,

    /// Connections serviced at the same time
    #[arg(long)]
    pub max_in_flight: Option<usize>,

    /// Milliseconds a client may stay silent before it is disconnected
    #[arg(long)]
    pub timeout_ms: Option<u64>,
}

impl Args {
    /// Merge the config file (if any) with the flags and validate the result.
    pub fn into_config(self) -> Result<DaemonConfig, ConfigError> {
        let mut config = match &self.config {
            Some(path) => load_config(path)?,
            None => DaemonConfig::default(),
        };

        if let Some(port) = self.port {
            config.listener.port = Some(port);
        }
        if let Some(path) = self.policy_file {
            config.policy.path = Some(path);
        }
        if let Some(level) = self.log_level {
            config.logging.level = Some(level);
        }
        if let Some(file) = self.log_file {
            config.logging.file = Some(file);
        }
        if let Some(bind) = self.bind {
            config.listener.bind_address = bind;
        }
        if let Some(max_in_flight) = self.max_in_flight {
            config.listener.max_in_flight = max_in_flight;
        }
        if let Some(timeout_ms) = self.timeout_ms {
            config.connection.timeout_ms = timeout_ms;
        }

        finalize(config)
    }
}

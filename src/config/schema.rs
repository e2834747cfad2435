//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the daemon.
//! All types derive Serde traits for deserialization from config files.
//! The four operator-mandatory values (port, policy file, log level, log file)
//! are `Option`s here so a partial file can be completed from the command line;
//! validation rejects the config if any of them is still missing.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::policy::DEFAULT_CAPACITY;

/// Root configuration for the policy daemon.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct DaemonConfig {
    /// Listener configuration (bind address, port, backlog, concurrency).
    pub listener: ListenerConfig,

    /// Policy document source.
    pub policy: PolicyConfig,

    /// Per-connection behaviour.
    pub connection: ConnectionConfig,

    /// Log output.
    pub logging: LoggingConfig,

    /// Metrics exposition.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Address to bind (e.g. "0.0.0.0").
    pub bind_address: String,

    /// TCP port to listen on. Mandatory.
    pub port: Option<u16>,

    /// Pending connection queue length passed to `listen(2)`.
    pub backlog: u32,

    /// Maximum connections serviced at the same time.
    ///
    /// `1` accepts the next client only after the current one has been
    /// answered, disconnected or evicted.
    pub max_in_flight: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            port: None,
            backlog: 5,
            max_in_flight: 1,
        }
    }
}

/// Policy document source.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PolicyConfig {
    /// Path of the policy file. Mandatory.
    pub path: Option<PathBuf>,

    /// Size of the response buffer in bytes.
    pub capacity: usize,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            path: None,
            capacity: DEFAULT_CAPACITY,
        }
    }
}

/// What to do when reading from a client socket fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ReadFailurePolicy {
    /// Stop the whole daemon.
    #[default]
    Terminate,
    /// Log the failure and drop only the affected connection.
    CloseConnection,
}

/// Per-connection behaviour.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ConnectionConfig {
    /// How long a client may stay connected without sending the request.
    pub timeout_ms: u64,

    /// Reaction to a failed receive.
    pub read_failure: ReadFailurePolicy,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 5_000,
            read_failure: ReadFailurePolicy::default(),
        }
    }
}

/// Log line encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Log output configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct LoggingConfig {
    /// Numeric level: 0 = DEBUG, 1 = INFO, 2 = WARN, 3 = EMERG. Mandatory.
    pub level: Option<u8>,

    /// File the log is appended to. Mandatory.
    pub file: Option<PathBuf>,

    /// Line format.
    pub format: LogFormat,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Enable the Prometheus scrape endpoint.
    pub metrics_enabled: bool,

    /// Address of the scrape endpoint.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9464".to_string(),
        }
    }
}

//! Configuration validation.
//!
//! # Responsibilities
//! - Check that every mandatory value was supplied (file or command line)
//! - Validate value ranges (log level 0..=3, non-zero sizes and timeouts)
//! - Validate addresses parse before any socket is opened
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: DaemonConfig → Result<(), Vec<ValidationError>>

use std::net::{IpAddr, SocketAddr};

use thiserror::Error;
use tokio::sync::Semaphore;

use crate::config::schema::DaemonConfig;
use crate::observability::logging::MAX_LOG_LEVEL;

/// A single semantic problem with a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("listening port is required (-p)")]
    MissingPort,

    #[error("port must be non-zero")]
    ZeroPort,

    #[error("policy file is required (-f)")]
    MissingPolicyFile,

    #[error("log level is required (-l)")]
    MissingLogLevel,

    #[error("log level must be one of 0 1 2 3, got {0}")]
    LogLevelOutOfRange(u8),

    #[error("log file is required (-r)")]
    MissingLogFile,

    #[error("invalid bind address {0:?}")]
    InvalidBindAddress(String),

    #[error("backlog must be non-zero")]
    ZeroBacklog,

    #[error("max_in_flight must be at least 1")]
    ZeroInFlight,

    #[error("max_in_flight {0} is larger than the semaphore supports")]
    InFlightTooLarge(usize),

    #[error("policy capacity must be non-zero")]
    ZeroCapacity,

    #[error("connection timeout must be non-zero")]
    ZeroTimeout,

    #[error("invalid metrics address {0:?}")]
    InvalidMetricsAddress(String),
}

/// Check a fully merged configuration.
pub fn validate_config(config: &DaemonConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    match config.listener.port {
        None => errors.push(ValidationError::MissingPort),
        Some(0) => errors.push(ValidationError::ZeroPort),
        Some(_) => {}
    }

    if config.policy.path.is_none() {
        errors.push(ValidationError::MissingPolicyFile);
    }

    match config.logging.level {
        None => errors.push(ValidationError::MissingLogLevel),
        Some(level) if level > MAX_LOG_LEVEL => {
            errors.push(ValidationError::LogLevelOutOfRange(level))
        }
        Some(_) => {}
    }

    if config.logging.file.is_none() {
        errors.push(ValidationError::MissingLogFile);
    }

    if config.listener.bind_address.parse::<IpAddr>().is_err() {
        errors.push(ValidationError::InvalidBindAddress(
            config.listener.bind_address.clone(),
        ));
    }

    if config.listener.backlog == 0 {
        errors.push(ValidationError::ZeroBacklog);
    }

    match config.listener.max_in_flight {
        0 => errors.push(ValidationError::ZeroInFlight),
        n if n > Semaphore::MAX_PERMITS => errors.push(ValidationError::InFlightTooLarge(n)),
        _ => {}
    }

    if config.policy.capacity == 0 {
        errors.push(ValidationError::ZeroCapacity);
    }

    if config.connection.timeout_ms == 0 {
        errors.push(ValidationError::ZeroTimeout);
    }

    if config.observability.metrics_enabled
        && config
            .observability
            .metrics_address
            .parse::<SocketAddr>()
            .is_err()
    {
        errors.push(ValidationError::InvalidMetricsAddress(
            config.observability.metrics_address.clone(),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

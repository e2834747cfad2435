//! Startup orchestration.
//!
//! Order: backend selection → policy load → bind → metrics. Any failure is
//! fatal and logged before it is returned.

use std::net::SocketAddr;
use std::sync::Arc;

use thiserror::Error;

use crate::config::DaemonConfig;
use crate::observability::metrics;
use crate::policy::{PolicyDocument, PolicyError};
use crate::server::{PolicyServer, ServerError};

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("policy file is not configured")]
    MissingPolicyFile,

    #[error(transparent)]
    Policy(#[from] PolicyError),

    #[error(transparent)]
    Server(#[from] ServerError),
}

/// Load the policy and bind the server. Must run inside a Tokio runtime.
pub fn start(config: &DaemonConfig) -> Result<PolicyServer, StartupError> {
    tracing::debug!(version = env!("CARGO_PKG_VERSION"), "Flash policy daemon starting");

    let path = config
        .policy
        .path
        .as_deref()
        .ok_or(StartupError::MissingPolicyFile)?;

    tracing::debug!(path = %path.display(), "Storing policy in memory");
    let policy = PolicyDocument::load(path, config.policy.capacity).map_err(|e| {
        tracing::error!(path = %path.display(), error = %e, "Cannot load policy file, put it in place and restart");
        e
    })?;

    tracing::debug!(
        address = %config.listener.bind_address,
        port = ?config.listener.port,
        "Binding socket"
    );
    let server = PolicyServer::bind(config, Arc::new(policy)).map_err(|e| {
        tracing::error!(error = %e, "Cannot open listening socket");
        e
    })?;

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse::<SocketAddr>() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    tracing::debug!(backend = %server.backend(), "Socket created and listening");
    Ok(server)
}

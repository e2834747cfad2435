//! Policy server.
//!
//! # Responsibilities
//! - Run the accept loop on the bound listener
//! - Spawn one task per accepted client on the shared runtime
//! - Apply the read-failure policy to connections that end in error
//! - Stop accepting on shutdown and drain in-flight clients
//!
//! # Design Decisions
//! - All clients share one scheduler; `max_in_flight` on the listener is the
//!   only thing that serializes them
//! - A receive failure stops the daemon unless the policy says otherwise
//! - An accept failure other than an interrupted call stops the daemon

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::broadcast;
use tokio::task::{JoinError, JoinSet};
use tracing::Instrument;

use crate::config::{ConnectionConfig, DaemonConfig, ReadFailurePolicy};
use crate::net::backend::{self, Backend};
use crate::net::connection::{
    Connection, ConnectionError, ConnectionId, ConnectionOutcome, ConnectionTracker,
};
use crate::net::listener::{Listener, ListenerError};
use crate::policy::PolicyDocument;

/// Errors that stop the server.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error(transparent)]
    Listener(#[from] ListenerError),

    #[error("{id}: receive failed: {source}")]
    ReadFailure {
        id: ConnectionId,
        #[source]
        source: io::Error,
    },
}

type ConnectionResult = (ConnectionId, Result<ConnectionOutcome, ConnectionError>);

/// Accept loop plus the connection tasks it spawned.
#[derive(Debug)]
pub struct PolicyServer {
    listener: Listener,
    policy: Arc<PolicyDocument>,
    timeout: Duration,
    read_failure: ReadFailurePolicy,
    tracker: ConnectionTracker,
    backend: Backend,
}

impl PolicyServer {
    /// Bind the listener described by `config` and prepare to serve `policy`.
    pub fn bind(config: &DaemonConfig, policy: Arc<PolicyDocument>) -> Result<Self, ServerError> {
        let listener = Listener::bind(&config.listener)?;
        Ok(Self::new(
            listener,
            policy,
            &config.connection,
            backend::select_host_backend(),
        ))
    }

    pub fn new(
        listener: Listener,
        policy: Arc<PolicyDocument>,
        connection: &ConnectionConfig,
        backend: Backend,
    ) -> Self {
        Self {
            listener,
            policy,
            timeout: Duration::from_millis(connection.timeout_ms),
            read_failure: connection.read_failure,
            tracker: ConnectionTracker::new(),
            backend,
        }
    }

    pub fn local_addr(&self) -> Result<SocketAddr, io::Error> {
        self.listener.local_addr()
    }

    /// Handle for observing connection counts while the server runs.
    pub fn tracker(&self) -> ConnectionTracker {
        self.tracker.clone()
    }

    pub fn backend(&self) -> Backend {
        self.backend
    }

    /// Serve clients until `shutdown` fires or a fatal error occurs.
    pub async fn run(self, shutdown: broadcast::Receiver<()>) -> Result<(), ServerError> {
        let address = self
            .local_addr()
            .map(|a| a.to_string())
            .unwrap_or_else(|_| "unknown".into());
        let span = tracing::info_span!("server", %address, backend = %self.backend);
        self.serve(shutdown).instrument(span).await
    }

    async fn serve(self, mut shutdown: broadcast::Receiver<()>) -> Result<(), ServerError> {
        let mut connections: JoinSet<ConnectionResult> = JoinSet::new();

        tracing::debug!(
            max_in_flight = self.listener.max_in_flight(),
            "Ready to process clients"
        );

        loop {
            tokio::select! {
                biased;
                _ = shutdown.recv() => {
                    tracing::info!("Shutdown requested, no longer accepting");
                    break;
                }
                Some(joined) = connections.join_next() => self.settle(joined)?,
                accepted = self.listener.accept() => {
                    let (stream, peer, permit) = accepted?;
                    tracing::info!(peer = %peer.ip(), "Client connected");

                    let connection = Connection::new(stream, peer, self.tracker.track(), permit);
                    let id = connection.id();
                    let policy = Arc::clone(&self.policy);
                    let timeout = self.timeout;
                    connections.spawn(async move { (id, connection.run(policy, timeout).await) });
                }
            }
        }

        while let Some(joined) = connections.join_next().await {
            self.settle(joined)?;
        }

        tracing::info!(stats = ?self.tracker.stats(), "Server stopped");
        Ok(())
    }

    fn settle(&self, joined: Result<ConnectionResult, JoinError>) -> Result<(), ServerError> {
        match joined {
            Ok((id, Ok(outcome))) => {
                tracing::debug!(connection_id = %id, outcome = outcome.as_str(), "Connection finished");
                Ok(())
            }
            Ok((id, Err(ConnectionError::Read(source)))) => match self.read_failure {
                ReadFailurePolicy::Terminate => {
                    tracing::error!(connection_id = %id, error = %source, "Receive failed, stopping");
                    Err(ServerError::ReadFailure { id, source })
                }
                ReadFailurePolicy::CloseConnection => {
                    tracing::warn!(connection_id = %id, error = %source, "Receive failed, connection dropped");
                    Ok(())
                }
            },
            Err(e) => {
                tracing::error!(error = %e, "Connection task failed");
                Ok(())
            }
        }
    }
}

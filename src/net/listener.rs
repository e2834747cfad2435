//! TCP listener implementation with backpressure.
//!
//! # Responsibilities
//! - Bind to the configured address with address reuse and a fixed backlog
//! - Accept incoming TCP connections
//! - Enforce max_in_flight via semaphore, acquired before accepting
//! - Treat interrupted accepts as non-events

use std::io;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use thiserror::Error;
use tokio::net::{TcpListener, TcpSocket, TcpStream};
use tokio::sync::Semaphore;

use crate::config::ListenerConfig;

/// Error type for listener operations.
#[derive(Debug, Error)]
pub enum ListenerError {
    #[error("invalid bind address {0:?}")]
    InvalidAddress(String),

    #[error("listening port is not configured")]
    MissingPort,

    #[error("max_in_flight {0} exceeds the semaphore limit")]
    TooManyPermits(usize),

    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },

    #[error("failed to accept: {0}")]
    Accept(#[source] io::Error),

    #[error("connection limiter closed")]
    Closed,
}

/// A bounded TCP listener that limits concurrent connections.
///
/// Uses a semaphore to enforce `max_in_flight`. When the limit is reached the
/// listener stops accepting; clients queue in the kernel backlog until a slot
/// becomes available.
#[derive(Debug)]
pub struct Listener {
    /// The underlying TCP listener.
    inner: TcpListener,
    /// Semaphore to limit concurrent connections.
    connection_limit: Arc<Semaphore>,
    /// Configured maximum connections.
    max_in_flight: usize,
}

impl Listener {
    /// Bind to the configured address with connection limits.
    pub fn bind(config: &ListenerConfig) -> Result<Self, ListenerError> {
        let ip: IpAddr = config
            .bind_address
            .parse()
            .map_err(|_| ListenerError::InvalidAddress(config.bind_address.clone()))?;
        let port = config.port.ok_or(ListenerError::MissingPort)?;
        if config.max_in_flight > Semaphore::MAX_PERMITS {
            return Err(ListenerError::TooManyPermits(config.max_in_flight));
        }
        let addr = SocketAddr::new(ip, port);

        let bind_err = |source| ListenerError::Bind { addr, source };

        let socket = match addr {
            SocketAddr::V4(_) => TcpSocket::new_v4(),
            SocketAddr::V6(_) => TcpSocket::new_v6(),
        }
        .map_err(bind_err)?;
        socket.set_reuseaddr(true).map_err(bind_err)?;
        socket.bind(addr).map_err(bind_err)?;
        let listener = socket.listen(config.backlog).map_err(bind_err)?;

        let local_addr = listener.local_addr().map_err(bind_err)?;

        tracing::info!(
            address = %local_addr,
            backlog = config.backlog,
            max_in_flight = config.max_in_flight,
            "Listener bound"
        );

        Ok(Self {
            inner: listener,
            connection_limit: Arc::new(Semaphore::new(config.max_in_flight)),
            max_in_flight: config.max_in_flight,
        })
    }

    /// Accept a new connection, respecting the connection limit.
    ///
    /// This will wait if the connection limit has been reached.
    /// Returns the stream and a permit that must be held for the connection's lifetime.
    pub async fn accept(&self) -> Result<(TcpStream, SocketAddr, ConnectionPermit), ListenerError> {
        // Acquire permit first (backpressure)
        let permit = self
            .connection_limit
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| ListenerError::Closed)?;

        loop {
            match self.inner.accept().await {
                Ok((stream, addr)) => {
                    tracing::debug!(
                        peer_addr = %addr,
                        available_permits = self.connection_limit.available_permits(),
                        "Connection accepted"
                    );
                    return Ok((stream, addr, ConnectionPermit { _permit: permit }));
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {
                    tracing::trace!("Accept interrupted, waiting again");
                }
                Err(e) => return Err(ListenerError::Accept(e)),
            }
        }
    }

    /// Get the local address this listener is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, io::Error> {
        self.inner.local_addr()
    }

    /// Get current available connection slots.
    pub fn available_permits(&self) -> usize {
        self.connection_limit.available_permits()
    }

    /// Get configured maximum connections.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight
    }
}

/// A permit representing a connection slot.
///
/// When dropped, the connection slot is released back to the pool.
/// This keeps backpressure intact even if the connection handler panics.
#[derive(Debug)]
pub struct ConnectionPermit {
    _permit: tokio::sync::OwnedSemaphorePermit,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn loopback(max_in_flight: usize) -> ListenerConfig {
        ListenerConfig {
            bind_address: "127.0.0.1".to_string(),
            port: Some(0),
            backlog: 5,
            max_in_flight,
        }
    }

    #[tokio::test]
    async fn binds_ephemeral_port() {
        let listener = Listener::bind(&loopback(1)).unwrap();
        let addr = listener.local_addr().unwrap();
        assert_ne!(addr.port(), 0);
        assert_eq!(listener.max_in_flight(), 1);
        assert_eq!(listener.available_permits(), 1);
    }

    #[test]
    fn rejects_bad_address() {
        let mut config = loopback(1);
        config.bind_address = "localhost:80".into();
        assert!(matches!(
            Listener::bind(&config),
            Err(ListenerError::InvalidAddress(_))
        ));
    }

    #[test]
    fn requires_port() {
        let mut config = loopback(1);
        config.port = None;
        assert!(matches!(
            Listener::bind(&config),
            Err(ListenerError::MissingPort)
        ));
    }

    #[test]
    fn oversized_limit_is_rejected_before_binding() {
        assert!(matches!(
            Listener::bind(&loopback(usize::MAX)),
            Err(ListenerError::TooManyPermits(usize::MAX))
        ));
    }

    #[tokio::test]
    async fn port_in_use_is_bind_error() {
        let first = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let mut config = loopback(1);
        config.port = Some(first.local_addr().unwrap().port());
        assert!(matches!(
            Listener::bind(&config),
            Err(ListenerError::Bind { .. })
        ));
    }

    #[tokio::test]
    async fn second_accept_waits_for_permit() {
        let listener = Listener::bind(&loopback(1)).unwrap();
        let addr = listener.local_addr().unwrap();

        let _c1 = TcpStream::connect(addr).await.unwrap();
        let _c2 = TcpStream::connect(addr).await.unwrap();

        let (_s1, _, permit) = listener.accept().await.unwrap();
        assert_eq!(listener.available_permits(), 0);

        let blocked = tokio::time::timeout(Duration::from_millis(100), listener.accept()).await;
        assert!(blocked.is_err(), "second client accepted while first in flight");

        drop(permit);
        let second = tokio::time::timeout(Duration::from_secs(1), listener.accept()).await;
        assert!(second.unwrap().is_ok());
    }
}

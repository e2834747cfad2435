//! Connection handling and lifecycle tracking.
//!
//! # Responsibilities
//! - Drive one client through the protocol state machine
//! - Race the client's reads against its one-shot deadline
//! - Generate unique connection IDs for tracing
//! - Count active connections and how each one ended

use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::Instrument;

use crate::net::listener::ConnectionPermit;
use crate::observability::metrics;
use crate::policy::PolicyDocument;
use crate::protocol::{Action, Session, INPUT_BUFFER_SIZE};
use crate::resilience::OneShotTimer;

/// Global atomic counter for connection IDs.
/// Using relaxed ordering is sufficient since we only need uniqueness, not synchronization.
static CONNECTION_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Generate a new unique connection ID.
    pub fn new() -> Self {
        Self(CONNECTION_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// How a connection ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionOutcome {
    /// The client asked for the policy and the write was attempted.
    Served { bytes_written: usize },
    /// The client asked for the policy but the write failed.
    ResponseFailed,
    /// The client disconnected first.
    PeerClosed,
    /// The deadline fired first.
    TimedOut,
}

impl ConnectionOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionOutcome::Served { .. } => "served",
            ConnectionOutcome::ResponseFailed => "response_failed",
            ConnectionOutcome::PeerClosed => "peer_closed",
            ConnectionOutcome::TimedOut => "timed_out",
        }
    }
}

/// Error type for a single connection.
#[derive(Debug, Error)]
pub enum ConnectionError {
    /// Receiving from the client failed.
    #[error("receive failed: {0}")]
    Read(#[source] io::Error),
}

enum Event {
    Read(io::Result<usize>),
    Deadline,
}

/// Run the protocol on `stream` until it reaches a terminal state.
///
/// The stream is not closed here; the caller drops it afterwards.
pub async fn serve_connection<S>(
    stream: &mut S,
    policy: &PolicyDocument,
    timeout: Duration,
) -> Result<ConnectionOutcome, ConnectionError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut session = Session::new();
    let mut timer = OneShotTimer::start(timeout);
    let mut buf = [0u8; INPUT_BUFFER_SIZE];

    loop {
        let event = tokio::select! {
            biased;
            read = stream.read(&mut buf) => Event::Read(read),
            _ = &mut timer => Event::Deadline,
        };

        let action = match event {
            Event::Read(Ok(n)) => session.on_read(&buf[..n]),
            Event::Read(Err(e)) => return Err(ConnectionError::Read(e)),
            Event::Deadline => session.on_timeout(),
        };

        match action {
            Action::Ignore => {
                tracing::debug!(
                    remaining_ms = timer.remaining().as_millis() as u64,
                    "Not a policy request, still waiting"
                );
            }
            Action::SendPolicy => {
                tracing::info!("Sending policy file");
                let outcome = match stream.write(policy.as_bytes()).await {
                    Ok(bytes_written) => {
                        if bytes_written < policy.capacity() {
                            tracing::debug!(
                                bytes_written,
                                capacity = policy.capacity(),
                                "Partial policy write"
                            );
                        }
                        ConnectionOutcome::Served { bytes_written }
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "Failed to send policy");
                        ConnectionOutcome::ResponseFailed
                    }
                };
                session.on_response_sent();
                timer.cancel();
                tracing::info!("Disconnected");
                return Ok(outcome);
            }
            Action::Close => {
                timer.cancel();
                tracing::info!("Disconnected");
                return Ok(ConnectionOutcome::PeerClosed);
            }
            Action::Evict => {
                tracing::warn!(
                    timeout_ms = timer.duration().as_millis() as u64,
                    "timeout: disconnecting client"
                );
                return Ok(ConnectionOutcome::TimedOut);
            }
        }
    }
}

/// An accepted client together with everything it holds until it ends.
#[derive(Debug)]
pub struct Connection {
    stream: TcpStream,
    peer: SocketAddr,
    guard: ConnectionGuard,
    _permit: ConnectionPermit,
}

impl Connection {
    pub fn new(
        stream: TcpStream,
        peer: SocketAddr,
        guard: ConnectionGuard,
        permit: ConnectionPermit,
    ) -> Self {
        Self {
            stream,
            peer,
            guard,
            _permit: permit,
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.guard.id()
    }

    /// Serve the client, then release socket, timer and permit.
    pub async fn run(
        mut self,
        policy: Arc<PolicyDocument>,
        timeout: Duration,
    ) -> Result<ConnectionOutcome, ConnectionError> {
        let span = tracing::info_span!(
            "connection",
            connection_id = %self.guard.id(),
            peer = %self.peer.ip()
        );

        async move {
            let result = serve_connection(&mut self.stream, &policy, timeout).await;
            self.guard.record(&result);
            result
        }
        .instrument(span)
        .await
    }
}

#[derive(Debug, Default)]
struct Counters {
    accepted: AtomicU64,
    served: AtomicU64,
    response_failed: AtomicU64,
    peer_closed: AtomicU64,
    timed_out: AtomicU64,
    read_failed: AtomicU64,
}

/// Point-in-time view of the tracker's counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ConnectionStats {
    pub active: u64,
    /// Connections handed to a handler since startup.
    pub accepted: u64,
    pub served: u64,
    pub response_failed: u64,
    pub peer_closed: u64,
    pub timed_out: u64,
    pub read_failed: u64,
}

impl ConnectionStats {
    /// Connections that reached any end.
    pub fn finished(&self) -> u64 {
        self.served + self.response_failed + self.peer_closed + self.timed_out + self.read_failed
    }
}

/// Tracks active connections and their outcomes.
#[derive(Debug, Clone, Default)]
pub struct ConnectionTracker {
    /// Current count of active connections.
    active_count: Arc<AtomicU64>,
    outcomes: Arc<Counters>,
}

impl ConnectionTracker {
    /// Create a new connection tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a new active connection. Returns a guard that decrements on drop.
    pub fn track(&self) -> ConnectionGuard {
        self.active_count.fetch_add(1, Ordering::SeqCst);
        self.outcomes.accepted.fetch_add(1, Ordering::SeqCst);
        metrics::connection_opened();
        ConnectionGuard {
            active_count: Arc::clone(&self.active_count),
            outcomes: Arc::clone(&self.outcomes),
            id: ConnectionId::new(),
        }
    }

    /// Get current active connection count.
    pub fn active_count(&self) -> u64 {
        self.active_count.load(Ordering::SeqCst)
    }

    /// Snapshot all counters.
    pub fn stats(&self) -> ConnectionStats {
        ConnectionStats {
            active: self.active_count(),
            accepted: self.outcomes.accepted.load(Ordering::SeqCst),
            served: self.outcomes.served.load(Ordering::SeqCst),
            response_failed: self.outcomes.response_failed.load(Ordering::SeqCst),
            peer_closed: self.outcomes.peer_closed.load(Ordering::SeqCst),
            timed_out: self.outcomes.timed_out.load(Ordering::SeqCst),
            read_failed: self.outcomes.read_failed.load(Ordering::SeqCst),
        }
    }
}

/// Guard that tracks a connection's lifetime.
/// Decrements active count when dropped.
#[derive(Debug)]
pub struct ConnectionGuard {
    active_count: Arc<AtomicU64>,
    outcomes: Arc<Counters>,
    id: ConnectionId,
}

impl ConnectionGuard {
    /// Get this connection's ID.
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Count how the connection ended.
    pub fn record(&self, result: &Result<ConnectionOutcome, ConnectionError>) {
        let counter = match result {
            Ok(ConnectionOutcome::Served { .. }) => &self.outcomes.served,
            Ok(ConnectionOutcome::ResponseFailed) => &self.outcomes.response_failed,
            Ok(ConnectionOutcome::PeerClosed) => &self.outcomes.peer_closed,
            Ok(ConnectionOutcome::TimedOut) => &self.outcomes.timed_out,
            Err(ConnectionError::Read(_)) => &self.outcomes.read_failed,
        };
        counter.fetch_add(1, Ordering::SeqCst);
        metrics::record_outcome(result);
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.active_count.fetch_sub(1, Ordering::SeqCst);
        metrics::connection_closed();
        tracing::trace!(connection_id = %self.id, "Connection closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LogFormat;
    use crate::observability::logging::{build_subscriber, open_log_file, LogLevel};
    use crate::protocol::REQUEST_TOKEN;
    use std::pin::Pin;
    use std::task::{Context, Poll};
    use tokio::io::{duplex, ReadBuf};

    const POLICY: &[u8] = b"<cross-domain-policy/>";

    fn policy() -> PolicyDocument {
        PolicyDocument::from_bytes(POLICY, 128).unwrap()
    }

    #[test]
    fn connection_id_unique() {
        let id1 = ConnectionId::new();
        let id2 = ConnectionId::new();
        assert_ne!(id1, id2);
        assert!(id2.as_u64() > id1.as_u64());
    }

    #[test]
    fn connection_tracker_counts() {
        let tracker = ConnectionTracker::new();
        assert_eq!(tracker.active_count(), 0);

        let guard1 = tracker.track();
        assert_eq!(tracker.active_count(), 1);

        let guard2 = tracker.track();
        assert_eq!(tracker.active_count(), 2);

        guard1.record(&Ok(ConnectionOutcome::TimedOut));
        drop(guard1);
        assert_eq!(tracker.active_count(), 1);

        guard2.record(&Ok(ConnectionOutcome::Served { bytes_written: 10 }));
        drop(guard2);

        let stats = tracker.stats();
        assert_eq!(stats.active, 0);
        assert_eq!(stats.accepted, 2);
        assert_eq!(stats.timed_out, 1);
        assert_eq!(stats.served, 1);
        assert_eq!(stats.finished(), 2);
    }

    #[tokio::test]
    async fn token_gets_full_buffer() {
        let (mut client, mut server) = duplex(4096);
        client.write_all(REQUEST_TOKEN).await.unwrap();

        let outcome = serve_connection(&mut server, &policy(), Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(outcome, ConnectionOutcome::Served { bytes_written: 128 });
        drop(server);

        let mut response = Vec::new();
        client.read_to_end(&mut response).await.unwrap();
        assert_eq!(response.len(), 128);
        assert_eq!(&response[..POLICY.len()], POLICY);
        assert!(response[POLICY.len()..].iter().all(|&b| b == 0));
    }

    #[tokio::test]
    async fn peer_close_without_data() {
        let (client, mut server) = duplex(64);
        drop(client);

        let outcome = serve_connection(&mut server, &policy(), Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(outcome, ConnectionOutcome::PeerClosed);
    }

    #[tokio::test(start_paused = true)]
    async fn silence_times_out() {
        let (mut client, mut server) = duplex(64);
        let start = tokio::time::Instant::now();

        let outcome = serve_connection(&mut server, &policy(), Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(outcome, ConnectionOutcome::TimedOut);
        assert!(start.elapsed() >= Duration::from_secs(5));

        drop(server);
        let mut response = Vec::new();
        client.read_to_end(&mut response).await.unwrap();
        assert!(response.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn mismatch_waits_for_timeout() {
        let (mut client, mut server) = duplex(64);
        client.write_all(b"hello").await.unwrap();

        let outcome = serve_connection(&mut server, &policy(), Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(outcome, ConnectionOutcome::TimedOut);
    }

    #[tokio::test(start_paused = true)]
    async fn later_matching_read_is_served() {
        let (mut client, mut server) = duplex(4096);

        let writer = tokio::spawn(async move {
            client.write_all(b"hello").await.unwrap();
            tokio::time::sleep(Duration::from_secs(2)).await;
            client.write_all(REQUEST_TOKEN).await.unwrap();
            client
        });

        let outcome = serve_connection(&mut server, &policy(), Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(outcome, ConnectionOutcome::Served { bytes_written: 128 });
        writer.await.unwrap();
    }

    /// Serve `stream` with the daemon's file logger installed and return what it wrote.
    async fn serve_logged<S>(stream: &mut S, timeout: Duration) -> (ConnectionOutcome, String)
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("policyd.log");
        let (writer, guard) = open_log_file(&path).unwrap();
        let subscriber = build_subscriber(LogLevel::Debug, LogFormat::Text, writer);

        let outcome = {
            let _default = tracing::subscriber::set_default(subscriber);
            serve_connection(stream, &policy(), timeout).await.unwrap()
        };
        drop(guard);

        (outcome, std::fs::read_to_string(&path).unwrap())
    }

    #[tokio::test(start_paused = true)]
    async fn silence_logs_timeout_warning() {
        let (_client, mut server) = duplex(64);

        let (outcome, logs) = serve_logged(&mut server, Duration::from_secs(5)).await;
        assert_eq!(outcome, ConnectionOutcome::TimedOut);

        let line = logs
            .lines()
            .find(|l| l.contains("timeout: disconnecting client"))
            .unwrap_or_else(|| panic!("no timeout line in:\n{logs}"));
        assert!(line.contains("WARN"), "timeout logged below warn: {line}");
    }

    #[tokio::test(start_paused = true)]
    async fn early_disconnect_logs_no_timeout() {
        let (client, mut server) = duplex(64);
        drop(client);

        let (outcome, logs) = serve_logged(&mut server, Duration::from_secs(5)).await;
        assert_eq!(outcome, ConnectionOutcome::PeerClosed);
        assert!(logs.contains("Disconnected"), "missing close line in:\n{logs}");
        assert!(!logs.contains("timeout: disconnecting client"));
    }

    struct BrokenStream;

    impl AsyncRead for BrokenStream {
        fn poll_read(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            _buf: &mut ReadBuf<'_>,
        ) -> Poll<io::Result<()>> {
            Poll::Ready(Err(io::Error::new(io::ErrorKind::ConnectionReset, "reset")))
        }
    }

    impl AsyncWrite for BrokenStream {
        fn poll_write(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            _buf: &[u8],
        ) -> Poll<io::Result<usize>> {
            Poll::Ready(Err(io::Error::new(io::ErrorKind::BrokenPipe, "broken")))
        }

        fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }

        fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }
    }

    #[tokio::test]
    async fn receive_failure_is_error() {
        let result = serve_connection(&mut BrokenStream, &policy(), Duration::from_secs(5)).await;
        match result {
            Err(ConnectionError::Read(e)) => assert_eq!(e.kind(), io::ErrorKind::ConnectionReset),
            other => panic!("expected read error, got {other:?}"),
        }
    }
}

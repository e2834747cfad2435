//! Shared utilities for integration tests.
#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use flash_policyd::config::{DaemonConfig, ReadFailurePolicy};
use flash_policyd::net::{ConnectionStats, ConnectionTracker};
use flash_policyd::protocol::REQUEST_TOKEN;
use flash_policyd::server::ServerError;
use flash_policyd::{PolicyDocument, PolicyServer, Shutdown};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::task::JoinHandle;

pub const POLICY: &[u8] =
    br#"<cross-domain-policy><allow-access-from domain="*"/></cross-domain-policy>"#;

/// A server running on a loopback ephemeral port.
pub struct TestServer {
    pub addr: SocketAddr,
    pub tracker: ConnectionTracker,
    pub shutdown: Shutdown,
    pub handle: JoinHandle<Result<(), ServerError>>,
}

/// Loopback config with a short deadline so timeout tests stay fast.
pub fn config(max_in_flight: usize, timeout_ms: u64, read_failure: ReadFailurePolicy) -> DaemonConfig {
    let mut config = DaemonConfig::default();
    config.listener.bind_address = "127.0.0.1".into();
    config.listener.port = Some(0);
    config.listener.max_in_flight = max_in_flight;
    config.connection.timeout_ms = timeout_ms;
    config.connection.read_failure = read_failure;
    config
}

/// Bind and spawn a server answering with `policy`.
pub async fn start_server(config: DaemonConfig, policy: &[u8]) -> TestServer {
    let policy = PolicyDocument::from_bytes(policy, config.policy.capacity).unwrap();
    let server = PolicyServer::bind(&config, Arc::new(policy)).unwrap();
    let addr = server.local_addr().unwrap();
    let tracker = server.tracker();

    let shutdown = Shutdown::new();
    let handle = tokio::spawn(server.run(shutdown.subscribe()));

    TestServer {
        addr,
        tracker,
        shutdown,
        handle,
    }
}

/// Connect, send the token and read until the server closes.
pub async fn request_policy(addr: SocketAddr) -> Vec<u8> {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.write_all(REQUEST_TOKEN).await.unwrap();
    read_until_closed(&mut stream).await
}

/// Read everything the server sends before closing, failing after 5 s.
pub async fn read_until_closed(stream: &mut TcpStream) -> Vec<u8> {
    let mut response = Vec::new();
    tokio::time::timeout(Duration::from_secs(5), stream.read_to_end(&mut response))
        .await
        .expect("server did not close the connection")
        .unwrap();
    response
}

/// Poll the tracker until `done` holds, failing after 5 s.
pub async fn wait_for<F>(tracker: &ConnectionTracker, done: F) -> ConnectionStats
where
    F: Fn(&ConnectionStats) -> bool,
{
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        let stats = tracker.stats();
        if done(&stats) {
            return stats;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "condition not reached, last stats: {stats:?}"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

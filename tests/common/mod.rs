//! Shared utilities for integration testing.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use tokio::io::AsyncWriteExt;
use tokio::net::TcpListener;

use quota_gateway::config::GatewayConfig;
use quota_gateway::http::HttpServer;
use quota_gateway::lifecycle::Shutdown;
use quota_gateway::store::ClientRepository;

/// Start a simple mock backend on an ephemeral port that returns a fixed
/// body with status 200.
pub async fn start_mock_backend(response: &'static str) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    tokio::spawn(async move {
                        let response_str = format!(
                            "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                            response.len(),
                            response
                        );
                        let _ = socket.write_all(response_str.as_bytes()).await;
                        let _ = socket.shutdown().await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    addr
}

/// Start a backend that accepts connections and closes them immediately,
/// so every forwarding attempt fails at the transport level. Counts the
/// accepted connections.
pub async fn start_closing_backend(attempts: Arc<AtomicU32>) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((socket, _)) => {
                    attempts.fetch_add(1, Ordering::SeqCst);
                    drop(socket);
                }
                Err(_) => break,
            }
        }
    });

    addr
}

/// An address with nothing listening on it (connection refused).
pub async fn unreachable_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}

/// A config suitable for tests: background loops quiet unless a test
/// enables them.
pub fn test_config(backends: Vec<SocketAddr>) -> GatewayConfig {
    let mut config = GatewayConfig::default();
    config.backends = backends.iter().map(|a| a.to_string()).collect();
    config.health_check.enabled = false;
    config.rate_limit.refill_interval_secs = 3600;
    config
}

/// Spawn the gateway on an ephemeral port; returns its address and the
/// shutdown handle (trigger it at the end of the test).
pub async fn spawn_gateway(
    mut config: GatewayConfig,
    repo: Arc<dyn ClientRepository>,
) -> (SocketAddr, Shutdown) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    config.listener.bind_address = addr.to_string();

    let shutdown = Shutdown::new();
    let server = HttpServer::new(config, repo);
    let server_shutdown = shutdown.clone();
    tokio::spawn(async move {
        let _ = server.run(listener, server_shutdown).await;
    });

    // Give the listener task a moment to start serving.
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;

    (addr, shutdown)
}

/// A reqwest client that will not reuse pooled connections between tests.
pub fn http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}

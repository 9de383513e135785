//! Active health checking.
//!
//! # Responsibilities
//! - Periodically probe every backend
//! - Update the per-backend liveness flag from the probe result

use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpStream;
use tokio::sync::broadcast;
use tokio::time;

use crate::config::HealthCheckConfig;
use crate::load_balancer::ServerPool;
use crate::observability::metrics;

pub struct HealthMonitor {
    pool: Arc<ServerPool>,
    config: HealthCheckConfig,
}

impl HealthMonitor {
    pub fn new(pool: Arc<ServerPool>, config: HealthCheckConfig) -> Self {
        Self { pool, config }
    }

    /// Sweep once immediately, then on a fixed period until shutdown.
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        if !self.config.enabled {
            tracing::info!("Active health checks disabled");
            return;
        }

        tracing::info!(
            interval_secs = self.config.interval_secs,
            probe_timeout_secs = self.config.probe_timeout_secs,
            "Health monitor starting"
        );

        let mut ticker = time::interval(Duration::from_secs(self.config.interval_secs));
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.check_all().await;
                }
                _ = shutdown.recv() => {
                    tracing::info!("Health monitor received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }

    /// Probe every backend and set its liveness flag.
    pub async fn check_all(&self) {
        let timeout = Duration::from_secs(self.config.probe_timeout_secs);
        for backend in self.pool.backends() {
            let alive = probe(backend.addr, timeout).await;
            let was_alive = backend.is_alive();
            if alive != was_alive {
                if alive {
                    tracing::info!(addr = %backend.addr, "Backend is back up");
                } else {
                    tracing::warn!(addr = %backend.addr, "Backend is down");
                }
            } else {
                tracing::debug!(
                    addr = %backend.addr,
                    status = if alive { "UP" } else { "DOWN" },
                    "Backend status"
                );
            }
            backend.set_alive(alive);
            metrics::record_backend_alive(&backend.addr.to_string(), alive);
        }
    }
}

/// A bounded-timeout connection attempt. Timeout and refusal both count as
/// down; no distinction is made between overloaded and unreachable.
async fn probe(addr: std::net::SocketAddr, timeout: Duration) -> bool {
    matches!(
        time::timeout(timeout, TcpStream::connect(addr)).await,
        Ok(Ok(_))
    )
}

//! Admission-controlled reverse-proxy gateway.
//!
//! # Architecture Overview
//!
//! ```text
//!                    ┌──────────────────────────────────────────────────┐
//!                    │                     GATEWAY                      │
//!                    │                                                  │
//!   Client Request   │  ┌─────────┐   ┌────────────┐   ┌────────────┐  │
//!   ─────────────────┼─▶│  http   │──▶│ ratelimit  │──▶│load_balancer│ │
//!                    │  │ server  │   │ (admission)│   │ select_next │ │
//!                    │  └─────────┘   └─────┬──────┘   └──────┬──────┘ │
//!                    │                      │                 │        │
//!                    │                ┌─────▼──────┐   ┌──────▼──────┐ │
//!   Client Response  │                │   store    │   │  forwarding │◀┼── Backend
//!   ◀────────────────┼────────────────│ (quota row │   │ + failover  │ │    Servers
//!                    │                │   locks)   │   │    retry    │ │
//!                    │                └────────────┘   └─────────────┘ │
//!                    │                                                  │
//!                    │  Background: health-check loop, token refill loop│
//!                    └──────────────────────────────────────────────────┘
//! ```

use std::path::Path;
use std::sync::Arc;

use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use quota_gateway::config::{load_config, GatewayConfig};
use quota_gateway::http::HttpServer;
use quota_gateway::lifecycle::Shutdown;
use quota_gateway::observability::metrics;
use quota_gateway::store::{ClientRepository, MemoryRepository, PostgresRepository};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing subscriber
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "quota_gateway=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("quota-gateway v0.1.0 starting");

    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config/gateway.toml".to_string());
    let config = if Path::new(&config_path).exists() {
        load_config(Path::new(&config_path))?
    } else {
        tracing::warn!(path = %config_path, "Config file not found, using defaults");
        GatewayConfig::default()
    };

    tracing::info!(
        bind_address = %config.listener.bind_address,
        backends = ?config.backends,
        cost_per_request = config.rate_limit.cost_per_request,
        "Configuration loaded"
    );

    // Connect the quota store; an empty URL selects the in-memory store
    // (quotas then do not survive a restart).
    let repo: Arc<dyn ClientRepository> = if config.database.url.is_empty() {
        tracing::warn!("No database configured, using in-memory quota store");
        Arc::new(MemoryRepository::new())
    } else {
        let repo = PostgresRepository::connect(&config.database).await?;
        repo.migrate().await?;
        Arc::new(repo)
    };

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    let ctrl_c_shutdown = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Shutdown signal received");
            ctrl_c_shutdown.trigger();
        }
    });

    let server = HttpServer::new(config, repo);
    server.run(listener, shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}

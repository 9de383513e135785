//! Admission-controlled reverse-proxy gateway.
//!
//! Inbound requests are admitted against a persisted, replenishing
//! per-client token bucket, then routed to one of several live upstream
//! backends with bounded failover retry.

pub mod admin;
pub mod config;
pub mod health;
pub mod http;
pub mod lifecycle;
pub mod load_balancer;
pub mod observability;
pub mod ratelimit;
pub mod store;

pub use config::GatewayConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;

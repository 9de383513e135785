//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → structured tracing events (stdout, EnvFilter-controlled)
//!     → metrics.rs (counters, gauges, histograms)
//!
//! Consumers:
//!     → log aggregation
//!     → Prometheus scrape endpoint
//! ```
//!
//! # Design Decisions
//! - Metric updates are cheap (atomic increments behind the `metrics`
//!   facade); recording never fails and never blocks the request path
//! - The exporter binds its own listener, separate from the proxy port

pub mod metrics;

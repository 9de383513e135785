//! Health checking subsystem.
//!
//! # Data Flow
//! ```text
//! Periodic timer (monitor.rs)
//!     → TCP connect probe per backend, bounded timeout
//!     → Backend::set_alive
//!     → selection observes the flag on the next pick
//! ```
//!
//! # Design Decisions
//! - A probe timeout and a connection refusal are treated the same: down
//! - Probe failures only flip the flag; they never escalate
//! - Fixed probe interval, no backoff

pub mod monitor;

pub use monitor::HealthMonitor;

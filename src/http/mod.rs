//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware, request ID)
//!     → /clients routes → admin handlers
//!     → everything else → proxy_handler
//!         admission check → backend selection → forward → bounded retry
//!     → response.rs (JSON error bodies)
//! ```

pub mod response;
pub mod server;

pub use server::HttpServer;

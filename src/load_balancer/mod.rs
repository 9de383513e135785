//! Load balancing subsystem.
//!
//! # Data Flow
//! ```text
//! proxy handler (request admitted)
//!     → pool.rs select_next()
//!         - atomic cursor advance, forward scan over alive backends
//!     → backend.rs (address + base URL for forwarding)
//!
//! health monitor (background task)
//!     → backend.rs set_alive() per probe result
//! ```
//!
//! # Design Decisions
//! - The backend set is fixed at startup; only the liveness flags change
//! - The rotation cursor is a single atomic counter, never a broader lock
//! - Liveness is per-backend (one atomic flag each), so selection never
//!   blocks on a health sweep

pub mod backend;
pub mod pool;

pub use backend::Backend;
pub use pool::ServerPool;

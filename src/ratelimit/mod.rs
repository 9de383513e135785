//! Rate limiting subsystem.
//!
//! # Data Flow
//! ```text
//! proxy handler
//!     → limiter.rs allow(client_id)
//!     → store lease (row lock: read, check, decrement, commit)
//!     → allowed / denied
//!
//! refill loop (background task):
//!     Periodic timer
//!     → limiter.rs refill_all()
//!     → per-client lease (clamped top-up)
//! ```
//!
//! # Design Decisions
//! - Refilling is server-driven on a fixed tick, not lazily computed at
//!   read time; the store's update path stays trivial and tolerates
//!   concurrent `allow` traffic on the same row
//! - A single missing or failing client never aborts the refill sweep
//! - Fail-closed: an unknown client is denied without error

pub mod limiter;

pub use limiter::RateLimiter;

//! Client quota storage subsystem.
//!
//! # Data Flow
//! ```text
//! ratelimit::allow
//!     → repository.rs (get_for_update: row lock acquired)
//!     → QuotaLease (check balance, mutate, commit)
//!     → postgres.rs (FOR UPDATE transaction) or memory.rs (per-client mutex)
//!
//! admin handlers
//!     → repository.rs (create/get/list_all/update/delete)
//! ```
//!
//! # Design Decisions
//! - The core never touches SQL directly; everything goes through
//!   `ClientRepository` so multiple gateway instances can share one store
//! - Locking is row-scoped: admission checks for different clients never
//!   serialize against each other
//! - Dropping a `QuotaLease` without committing rolls the mutation back and
//!   releases the lock, so a denied request never writes anything

pub mod memory;
pub mod model;
pub mod postgres;
pub mod repository;

pub use memory::MemoryRepository;
pub use model::ClientQuota;
pub use postgres::PostgresRepository;
pub use repository::{ClientRepository, QuotaLease, StoreError};

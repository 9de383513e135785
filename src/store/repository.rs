//! Repository contract for the quota store.
//!
//! # Responsibilities
//! - Define the small surface the rate limiter and CRUD handlers depend on
//! - Express row-level exclusive locking as a lease object
//!
//! # Design Decisions
//! - Object-safe trait behind `Arc<dyn ClientRepository>` so the backing
//!   store (Postgres, in-memory) is swappable without touching the core

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::store::model::ClientQuota;

/// Errors surfaced by a quota store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("client {0} not found")]
    NotFound(String),
    #[error("client {0} already exists")]
    AlreadyExists(String),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// An exclusively locked quota row.
///
/// The lock is held for the lifetime of the lease. `commit` persists the
/// mutated row and releases the lock; dropping the lease without committing
/// discards the mutation and releases the lock.
#[async_trait]
pub trait QuotaLease: Send {
    fn quota(&self) -> &ClientQuota;
    fn quota_mut(&mut self) -> &mut ClientQuota;
    async fn commit(self: Box<Self>) -> Result<(), StoreError>;
}

/// Durable store of client quotas.
#[async_trait]
pub trait ClientRepository: Send + Sync {
    /// Insert a new quota. Fails with `AlreadyExists` on a duplicate id.
    async fn create(&self, quota: &ClientQuota) -> Result<(), StoreError>;

    /// Read a quota without locking it.
    async fn get(&self, client_id: &str) -> Result<Option<ClientQuota>, StoreError>;

    /// Read a quota under an exclusive row lock.
    ///
    /// Concurrent callers for the same client serialize here; callers for
    /// different clients proceed independently.
    async fn get_for_update(
        &self,
        client_id: &str,
    ) -> Result<Option<Box<dyn QuotaLease>>, StoreError>;

    /// Enumerate all quotas.
    async fn list_all(&self) -> Result<Vec<ClientQuota>, StoreError>;

    /// Replace a quota row, returning the new `updated_at`.
    /// Fails with `NotFound` when the row does not exist.
    async fn update(&self, quota: &ClientQuota) -> Result<DateTime<Utc>, StoreError>;

    /// Remove a quota. Deleting an absent client is not an error.
    async fn delete(&self, client_id: &str) -> Result<(), StoreError>;
}

//! In-memory quota repository.
//!
//! # Responsibilities
//! - Provide the full `ClientRepository` contract without a database
//! - Mirror the row-locking discipline with a per-client async mutex
//!
//! Used by the test suite and for running the gateway without a configured
//! database. Balances held here do not survive a restart and are not shared
//! across gateway instances.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::store::model::ClientQuota;
use crate::store::repository::{ClientRepository, QuotaLease, StoreError};

#[derive(Default)]
pub struct MemoryRepository {
    clients: DashMap<String, Arc<Mutex<ClientQuota>>>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn entry(&self, client_id: &str) -> Option<Arc<Mutex<ClientQuota>>> {
        self.clients.get(client_id).map(|r| r.value().clone())
    }
}

#[async_trait]
impl ClientRepository for MemoryRepository {
    async fn create(&self, quota: &ClientQuota) -> Result<(), StoreError> {
        match self.clients.entry(quota.client_id.clone()) {
            Entry::Occupied(_) => Err(StoreError::AlreadyExists(quota.client_id.clone())),
            Entry::Vacant(slot) => {
                slot.insert(Arc::new(Mutex::new(quota.clone())));
                Ok(())
            }
        }
    }

    async fn get(&self, client_id: &str) -> Result<Option<ClientQuota>, StoreError> {
        match self.entry(client_id) {
            Some(cell) => Ok(Some(cell.lock().await.clone())),
            None => Ok(None),
        }
    }

    async fn get_for_update(
        &self,
        client_id: &str,
    ) -> Result<Option<Box<dyn QuotaLease>>, StoreError> {
        let Some(cell) = self.entry(client_id) else {
            return Ok(None);
        };
        let guard = cell.lock_owned().await;
        let working = guard.clone();
        Ok(Some(Box::new(MemoryLease { guard, working })))
    }

    async fn list_all(&self) -> Result<Vec<ClientQuota>, StoreError> {
        // Snapshot the cells first; locking while iterating the map could
        // deadlock against a lease holder touching the same shard.
        let cells: Vec<Arc<Mutex<ClientQuota>>> =
            self.clients.iter().map(|r| r.value().clone()).collect();
        let mut quotas = Vec::with_capacity(cells.len());
        for cell in cells {
            quotas.push(cell.lock().await.clone());
        }
        quotas.sort_by(|a, b| a.client_id.cmp(&b.client_id));
        Ok(quotas)
    }

    async fn update(&self, quota: &ClientQuota) -> Result<DateTime<Utc>, StoreError> {
        let cell = self
            .entry(&quota.client_id)
            .ok_or_else(|| StoreError::NotFound(quota.client_id.clone()))?;
        let mut guard = cell.lock().await;
        let now = Utc::now();
        *guard = ClientQuota {
            updated_at: now,
            created_at: guard.created_at,
            ..quota.clone()
        };
        Ok(now)
    }

    async fn delete(&self, client_id: &str) -> Result<(), StoreError> {
        self.clients.remove(client_id);
        Ok(())
    }
}

/// Lease over an in-memory row: the mutex stands in for the row lock, and
/// mutations apply to a working copy so an uncommitted lease leaves the
/// shared record untouched.
struct MemoryLease {
    guard: OwnedMutexGuard<ClientQuota>,
    working: ClientQuota,
}

#[async_trait]
impl QuotaLease for MemoryLease {
    fn quota(&self) -> &ClientQuota {
        &self.working
    }

    fn quota_mut(&mut self) -> &mut ClientQuota {
        &mut self.working
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let MemoryLease { mut guard, mut working } = *self;
        working.updated_at = Utc::now();
        *guard = working;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn create_then_get_roundtrips() {
        let repo = MemoryRepository::new();
        let quota = ClientQuota::new("alice", 30, 20);
        repo.create(&quota).await.unwrap();

        let fetched = repo.get("alice").await.unwrap().unwrap();
        assert_eq!(fetched.tokens, 30);
        assert_eq!(fetched.capacity, 30);
    }

    #[tokio::test]
    async fn duplicate_create_is_rejected() {
        let repo = MemoryRepository::new();
        repo.create(&ClientQuota::new("alice", 30, 20)).await.unwrap();
        let err = repo.create(&ClientQuota::new("alice", 10, 5)).await.unwrap_err();
        assert!(matches!(err, StoreError::AlreadyExists(_)));
    }

    #[tokio::test]
    async fn dropped_lease_rolls_back() {
        let repo = MemoryRepository::new();
        repo.create(&ClientQuota::new("alice", 30, 20)).await.unwrap();

        {
            let mut lease = repo.get_for_update("alice").await.unwrap().unwrap();
            lease.quota_mut().tokens = 0;
            // dropped without commit
        }

        assert_eq!(repo.get("alice").await.unwrap().unwrap().tokens, 30);
    }

    #[tokio::test]
    async fn committed_lease_persists() {
        let repo = MemoryRepository::new();
        repo.create(&ClientQuota::new("alice", 30, 20)).await.unwrap();

        let mut lease = repo.get_for_update("alice").await.unwrap().unwrap();
        lease.quota_mut().tokens = 7;
        lease.commit().await.unwrap();

        assert_eq!(repo.get("alice").await.unwrap().unwrap().tokens, 7);
    }

    #[tokio::test]
    async fn update_missing_client_is_not_found() {
        let repo = MemoryRepository::new();
        let err = repo.update(&ClientQuota::new("ghost", 30, 20)).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let repo = MemoryRepository::new();
        repo.create(&ClientQuota::new("alice", 30, 20)).await.unwrap();
        repo.delete("alice").await.unwrap();
        repo.delete("alice").await.unwrap();
        assert!(repo.get("alice").await.unwrap().is_none());
    }
}

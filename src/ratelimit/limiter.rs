//! Token-bucket admission control backed by the quota store.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::broadcast;
use tokio::time;

use crate::observability::metrics;
use crate::store::{ClientRepository, StoreError};

/// Store-backed rate limiter.
///
/// All balance mutations go through the repository's exclusive-lock path, so
/// admission checks stay correct when several gateway instances share the
/// same store.
pub struct RateLimiter {
    repo: Arc<dyn ClientRepository>,
    /// Tokens deducted per admitted request.
    cost: i64,
}

impl RateLimiter {
    pub fn new(repo: Arc<dyn ClientRepository>, cost: i64) -> Self {
        Self { repo, cost }
    }

    /// Decide whether `client_id` may proceed, spending `cost` tokens.
    ///
    /// Unknown clients are denied without error. The decrement is persisted
    /// before `Ok(true)` is returned; a denial writes nothing.
    pub async fn allow(&self, client_id: &str) -> Result<bool, StoreError> {
        let mut lease = match self.repo.get_for_update(client_id).await {
            Ok(Some(lease)) => lease,
            Ok(None) => {
                tracing::warn!(client_id, "Client not found for rate limiting");
                return Ok(false);
            }
            Err(e) => {
                tracing::error!(client_id, error = %e, "Failed to get client for rate limiting");
                return Err(e);
            }
        };

        if lease.quota().tokens < self.cost {
            tracing::debug!(
                client_id,
                tokens = lease.quota().tokens,
                cost = self.cost,
                "Rate limit exceeded"
            );
            return Ok(false);
        }

        {
            let quota = lease.quota_mut();
            quota.tokens -= self.cost;
            quota.last_refill = Utc::now();
        }
        lease.commit().await?;

        tracing::debug!(client_id, "Request allowed");
        Ok(true)
    }

    /// Top up every client by its `rate_per_sec`, clamped at `capacity`.
    ///
    /// Per-client failures are logged and skipped; the sweep always visits
    /// the remaining clients.
    pub async fn refill_all(&self) {
        let clients = match self.repo.list_all().await {
            Ok(clients) => clients,
            Err(e) => {
                tracing::error!(error = %e, "Failed to enumerate clients for token refill");
                return;
            }
        };

        for client in clients {
            let mut lease = match self.repo.get_for_update(&client.client_id).await {
                Ok(Some(lease)) => lease,
                Ok(None) => {
                    tracing::warn!(client_id = %client.client_id, "Client vanished during token refill");
                    continue;
                }
                Err(e) => {
                    tracing::error!(client_id = %client.client_id, error = %e, "Failed to lock client for token refill");
                    metrics::record_refill_failure();
                    continue;
                }
            };

            if lease.quota().tokens >= lease.quota().capacity {
                continue;
            }

            {
                let quota = lease.quota_mut();
                quota.tokens = (quota.tokens + quota.rate_per_sec).min(quota.capacity);
                quota.last_refill = Utc::now();
            }
            if let Err(e) = lease.commit().await {
                tracing::error!(client_id = %client.client_id, error = %e, "Failed to persist token refill");
                metrics::record_refill_failure();
            }
        }
    }

    /// Run `refill_all` on a fixed period until the shutdown signal fires.
    pub async fn run_refill_loop(
        self: Arc<Self>,
        period: Duration,
        mut shutdown: broadcast::Receiver<()>,
    ) {
        tracing::info!(period_secs = period.as_secs_f64(), "Token refill loop started");
        // First top-up lands one full period after startup, not immediately.
        let mut ticker = time::interval_at(time::Instant::now() + period, period);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.refill_all().await;
                }
                _ = shutdown.recv() => {
                    tracing::info!("Refill loop received shutdown signal, exiting");
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{ClientQuota, MemoryRepository};

    async fn limiter_with(quota: ClientQuota) -> (Arc<MemoryRepository>, RateLimiter) {
        let repo = Arc::new(MemoryRepository::new());
        repo.create(&quota).await.unwrap();
        let limiter = RateLimiter::new(repo.clone(), 10);
        (repo, limiter)
    }

    async fn tokens_of(repo: &MemoryRepository, id: &str) -> i64 {
        repo.get(id).await.unwrap().unwrap().tokens
    }

    #[tokio::test]
    async fn admission_drains_bucket_then_denies() {
        let (repo, limiter) = limiter_with(ClientQuota {
            tokens: 25,
            ..ClientQuota::new("alice", 30, 20)
        })
        .await;

        assert!(limiter.allow("alice").await.unwrap());
        assert_eq!(tokens_of(&repo, "alice").await, 15);

        assert!(limiter.allow("alice").await.unwrap());
        assert_eq!(tokens_of(&repo, "alice").await, 5);

        assert!(!limiter.allow("alice").await.unwrap());
        assert_eq!(tokens_of(&repo, "alice").await, 5, "denial must not spend tokens");
    }

    #[tokio::test]
    async fn unknown_client_is_denied_without_error() {
        let repo = Arc::new(MemoryRepository::new());
        let limiter = RateLimiter::new(repo, 10);
        assert!(!limiter.allow("ghost").await.unwrap());
    }

    #[tokio::test]
    async fn refill_tops_up_and_clamps_at_capacity() {
        let (repo, limiter) = limiter_with(ClientQuota {
            tokens: 5,
            ..ClientQuota::new("alice", 30, 20)
        })
        .await;

        limiter.refill_all().await;
        assert_eq!(tokens_of(&repo, "alice").await, 25);

        limiter.refill_all().await;
        assert_eq!(tokens_of(&repo, "alice").await, 30, "refill must clamp at capacity");

        limiter.refill_all().await;
        assert_eq!(tokens_of(&repo, "alice").await, 30);
    }

    #[tokio::test]
    async fn concurrent_admission_never_double_spends() {
        let (repo, limiter) = limiter_with(ClientQuota {
            tokens: 10,
            ..ClientQuota::new("alice", 30, 20)
        })
        .await;
        let limiter = Arc::new(limiter);

        let a = tokio::spawn({
            let limiter = limiter.clone();
            async move { limiter.allow("alice").await.unwrap() }
        });
        let b = tokio::spawn({
            let limiter = limiter.clone();
            async move { limiter.allow("alice").await.unwrap() }
        });

        let (a, b) = (a.await.unwrap(), b.await.unwrap());
        assert!(a ^ b, "exactly one of two concurrent checks may spend the last tokens");
        assert_eq!(tokens_of(&repo, "alice").await, 0);
    }

    #[tokio::test]
    async fn balance_stays_within_bounds_under_mixed_traffic() {
        let (repo, limiter) = limiter_with(ClientQuota {
            tokens: 25,
            ..ClientQuota::new("alice", 30, 20)
        })
        .await;

        for _ in 0..10 {
            let _ = limiter.allow("alice").await.unwrap();
            limiter.refill_all().await;
            let tokens = tokens_of(&repo, "alice").await;
            assert!((0..=30).contains(&tokens), "tokens {tokens} out of range");
        }
    }

    #[tokio::test]
    async fn refill_continues_past_a_vanished_client() {
        // A client deleted between list_all and get_for_update must not
        // abort the sweep for the others.
        struct VanishingRepo(Arc<MemoryRepository>);

        #[async_trait::async_trait]
        impl ClientRepository for VanishingRepo {
            async fn create(&self, q: &ClientQuota) -> Result<(), StoreError> {
                self.0.create(q).await
            }
            async fn get(&self, id: &str) -> Result<Option<ClientQuota>, StoreError> {
                self.0.get(id).await
            }
            async fn get_for_update(
                &self,
                id: &str,
            ) -> Result<Option<Box<dyn crate::store::QuotaLease>>, StoreError> {
                self.0.get_for_update(id).await
            }
            async fn list_all(&self) -> Result<Vec<ClientQuota>, StoreError> {
                // Report a client the lock path will no longer find.
                let mut clients = self.0.list_all().await?;
                clients.insert(0, ClientQuota::new("ghost", 30, 20));
                Ok(clients)
            }
            async fn update(&self, q: &ClientQuota) -> Result<chrono::DateTime<Utc>, StoreError> {
                self.0.update(q).await
            }
            async fn delete(&self, id: &str) -> Result<(), StoreError> {
                self.0.delete(id).await
            }
        }

        let inner = Arc::new(MemoryRepository::new());
        inner
            .create(&ClientQuota { tokens: 0, ..ClientQuota::new("b", 30, 20) })
            .await
            .unwrap();
        let limiter = RateLimiter::new(Arc::new(VanishingRepo(inner.clone())), 10);

        limiter.refill_all().await;

        assert_eq!(tokens_of(&inner, "b").await, 20);
    }
}

//! Postgres-backed quota repository.
//!
//! # Responsibilities
//! - Persist `ClientQuota` rows in the `clients` table
//! - Implement row-level exclusive locking with `SELECT ... FOR UPDATE`
//!   inside a narrowly scoped transaction
//!
//! # Design Decisions
//! - The transaction spans exactly one row from read to write, so unrelated
//!   clients are never serialized against each other
//! - A lease dropped without commit rolls the transaction back, releasing
//!   the row lock with no write

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions, Postgres};
use sqlx::Transaction;

use crate::config::DatabaseConfig;
use crate::store::model::ClientQuota;
use crate::store::repository::{ClientRepository, QuotaLease, StoreError};

const SELECT_COLUMNS: &str =
    "client_id, capacity, rate_per_sec, tokens, last_refill, created_at, updated_at";

pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    /// Connect to the database and verify the connection.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .connect(&config.url)
            .await?;
        Ok(Self { pool })
    }

    /// Apply pending schema migrations.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(sqlx::Error::from)?;
        Ok(())
    }
}

#[async_trait]
impl ClientRepository for PostgresRepository {
    async fn create(&self, quota: &ClientQuota) -> Result<(), StoreError> {
        let result = sqlx::query(
            "INSERT INTO clients (client_id, capacity, rate_per_sec, tokens, last_refill, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(&quota.client_id)
        .bind(quota.capacity)
        .bind(quota.rate_per_sec)
        .bind(quota.tokens)
        .bind(quota.last_refill)
        .bind(quota.created_at)
        .bind(quota.updated_at)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                Err(StoreError::AlreadyExists(quota.client_id.clone()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn get(&self, client_id: &str) -> Result<Option<ClientQuota>, StoreError> {
        let quota = sqlx::query_as::<_, ClientQuota>(&format!(
            "SELECT {SELECT_COLUMNS} FROM clients WHERE client_id = $1"
        ))
        .bind(client_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(quota)
    }

    async fn get_for_update(
        &self,
        client_id: &str,
    ) -> Result<Option<Box<dyn QuotaLease>>, StoreError> {
        let mut tx = self.pool.begin().await?;
        let quota = sqlx::query_as::<_, ClientQuota>(&format!(
            "SELECT {SELECT_COLUMNS} FROM clients WHERE client_id = $1 FOR UPDATE"
        ))
        .bind(client_id)
        .fetch_optional(&mut *tx)
        .await?;

        match quota {
            Some(quota) => Ok(Some(Box::new(PostgresLease { tx, quota }))),
            None => {
                tx.rollback().await?;
                Ok(None)
            }
        }
    }

    async fn list_all(&self) -> Result<Vec<ClientQuota>, StoreError> {
        let quotas = sqlx::query_as::<_, ClientQuota>(&format!(
            "SELECT {SELECT_COLUMNS} FROM clients ORDER BY client_id"
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(quotas)
    }

    async fn update(&self, quota: &ClientQuota) -> Result<DateTime<Utc>, StoreError> {
        let updated_at = sqlx::query_scalar::<_, DateTime<Utc>>(
            "UPDATE clients
             SET capacity = $2, rate_per_sec = $3, tokens = $4, last_refill = $5, updated_at = now()
             WHERE client_id = $1
             RETURNING updated_at",
        )
        .bind(&quota.client_id)
        .bind(quota.capacity)
        .bind(quota.rate_per_sec)
        .bind(quota.tokens)
        .bind(quota.last_refill)
        .fetch_optional(&self.pool)
        .await?;

        updated_at.ok_or_else(|| StoreError::NotFound(quota.client_id.clone()))
    }

    async fn delete(&self, client_id: &str) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM clients WHERE client_id = $1")
            .bind(client_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

/// A row lock held by an open transaction.
struct PostgresLease {
    tx: Transaction<'static, Postgres>,
    quota: ClientQuota,
}

#[async_trait]
impl QuotaLease for PostgresLease {
    fn quota(&self) -> &ClientQuota {
        &self.quota
    }

    fn quota_mut(&mut self) -> &mut ClientQuota {
        &mut self.quota
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let PostgresLease { mut tx, quota } = *self;
        sqlx::query(
            "UPDATE clients
             SET capacity = $2, rate_per_sec = $3, tokens = $4, last_refill = $5, updated_at = now()
             WHERE client_id = $1",
        )
        .bind(&quota.client_id)
        .bind(quota.capacity)
        .bind(quota.rate_per_sec)
        .bind(quota.tokens)
        .bind(quota.last_refill)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(())
    }
}

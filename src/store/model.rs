//! Durable client quota record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A persisted token-bucket quota for one client.
///
/// Invariant: `0 <= tokens <= capacity`. Every mutation of `tokens` updates
/// `last_refill` and `updated_at` together with the value change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct ClientQuota {
    /// Unique client identifier, immutable after creation.
    pub client_id: String,
    /// Maximum tokens the bucket holds.
    pub capacity: i64,
    /// Tokens added per refill tick.
    pub rate_per_sec: i64,
    /// Current balance.
    pub tokens: i64,
    pub last_refill: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ClientQuota {
    /// Create a fresh quota with a full bucket.
    pub fn new(client_id: impl Into<String>, capacity: i64, rate_per_sec: i64) -> Self {
        let now = Utc::now();
        Self {
            client_id: client_id.into(),
            capacity,
            rate_per_sec,
            tokens: capacity,
            last_refill: now,
            created_at: now,
            updated_at: now,
        }
    }
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A registered external system that sends webhooks
///
/// Read-only to the delivery pipeline; provisioned by management tooling
/// with 32 random bytes hex-encoded as the HMAC secret.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Source {
    pub id: Uuid,
    pub name: String,
    pub hmac_secret: String,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

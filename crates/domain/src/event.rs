use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// A deduplicated ingest record, one per unique `(source_name, idempotency_key)`
///
/// Created exactly once per fingerprint, never mutated afterwards.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Event {
    pub id: Uuid,
    pub source_name: String,
    pub event_type: String,
    pub idempotency_key: String,
    pub payload_json: serde_json::Value,
    pub received_at: DateTime<Utc>,
}

impl Event {
    /// Build a fresh event from an authenticated inbound webhook
    pub fn new(
        source_name: &str,
        event_type: &str,
        payload_json: serde_json::Value,
        raw_body: &[u8],
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            source_name: source_name.to_string(),
            event_type: event_type.to_string(),
            idempotency_key: Self::fingerprint(source_name, event_type, raw_body),
            payload_json,
            received_at: Utc::now(),
        }
    }

    /// Content-addressed idempotency fingerprint
    ///
    /// `hex(SHA-256(source_name || event_type || raw_body))` — two submissions
    /// of the same body from the same source under the same type collide here
    /// and are stored once.
    pub fn fingerprint(source_name: &str, event_type: &str, raw_body: &[u8]) -> String {
        let mut hasher = Sha256::new();
        hasher.update(source_name.as_bytes());
        hasher.update(event_type.as_bytes());
        hasher.update(raw_body);
        hex::encode(hasher.finalize())
    }
}

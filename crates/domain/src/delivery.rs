use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle of a delivery record
///
/// The store column is the `delivery_status` enum; the textual values map
/// one-to-one onto these variants. DELIVERED and DEAD are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "delivery_status", rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum DeliveryStatus {
    Pending,
    Delivered,
    Retrying,
    Dead,
}

impl DeliveryStatus {
    /// Terminal states are never mutated again
    pub fn is_terminal(&self) -> bool {
        matches!(self, DeliveryStatus::Delivered | DeliveryStatus::Dead)
    }
}

/// One pending/complete push of one event to one destination
///
/// Created by the ingest pipeline in PENDING; mutated exclusively by the
/// delivery worker. `(event_id, destination_id)` is unique.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Delivery {
    pub id: Uuid,
    pub event_id: Uuid,
    pub destination_id: Uuid,
    pub status: DeliveryStatus,
    pub attempts: i32,
    pub max_attempts: i32,
    pub last_error: Option<String>,
    pub last_attempt_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Delivery {
    /// Fresh PENDING record for a matched (event, destination) pair
    pub fn pending(event_id: Uuid, destination_id: Uuid, max_attempts: i32) -> Self {
        Self {
            id: Uuid::new_v4(),
            event_id,
            destination_id,
            status: DeliveryStatus::Pending,
            attempts: 0,
            max_attempts,
            last_error: None,
            last_attempt_at: None,
            delivered_at: None,
            created_at: Utc::now(),
        }
    }
}

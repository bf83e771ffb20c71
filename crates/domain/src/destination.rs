use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// An HTTP endpoint that receives webhook bodies
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Destination {
    pub id: Uuid,
    pub name: String,
    pub target_url: String,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

/// Routing rule selecting a destination for a `(source_name, event_type)` pair
///
/// A destination holds many rules; `(destination_id, source_name, event_type)`
/// is unique.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct DestinationRule {
    pub id: Uuid,
    pub destination_id: Uuid,
    pub source_name: String,
    pub event_type: String,
}

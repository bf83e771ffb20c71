/*!
 * Row-Store Access for Ingest
 *
 * Capability contracts for everything the pipeline reads and writes, plus
 * the PostgreSQL implementation used at runtime. Tests substitute in-memory
 * fakes behind the same traits.
 */

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::debug;
use webhookhub_common::Result;
use webhookhub_domain::{Delivery, Destination, Event, Source};

/// Reads registered sources by name (C3)
#[async_trait]
pub trait SourceReader: Send + Sync {
    async fn find_by_name(&self, name: &str) -> Result<Option<Source>>;
}

/// Reads active destinations whose rules match a `(source_name, event_type)` pair (C3)
#[async_trait]
pub trait DestinationReader: Send + Sync {
    async fn find_matching(
        &self,
        source_name: &str,
        event_type: &str,
    ) -> Result<Vec<Destination>>;
}

/// Idempotent event persistence (C1)
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Insert the event unless its fingerprint is already stored.
    ///
    /// Returns `true` when the row was inserted, `false` when the unique
    /// constraint on `(source_name, idempotency_key)` rejected it.
    async fn insert_if_absent(&self, event: &Event) -> Result<bool>;
}

/// Delivery record creation (C2, producer side)
#[async_trait]
pub trait DeliveryStore: Send + Sync {
    async fn insert(&self, delivery: &Delivery) -> Result<()>;
}

/// PostgreSQL-backed implementation of the ingest store contracts
pub struct PgStores {
    pool: PgPool,
}

impl PgStores {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SourceReader for PgStores {
    async fn find_by_name(&self, name: &str) -> Result<Option<Source>> {
        let source = sqlx::query_as::<_, Source>(
            r#"
            SELECT id, name, hmac_secret, active, created_at
            FROM sources
            WHERE name = $1
            "#,
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;

        Ok(source)
    }
}

#[async_trait]
impl DestinationReader for PgStores {
    async fn find_matching(
        &self,
        source_name: &str,
        event_type: &str,
    ) -> Result<Vec<Destination>> {
        // One row per destination: rules are unique on
        // (destination_id, source_name, event_type)
        let destinations = sqlx::query_as::<_, Destination>(
            r#"
            SELECT d.id, d.name, d.target_url, d.active, d.created_at
            FROM destinations d
            JOIN destination_rules r ON r.destination_id = d.id
            WHERE d.active = true
              AND r.source_name = $1
              AND r.event_type = $2
            "#,
        )
        .bind(source_name)
        .bind(event_type)
        .fetch_all(&self.pool)
        .await?;

        debug!(
            "Found {} matching destinations for ({}, {})",
            destinations.len(),
            source_name,
            event_type
        );

        Ok(destinations)
    }
}

#[async_trait]
impl EventStore for PgStores {
    async fn insert_if_absent(&self, event: &Event) -> Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO events (id, source_name, event_type, idempotency_key, payload_json, received_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (source_name, idempotency_key) DO NOTHING
            "#,
        )
        .bind(event.id)
        .bind(&event.source_name)
        .bind(&event.event_type)
        .bind(&event.idempotency_key)
        .bind(&event.payload_json)
        .bind(event.received_at)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }
}

#[async_trait]
impl DeliveryStore for PgStores {
    async fn insert(&self, delivery: &Delivery) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO deliveries
                (id, event_id, destination_id, status, attempts, max_attempts, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(delivery.id)
        .bind(delivery.event_id)
        .bind(delivery.destination_id)
        .bind(delivery.status)
        .bind(delivery.attempts)
        .bind(delivery.max_attempts)
        .bind(delivery.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

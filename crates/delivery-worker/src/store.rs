/*!
 * Delivery Status Store
 *
 * State transitions for delivery records. Every write is a single short
 * transaction, conditional on the row not already being terminal, so a
 * stale or duplicate message can never resurrect a finished delivery.
 */

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::warn;
use uuid::Uuid;
use webhookhub_common::Result;

/// Durable state transitions for deliveries (C2, consumer side)
#[async_trait]
pub trait DeliveryStatusStore: Send + Sync {
    /// PENDING/RETRYING → DELIVERED; sets `delivered_at`, clears `last_error`
    async fn mark_delivered(&self, delivery_id: Uuid, attempts: i32) -> Result<()>;

    /// PENDING/RETRYING → RETRYING; `attempts` is the attempt number the
    /// republished message will carry
    async fn mark_retrying(&self, delivery_id: Uuid, attempts: i32, error: &str) -> Result<()>;

    /// PENDING/RETRYING → DEAD; terminal
    async fn mark_dead(&self, delivery_id: Uuid, attempts: i32, error: &str) -> Result<()>;
}

/// PostgreSQL-backed status store
pub struct PgDeliveryStatusStore {
    pool: PgPool,
}

impl PgDeliveryStatusStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DeliveryStatusStore for PgDeliveryStatusStore {
    async fn mark_delivered(&self, delivery_id: Uuid, attempts: i32) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE deliveries
            SET status = 'DELIVERED',
                attempts = $2,
                last_error = NULL,
                last_attempt_at = now(),
                delivered_at = now()
            WHERE id = $1
              AND status NOT IN ('DELIVERED', 'DEAD')
            "#,
        )
        .bind(delivery_id)
        .bind(attempts)
        .execute(&self.pool)
        .await?;

        warn_if_stale(delivery_id, "DELIVERED", result.rows_affected());
        Ok(())
    }

    async fn mark_retrying(&self, delivery_id: Uuid, attempts: i32, error: &str) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE deliveries
            SET status = 'RETRYING',
                attempts = $2,
                last_error = $3,
                last_attempt_at = now()
            WHERE id = $1
              AND status NOT IN ('DELIVERED', 'DEAD')
            "#,
        )
        .bind(delivery_id)
        .bind(attempts)
        .bind(error)
        .execute(&self.pool)
        .await?;

        warn_if_stale(delivery_id, "RETRYING", result.rows_affected());
        Ok(())
    }

    async fn mark_dead(&self, delivery_id: Uuid, attempts: i32, error: &str) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE deliveries
            SET status = 'DEAD',
                attempts = $2,
                last_error = $3,
                last_attempt_at = now()
            WHERE id = $1
              AND status NOT IN ('DELIVERED', 'DEAD')
            "#,
        )
        .bind(delivery_id)
        .bind(attempts)
        .bind(error)
        .execute(&self.pool)
        .await?;

        warn_if_stale(delivery_id, "DEAD", result.rows_affected());
        Ok(())
    }
}

fn warn_if_stale(delivery_id: Uuid, target: &str, rows_affected: u64) {
    // One live message per delivery makes this unreachable in correct
    // operation; a duplicate message would land here.
    if rows_affected == 0 {
        warn!(
            "Stale status update rejected: delivery={} target={}",
            delivery_id, target
        );
    }
}

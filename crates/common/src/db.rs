//! Database connection pool management
//!
//! PostgreSQL pooling for the delivery pipeline. Pool construction verifies
//! not just connectivity but that the hub schema is migrated: every service
//! touches events and deliveries on its hot path, so a missing table should
//! fail startup, not the first webhook.

use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;
use tracing::info;

use crate::error::{Error, Result};

/// Tables the delivery pipeline reads or writes
const REQUIRED_TABLES: [&str; 5] = [
    "sources",
    "destinations",
    "destination_rules",
    "events",
    "deliveries",
];

/// Create a PostgreSQL connection pool and verify the hub schema
///
/// `max_connections` comes from the service configuration: the ingest API
/// sizes it for request parallelism, the delivery worker derives it from
/// its prefetch window. A quarter of the pool is kept warm.
pub async fn create_pool(database_url: &str, max_connections: u32) -> Result<PgPool> {
    info!(
        "Creating database pool with max_connections={}",
        max_connections
    );

    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .min_connections((max_connections / 4).max(1))
        .acquire_timeout(Duration::from_secs(30))
        .idle_timeout(Duration::from_secs(600)) // 10 minutes
        .max_lifetime(Duration::from_secs(1800)) // 30 minutes
        .connect(database_url)
        .await?;

    schema_check(&pool).await?;

    info!("Database pool created, schema verified");
    Ok(pool)
}

/// Cheap connectivity probe, used by the readiness endpoints
pub async fn health_check(pool: &PgPool) -> Result<()> {
    sqlx::query_scalar::<_, i32>("SELECT 1")
        .fetch_one(pool)
        .await?;

    Ok(())
}

/// Fail fast when the schema has not been migrated
///
/// Resolves every pipeline table against the connection's search path and
/// reports the full set of missing ones in one error.
pub async fn schema_check(pool: &PgPool) -> Result<()> {
    let missing: Vec<String> = sqlx::query_scalar(
        r#"
        SELECT t.name
        FROM unnest($1::TEXT[]) AS t(name)
        WHERE to_regclass(t.name) IS NULL
        "#,
    )
    .bind(
        REQUIRED_TABLES
            .iter()
            .map(|table| table.to_string())
            .collect::<Vec<_>>(),
    )
    .fetch_all(pool)
    .await?;

    if missing.is_empty() {
        Ok(())
    } else {
        Err(Error::Config(format!(
            "database schema is not migrated, missing tables: {}",
            missing.join(", ")
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_pool_creation_verifies_schema() {
        // Requires DB_URL pointing at a migrated database
        if let Ok(database_url) = std::env::var("DB_URL") {
            let pool = create_pool(&database_url, 5)
                .await
                .expect("pool creation against a migrated database");

            health_check(&pool).await.expect("connectivity probe");
            schema_check(&pool).await.expect("all pipeline tables present");
        } else {
            println!("Skipping test: DB_URL not set");
        }
    }
}

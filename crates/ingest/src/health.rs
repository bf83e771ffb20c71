/*!
 * Health and Readiness Probes
 *
 * Ingest cannot make progress without both the row store and the broker:
 * every accepted webhook writes rows and publishes jobs. Readiness reflects
 * both dependencies; liveness only says the process is up.
 */

use axum::{Json, extract::State, http::StatusCode};
use lapin::Channel;
use serde_json::{Value, json};
use sqlx::PgPool;
use webhookhub_common::db;

/// Dependencies the readiness probe exercises
#[derive(Clone)]
pub struct HealthState {
    pub pool: PgPool,
    pub channel: Channel,
}

/// Liveness probe
pub async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "service": "ingest",
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

/// Readiness probe: can this instance accept webhooks right now?
pub async fn readiness_check(State(state): State<HealthState>) -> (StatusCode, Json<Value>) {
    let database_up = db::health_check(&state.pool).await.is_ok();
    let broker_up = state.channel.status().connected();
    let ready = database_up && broker_up;

    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(json!({
            "ready": ready,
            "service": "ingest",
            "database": if database_up { "up" } else { "down" },
            "broker": if broker_up { "up" } else { "down" },
        })),
    )
}

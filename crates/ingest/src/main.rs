/*!
 * Ingest Service
 *
 * Accepts signed HTTP webhooks from registered sources and fans them out as
 * delivery jobs.
 *
 * ## Architecture
 *
 * ```text
 * POST /ingest/{source}
 *     │
 *     ├──> verify HMAC against the source secret
 *     ├──> insert event row (idempotent on fingerprint)
 *     ├──> insert one PENDING delivery per matching destination
 *     └──> publish one DeliveryJob per delivery to the main exchange
 * ```
 *
 * ## Configuration
 *
 * Environment variables:
 * - DB_URL / DB_USER / DB_PASSWORD: PostgreSQL connection
 * - DB_MAX_CONNECTIONS: pool size (default: 20)
 * - RABBITMQ_HOST / RABBITMQ_PORT / RABBITMQ_USER / RABBITMQ_PASSWORD / RABBITMQ_VHOST
 * - INGEST_PORT: HTTP listen port (default: 8080)
 * - MAX_ATTEMPTS: attempt budget stamped onto new deliveries (default: 5)
 */

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    Router,
    routing::{get, post},
};
use tokio::signal;
use tower_http::trace::TraceLayer;
use tracing::info;

use webhookhub_common::amqp;
use webhookhub_ingest::config::IngestConfig;
use webhookhub_ingest::handlers::{self, AppState};
use webhookhub_ingest::health;
use webhookhub_ingest::pipeline::IngestPipeline;
use webhookhub_ingest::publisher::AmqpJobPublisher;
use webhookhub_ingest::stores::PgStores;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    webhookhub_common::init_tracing();

    info!("🚀 Starting Ingest Service");

    // Load configuration
    let config = IngestConfig::from_env().context("Failed to load configuration")?;

    info!("📋 Configuration loaded:");
    info!(
        "   - Database: {}",
        config.db_url.split('@').next_back().unwrap_or("***")
    );
    info!(
        "   - RabbitMQ: {}:{}",
        config.rabbitmq_host, config.rabbitmq_port
    );
    info!("   - Port: {}", config.port);
    info!("   - Max Attempts: {}", config.max_attempts);

    // Create PostgreSQL connection pool
    info!("📦 Connecting to PostgreSQL...");
    let db_pool = webhookhub_common::create_pool(&config.database_url(), config.db_max_connections)
        .await
        .context("Failed to create database pool")?;
    info!("✅ PostgreSQL connected");

    // Connect to RabbitMQ and declare the delivery topology
    info!("📦 Connecting to RabbitMQ...");
    let amqp_connection = amqp::connect(&config.amqp_url())
        .await
        .context("Failed to connect to RabbitMQ")?;
    let channel = amqp_connection
        .create_channel()
        .await
        .context("Failed to open AMQP channel")?;
    amqp::declare_topology(&channel)
        .await
        .context("Failed to declare broker topology")?;
    info!("✅ RabbitMQ connected, topology declared");

    // Wire the pipeline from its capability contracts
    let stores = Arc::new(PgStores::new(db_pool.clone()));
    let publisher = Arc::new(AmqpJobPublisher::new(channel.clone()));
    let pipeline = Arc::new(IngestPipeline::new(
        stores.clone(),
        stores.clone(),
        stores.clone(),
        stores,
        publisher,
        config.max_attempts,
    ));

    let state = AppState { pipeline };
    let health_state = health::HealthState {
        pool: db_pool,
        channel,
    };

    let app = Router::new()
        .route("/ingest/{source_name}", post(handlers::ingest))
        .with_state(state)
        .merge(
            Router::new()
                .route("/health", get(health::health_check))
                .route("/ready", get(health::readiness_check))
                .with_state(health_state),
        )
        .layer(TraceLayer::new_for_http());

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {addr}"))?;

    info!("✅ Ingest is READY on http://{}", addr);
    info!("   - POST /ingest/{{source_name}}");
    info!("   - GET  /health");
    info!("   - Press Ctrl+C to shutdown gracefully");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Ingest server failed")?;

    info!("👋 Ingest stopped");
    Ok(())
}

async fn shutdown_signal() {
    let _ = signal::ctrl_c().await;
    info!("📡 Received Ctrl+C signal");
    info!("🛑 Shutting down Ingest...");
}

/*!
 * Delivery Worker Service
 *
 * Consumes delivery jobs from the main queue and pushes webhook bodies to
 * destination endpoints.
 *
 * ## Architecture
 *
 * ```text
 * webhookhub.deliveries ──> consumer (prefetch-bounded)
 *        ^                      │
 *        │                      ├── 2xx ──────────> row DELIVERED, ack
 *   TTL expiry                  ├── retryable ────> row RETRYING,
 *        │                      │                   publish retry (TTL=backoff), ack
 * deliveries.retry.q <──────────┘
 *                               └── terminal ─────> row DEAD,
 *                                                   publish DLX, ack
 * ```
 *
 * ## Configuration
 *
 * Environment variables:
 * - DB_URL / DB_USER / DB_PASSWORD: PostgreSQL connection
 * - DB_MAX_CONNECTIONS: pool size (default: PREFETCH + 4)
 * - RABBITMQ_HOST / RABBITMQ_PORT / RABBITMQ_USER / RABBITMQ_PASSWORD / RABBITMQ_VHOST
 * - BASE_DELAY_MS: backoff base (default: 5000)
 * - MAX_DELAY_MS: backoff cap (default: 1800000)
 * - MAX_ATTEMPTS: attempt budget (default: 5)
 * - PREFETCH: unacked messages held at once (default: 5)
 * - HTTP_TIMEOUT_MS: per-attempt timeout (default: 10000)
 * - WORKER_HEALTH_PORT: health/metrics port (default: 8081)
 */

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::{Router, http::StatusCode, routing::get};
use tokio::signal;
use tracing::{error, info, warn};

use webhookhub_common::amqp;
use webhookhub_delivery::client::DeliveryClient;
use webhookhub_delivery::config::WorkerConfig;
use webhookhub_delivery::consumer::{AmqpRetrySink, DeliveryConsumer, DeliveryProcessor};
use webhookhub_delivery::health;
use webhookhub_delivery::metrics;
use webhookhub_delivery::store::PgDeliveryStatusStore;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    webhookhub_common::init_tracing();

    info!("🚀 Starting Delivery Worker");

    // Load configuration
    let config = WorkerConfig::from_env().context("Failed to load configuration")?;

    info!("📋 Configuration loaded:");
    info!(
        "   - Database: {}",
        config.db_url.split('@').next_back().unwrap_or("***")
    );
    info!(
        "   - RabbitMQ: {}:{}",
        config.rabbitmq_host, config.rabbitmq_port
    );
    info!("   - Prefetch: {}", config.prefetch);
    info!("   - HTTP Timeout: {:?}", config.http_timeout);
    info!("   - Max Attempts: {}", config.max_attempts);
    info!(
        "   - Backoff: base={}ms cap={}ms",
        config.base_delay_ms, config.max_delay_ms
    );

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

    // Wire the processor from its capability contracts
    let client = DeliveryClient::new(config.http_timeout)
        .context("Failed to create delivery client")?;
    let store = Arc::new(PgDeliveryStatusStore::new(db_pool.clone()));
    let sink = Arc::new(AmqpRetrySink::new(channel.clone()));
    let processor = Arc::new(DeliveryProcessor::new(
        client,
        store,
        sink,
        config.max_attempts,
        config.base_delay_ms,
        config.max_delay_ms,
    ));

    // Start health/metrics server
    let health_port = config.health_port;
    let health_state = health::HealthState {
        pool: db_pool,
        channel: channel.clone(),
    };
    tokio::spawn(async move {
        if let Err(e) = start_health_server(health_port, health_state).await {
            error!("Health server failed: {}", e);
        }
    });

    // Create shutdown channel
    let (shutdown_tx, shutdown_rx) = tokio::sync::broadcast::channel::<()>(1);

    let consumer = DeliveryConsumer::new(channel, processor, config.prefetch);

    let consumer_handle = tokio::spawn(async move {
        if let Err(e) = consumer.run(shutdown_rx).await {
            error!("Consumer error: {}", e);
        }
    });

    info!("✅ Delivery Worker is READY");
    info!("   - Health: http://0.0.0.0:{}/health", config.health_port);
    info!("   - Press Ctrl+C to shutdown gracefully");

    // Wait for shutdown signal
    let _ = signal::ctrl_c().await;
    info!("📡 Received Ctrl+C signal");
    info!("🛑 Shutting down Delivery Worker...");

    // Stop consuming, then give in-flight handlers a bounded drain window.
    // Anything unsettled after that is redelivered by the broker.
    let _ = shutdown_tx.send(());
    if tokio::time::timeout(Duration::from_secs(10), consumer_handle)
        .await
        .is_err()
    {
        warn!("Drain window elapsed with handlers still in flight");
    }

    info!("👋 Delivery Worker stopped");
    Ok(())
}

/// Metrics endpoint handler
async fn metrics_handler() -> Result<String, (StatusCode, String)> {
    metrics::render_metrics().map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
}

/// Start HTTP health server for Kubernetes-style health checks
async fn start_health_server(port: u16, state: health::HealthState) -> Result<()> {
    let app = Router::new()
        .route("/health", get(health::health_check))
        .route("/ready", get(health::readiness_check))
        .route("/metrics", get(metrics_handler))
        .with_state(state);

    let addr = format!("0.0.0.0:{port}");
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind health server to {addr}"))?;

    info!("🏥 Health server listening on http://{}", addr);

    axum::serve(listener, app)
        .await
        .context("Health server failed")?;

    Ok(())
}

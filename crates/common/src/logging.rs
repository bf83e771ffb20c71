//! Logging and tracing setup
//!
//! Structured logging configuration shared by every service binary.

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize tracing/logging for the application
///
/// Reads the log level from the RUST_LOG env var, defaulting to info.
///
/// Usage:
/// ```rust,ignore
/// // In main.rs
/// webhookhub_common::init_tracing();
///
/// // Then in your code:
/// tracing::info!("Server starting on port 8080");
/// tracing::error!(error = %e, "Database connection failed");
/// ```
pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true) // Show module path
                .with_level(true) // Show log level
                .with_thread_ids(true) // Show thread IDs
                .with_file(true) // Show file and line
                .compact(), // Compact format
        )
        .init();
}

/// Initialize tracing with JSON output (for production)
///
/// Outputs logs in JSON format, better for log aggregation systems
/// like Grafana Loki, ELK stack, etc.
pub fn init_tracing_json() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_target(true)
                .with_level(true)
                .with_current_span(true),
        )
        .init();
}

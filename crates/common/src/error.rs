//! Error types for WebhookHub
//!
//! One enum covers every error kind that crosses a crate boundary. The
//! ingest front-end maps these to HTTP statuses; the delivery worker treats
//! any of them as an unhandled processing failure (reject without requeue).

use thiserror::Error;

/// Main error type for WebhookHub operations
#[derive(Debug, Error)]
pub enum Error {
    /// Database errors (PostgreSQL via sqlx)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Broker errors (RabbitMQ via lapin)
    #[error("Broker error: {0}")]
    Broker(#[from] lapin::Error),

    /// Request validation errors (blank event type, malformed payload)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Source name is not registered
    #[error("Unknown source: {0}")]
    SourceNotFound(String),

    /// Source exists but has been deactivated
    #[error("Source is inactive: {0}")]
    SourceInactive(String),

    /// Request carried no signature header
    #[error("Missing webhook signature")]
    MissingSignature,

    /// Supplied signature does not match the computed HMAC
    #[error("Invalid webhook signature")]
    InvalidSignature,

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Generic errors
    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

/// Result type alias for WebhookHub operations
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::Validation("event type is required".to_string());
        assert_eq!(err.to_string(), "Validation error: event type is required");

        let err = Error::SourceNotFound("github".to_string());
        assert_eq!(err.to_string(), "Unknown source: github");
    }

    #[test]
    fn test_error_conversion() {
        let sql_err = sqlx::Error::RowNotFound;
        let our_err: Error = sql_err.into();
        assert!(matches!(our_err, Error::Database(_)));
    }
}

//! # WebhookHub Common Library
//!
//! Shared utilities and infrastructure code used by all WebhookHub services.
//!
//! This crate provides:
//! - Database connection pooling (PostgreSQL via sqlx)
//! - RabbitMQ topology declaration and publish contracts
//! - Custom error types
//! - HMAC signature helpers for webhook authentication
//! - Structured logging setup

// Module declarations
pub mod amqp;
pub mod db;
pub mod error;
pub mod logging;
pub mod signature;

// Re-export commonly used types
pub use db::create_pool;
pub use error::{Error, Result};
pub use logging::init_tracing;
pub use signature::{sign_hmac, verify_hmac};

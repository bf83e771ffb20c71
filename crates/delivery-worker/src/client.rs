/*!
 * HTTP Delivery Client
 *
 * Sends one webhook body to one destination URL and classifies the result.
 * Classification, not error propagation: every attempt yields an outcome the
 * consumer state machine can act on directly.
 */

use anyhow::{Context, Result};
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

use crate::retry::is_retryable_status;

/// Classified result of one delivery attempt
///
/// Transport-level failures (connect, DNS, timeout, TLS) carry status 0.
#[derive(Debug, Clone, PartialEq)]
pub enum DeliveryOutcome {
    Success {
        status: u16,
    },
    RetryableFailure {
        status: u16,
        message: String,
    },
    NonRetryableFailure {
        status: u16,
        message: String,
    },
}

/// Webhook delivery client
///
/// Wraps a pooled reqwest client; safe to share across in-flight messages.
pub struct DeliveryClient {
    client: Client,
}

impl DeliveryClient {
    /// Create a new delivery client with a per-attempt timeout
    pub fn new(http_timeout: Duration) -> Result<Self> {
        // Redirects are classified, not followed
        let client = Client::builder()
            .timeout(http_timeout)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { client })
    }

    /// POST one payload to a destination and classify the outcome
    pub async fn post(&self, target_url: &str, payload_json: &str) -> DeliveryOutcome {
        debug!(
            "Sending webhook to {}",
            &target_url[..40.min(target_url.len())]
        );

        let response = self
            .client
            .post(target_url)
            .header("Content-Type", "application/json")
            .body(payload_json.to_string())
            .send()
            .await;

        match response {
            Ok(response) => {
                let status = response.status().as_u16();

                if (200..300).contains(&status) {
                    DeliveryOutcome::Success { status }
                } else if is_retryable_status(status) {
                    DeliveryOutcome::RetryableFailure {
                        status,
                        message: format!("destination responded with status {status}"),
                    }
                } else {
                    DeliveryOutcome::NonRetryableFailure {
                        status,
                        message: format!("destination responded with status {status}"),
                    }
                }
            }
            Err(e) => {
                // No response at all: connect/DNS/TLS/timeout. All transient
                // from where we stand.
                let message = if e.is_timeout() {
                    "timeout waiting for destination response".to_string()
                } else {
                    format!("request failed before a response: {e}")
                };

                DeliveryOutcome::RetryableFailure { status: 0, message }
            }
        }
    }
}

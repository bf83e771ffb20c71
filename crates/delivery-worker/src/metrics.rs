/*!
 * Prometheus Metrics for the Delivery Worker
 *
 * Exposed on /metrics for Prometheus scraping
 */

use lazy_static::lazy_static;
use prometheus::{
    Encoder, HistogramVec, IntCounter, IntCounterVec, TextEncoder, opts, register_histogram_vec,
    register_int_counter, register_int_counter_vec,
};

lazy_static! {
    /// Jobs consumed from the main queue
    pub static ref JOBS_CONSUMED_TOTAL: IntCounter = register_int_counter!(opts!(
        "webhookhub_delivery_jobs_consumed_total",
        "Total jobs consumed from the main delivery queue"
    ))
    .expect("metric can be created");

    /// Delivery attempts by outcome
    pub static ref DELIVERY_ATTEMPTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        opts!("webhookhub_delivery_attempts_total", "Total delivery attempts"),
        &["destination", "outcome"]
    )
    .expect("metric can be created");

    /// Delivery duration histogram
    pub static ref DELIVERY_DURATION: HistogramVec = register_histogram_vec!(
        "webhookhub_delivery_duration_seconds",
        "Webhook delivery duration in seconds",
        &["destination"],
        vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]
    )
    .expect("metric can be created");

    /// HTTP status codes received from destinations
    pub static ref HTTP_RESPONSES_TOTAL: IntCounterVec = register_int_counter_vec!(
        opts!("webhookhub_delivery_http_responses_total", "Total HTTP responses by status code"),
        &["status_code"]
    )
    .expect("metric can be created");

    /// Retries scheduled onto the holding queue
    pub static ref RETRIES_SCHEDULED_TOTAL: IntCounterVec = register_int_counter_vec!(
        opts!("webhookhub_delivery_retries_scheduled_total", "Total retries scheduled"),
        &["destination"]
    )
    .expect("metric can be created");

    /// Jobs routed to the dead-letter exchange
    pub static ref DEAD_LETTERED_TOTAL: IntCounterVec = register_int_counter_vec!(
        opts!("webhookhub_delivery_dead_lettered_total", "Total jobs dead-lettered"),
        &["destination"]
    )
    .expect("metric can be created");
}

/// Render metrics in Prometheus text format
pub fn render_metrics() -> Result<String, Box<dyn std::error::Error>> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = vec![];
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8(buffer)?)
}

/*!
 * Delivery Job Consumer
 *
 * Pulls delivery jobs from the main queue with a bounded prefetch and walks
 * each one through the state machine:
 *
 * ```text
 * Received → decode JSON job
 *   │ decode fails → reject without requeue (→ DLQ via the main-queue DLX binding)
 * Decoded → HTTP POST to the destination
 *   │ Success                               → row DELIVERED, ack
 *   │ Retryable and attempts remain         → row RETRYING, publish to retry
 *   │                                         queue with expiration=backoff, ack
 *   │ Non-retryable or attempts exhausted   → row DEAD, publish to DLX, ack
 *   │ Anything else blows up                → nack without requeue (→ DLQ)
 * ```
 *
 * A message is never acked before its outcome is durably written; for
 * retries the republish happens before the ack too. If the republish fails
 * the broker redelivers the original, and since the row already carries the
 * incremented attempt count, progress is preserved.
 */

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use futures::StreamExt;
use lapin::{
    Channel,
    message::Delivery as AmqpDelivery,
    options::{
        BasicAckOptions, BasicConsumeOptions, BasicNackOptions, BasicQosOptions,
        BasicRejectOptions,
    },
    types::FieldTable,
};
use tracing::{error, info, warn};
use uuid::Uuid;
use webhookhub_common::{Error, Result, amqp};
use webhookhub_domain::DeliveryJob;

use crate::client::{DeliveryClient, DeliveryOutcome};
use crate::metrics;
use crate::retry::backoff_delay_ms;
use crate::store::DeliveryStatusStore;

/// Where failed jobs go: the retry holding queue or the dead-letter exchange
#[async_trait]
pub trait RetrySink: Send + Sync {
    /// Publish the job to the retry queue with a per-message TTL
    async fn schedule_retry(&self, job: &DeliveryJob, delay_ms: u64) -> Result<()>;

    /// Publish the job to the dead-letter exchange
    async fn dead_letter(&self, job: &DeliveryJob) -> Result<()>;
}

/// RabbitMQ retry/DLX publisher sharing the consumer channel
pub struct AmqpRetrySink {
    channel: Channel,
}

impl AmqpRetrySink {
    pub fn new(channel: Channel) -> Self {
        Self { channel }
    }
}

#[async_trait]
impl RetrySink for AmqpRetrySink {
    async fn schedule_retry(&self, job: &DeliveryJob, delay_ms: u64) -> Result<()> {
        let payload = serde_json::to_vec(job)?;
        amqp::publish_retry(&self.channel, &payload, delay_ms).await
    }

    async fn dead_letter(&self, job: &DeliveryJob) -> Result<()> {
        let payload = serde_json::to_vec(job)?;
        amqp::publish_dead_letter(&self.channel, &payload).await
    }
}

/// Processes one decoded job: attempt, classify, persist, route
pub struct DeliveryProcessor {
    client: DeliveryClient,
    store: Arc<dyn DeliveryStatusStore>,
    sink: Arc<dyn RetrySink>,
    max_attempts: i32,
    base_delay_ms: u64,
    max_delay_ms: u64,
}

impl DeliveryProcessor {
    pub fn new(
        client: DeliveryClient,
        store: Arc<dyn DeliveryStatusStore>,
        sink: Arc<dyn RetrySink>,
        max_attempts: i32,
        base_delay_ms: u64,
        max_delay_ms: u64,
    ) -> Self {
        Self {
            client,
            store,
            sink,
            max_attempts,
            base_delay_ms,
            max_delay_ms,
        }
    }

    /// Run one delivery attempt and write its outcome durably
    ///
    /// Returns Ok once the outcome is persisted (and, for non-success, the
    /// follow-up message is published); the caller acks only after that.
    pub async fn process(&self, job: &DeliveryJob) -> Result<()> {
        let delivery_id = Uuid::parse_str(&job.delivery_id)
            .map_err(|e| Error::Validation(format!("invalid delivery id in job: {e}")))?;

        let start = Instant::now();
        let outcome = self.client.post(&job.target_url, &job.payload_json).await;

        metrics::DELIVERY_DURATION
            .with_label_values(&[&job.destination_id])
            .observe(start.elapsed().as_millis() as f64 / 1000.0);

        match outcome {
            DeliveryOutcome::Success { status } => {
                metrics::HTTP_RESPONSES_TOTAL
                    .with_label_values(&[&status.to_string()])
                    .inc();
                metrics::DELIVERY_ATTEMPTS_TOTAL
                    .with_label_values(&[&job.destination_id, "delivered"])
                    .inc();

                self.store.mark_delivered(delivery_id, job.attempt).await?;

                info!(
                    "✅ Webhook delivered: delivery={} status={} attempt={}",
                    job.delivery_id, status, job.attempt
                );
            }

            DeliveryOutcome::RetryableFailure { status, message }
                if job.attempt < self.max_attempts =>
            {
                if status > 0 {
                    metrics::HTTP_RESPONSES_TOTAL
                        .with_label_values(&[&status.to_string()])
                        .inc();
                }
                metrics::DELIVERY_ATTEMPTS_TOTAL
                    .with_label_values(&[&job.destination_id, "retrying"])
                    .inc();

                let retry_job = job.next_attempt();
                let delay_ms = backoff_delay_ms(job.attempt, self.base_delay_ms, self.max_delay_ms);

                // Row first, then the delayed republish, then the caller acks
                self.store
                    .mark_retrying(delivery_id, retry_job.attempt, &message)
                    .await?;
                self.sink.schedule_retry(&retry_job, delay_ms).await?;

                metrics::RETRIES_SCHEDULED_TOTAL
                    .with_label_values(&[&job.destination_id])
                    .inc();

                warn!(
                    "⏳ Delivery retry scheduled: delivery={} attempt={}/{} delay={}ms error={}",
                    job.delivery_id, retry_job.attempt, self.max_attempts, delay_ms, message
                );
            }

            DeliveryOutcome::RetryableFailure { status, message }
            | DeliveryOutcome::NonRetryableFailure { status, message } => {
                if status > 0 {
                    metrics::HTTP_RESPONSES_TOTAL
                        .with_label_values(&[&status.to_string()])
                        .inc();
                }
                metrics::DELIVERY_ATTEMPTS_TOTAL
                    .with_label_values(&[&job.destination_id, "dead"])
                    .inc();

                self.store
                    .mark_dead(delivery_id, job.attempt, &message)
                    .await?;
                self.sink.dead_letter(job).await?;

                metrics::DEAD_LETTERED_TOTAL
                    .with_label_values(&[&job.destination_id])
                    .inc();

                error!(
                    "❌ Delivery dead: delivery={} attempts={} error={}",
                    job.delivery_id, job.attempt, message
                );
            }
        }

        Ok(())
    }
}

/// AMQP consumer driving the processor with bounded in-flight messages
pub struct DeliveryConsumer {
    channel: Channel,
    processor: Arc<DeliveryProcessor>,
    prefetch: u16,
}

impl DeliveryConsumer {
    pub fn new(channel: Channel, processor: Arc<DeliveryProcessor>, prefetch: u16) -> Self {
        Self {
            channel,
            processor,
            prefetch,
        }
    }

    /// Consume from the main queue until shutdown
    ///
    /// QoS bounds unacked messages to `prefetch`; each message is handled in
    /// its own task, so the broker itself enforces the in-flight cap.
    pub async fn run(
        &self,
        mut shutdown_rx: tokio::sync::broadcast::Receiver<()>,
    ) -> Result<()> {
        self.channel
            .basic_qos(self.prefetch, BasicQosOptions::default())
            .await?;

        let mut consumer = self
            .channel
            .basic_consume(
                amqp::MAIN_QUEUE,
                "delivery-worker",
                BasicConsumeOptions::default(),
                FieldTable::default(),
            )
            .await?;

        info!(
            "✅ Consuming from {} (prefetch: {})",
            amqp::MAIN_QUEUE,
            self.prefetch
        );

        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    info!("Shutdown signal received, stopping consumer");
                    break;
                }
                next = consumer.next() => {
                    match next {
                        Some(Ok(delivery)) => {
                            metrics::JOBS_CONSUMED_TOTAL.inc();
                            let processor = Arc::clone(&self.processor);
                            tokio::spawn(async move {
                                handle_message(processor, delivery).await;
                            });
                        }
                        Some(Err(e)) => {
                            error!("Consumer stream error: {}", e);
                        }
                        None => {
                            warn!("Consumer stream closed by broker");
                            break;
                        }
                    }
                }
            }
        }

        Ok(())
    }
}

/// Decode, process, settle — in that order
async fn handle_message(processor: Arc<DeliveryProcessor>, delivery: AmqpDelivery) {
    let job: DeliveryJob = match serde_json::from_slice(&delivery.data) {
        Ok(job) => job,
        Err(e) => {
            // Not one of ours; the main-queue DLX binding routes it to the
            // dead-letter queue for inspection.
            warn!("Failed to decode delivery job, dead-lettering: {}", e);
            if let Err(e) = delivery
                .acker
                .reject(BasicRejectOptions { requeue: false })
                .await
            {
                error!("Failed to reject undecodable message: {}", e);
            }
            return;
        }
    };

    match processor.process(&job).await {
        Ok(()) => {
            if let Err(e) = delivery.acker.ack(BasicAckOptions::default()).await {
                error!(
                    "Failed to ack delivery {}: {} (broker will redeliver)",
                    job.delivery_id, e
                );
            }
        }
        Err(e) => {
            error!(
                "Unhandled failure processing delivery {}: {}",
                job.delivery_id, e
            );
            if let Err(e) = delivery
                .acker
                .nack(BasicNackOptions {
                    requeue: false,
                    ..BasicNackOptions::default()
                })
                .await
            {
                error!("Failed to nack delivery {}: {}", job.delivery_id, e);
            }
        }
    }
}

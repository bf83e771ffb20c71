/*!
 * Delivery Job Publisher
 *
 * Publishes first-attempt delivery jobs to the main exchange. The worker
 * picks them up from the bound main queue.
 */

use async_trait::async_trait;
use lapin::Channel;
use tracing::debug;
use webhookhub_common::{Result, amqp};
use webhookhub_domain::DeliveryJob;

/// Publish contract for ingest-produced delivery jobs (C5 → C7)
#[async_trait]
pub trait JobPublisher: Send + Sync {
    async fn publish(&self, job: &DeliveryJob) -> Result<()>;
}

/// RabbitMQ publisher for delivery jobs
pub struct AmqpJobPublisher {
    channel: Channel,
}

impl AmqpJobPublisher {
    pub fn new(channel: Channel) -> Self {
        Self { channel }
    }
}

#[async_trait]
impl JobPublisher for AmqpJobPublisher {
    async fn publish(&self, job: &DeliveryJob) -> Result<()> {
        let payload = serde_json::to_vec(job)?;
        amqp::publish_delivery(&self.channel, &payload).await?;

        debug!(
            "Published delivery job: delivery={} attempt={}",
            job.delivery_id, job.attempt
        );

        Ok(())
    }
}

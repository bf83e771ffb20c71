/*!
 * Ingest Pipeline
 *
 * Orchestrates one inbound webhook end to end:
 *
 * ```text
 * lookup source → verify HMAC → insert event (idempotent)
 *     → per matching destination: insert PENDING delivery → publish job
 * ```
 *
 * Preconditions are checked in a fixed order and the first failure wins, so
 * a caller probing with a bad signature learns nothing about event payloads.
 * A duplicate fingerprint short-circuits to an empty result without creating
 * delivery rows or publishing jobs.
 */

use std::sync::Arc;

use tracing::{debug, info};
use webhookhub_common::{Error, Result, signature};
use webhookhub_domain::{Delivery, DeliveryJob, Event};

use crate::publisher::JobPublisher;
use crate::stores::{DeliveryStore, DestinationReader, EventStore, SourceReader};

/// The ingest pipeline (C5), wired from capability contracts
pub struct IngestPipeline {
    sources: Arc<dyn SourceReader>,
    destinations: Arc<dyn DestinationReader>,
    events: Arc<dyn EventStore>,
    deliveries: Arc<dyn DeliveryStore>,
    publisher: Arc<dyn JobPublisher>,
    max_attempts: i32,
}

impl IngestPipeline {
    pub fn new(
        sources: Arc<dyn SourceReader>,
        destinations: Arc<dyn DestinationReader>,
        events: Arc<dyn EventStore>,
        deliveries: Arc<dyn DeliveryStore>,
        publisher: Arc<dyn JobPublisher>,
        max_attempts: i32,
    ) -> Self {
        Self {
            sources,
            destinations,
            events,
            deliveries,
            publisher,
            max_attempts,
        }
    }

    /// Ingest one signed webhook
    ///
    /// Returns the delivery records created for this event, or the empty
    /// list when the event fingerprint was already stored (idempotent
    /// resubmission).
    pub async fn ingest(
        &self,
        source_name: &str,
        event_type: &str,
        raw_body: &[u8],
        supplied_sig: &str,
    ) -> Result<Vec<Delivery>> {
        if event_type.trim().is_empty() {
            return Err(Error::Validation("event type is required".to_string()));
        }

        let source = self
            .sources
            .find_by_name(source_name)
            .await?
            .ok_or_else(|| Error::SourceNotFound(source_name.to_string()))?;

        if !source.active {
            return Err(Error::SourceInactive(source_name.to_string()));
        }

        if supplied_sig.trim().is_empty() {
            return Err(Error::MissingSignature);
        }

        if !signature::verify_hmac(raw_body, supplied_sig, &source.hmac_secret) {
            return Err(Error::InvalidSignature);
        }

        // The job's payload carries the verbatim body string; parse only for
        // the stored copy.
        let body_text = std::str::from_utf8(raw_body)
            .map_err(|_| Error::Validation("payload must be valid UTF-8".to_string()))?;
        let payload: serde_json::Value = serde_json::from_str(body_text)
            .map_err(|_| Error::Validation("payload must be valid JSON".to_string()))?;

        let event = Event::new(source_name, event_type, payload, raw_body);

        if !self.events.insert_if_absent(&event).await? {
            debug!(
                "Duplicate event fingerprint for source={} type={}, skipping fan-out",
                source_name, event_type
            );
            return Ok(Vec::new());
        }

        let destinations = self
            .destinations
            .find_matching(source_name, event_type)
            .await?;

        let mut created = Vec::with_capacity(destinations.len());
        for destination in destinations {
            let delivery = Delivery::pending(event.id, destination.id, self.max_attempts);
            self.deliveries.insert(&delivery).await?;

            let job = DeliveryJob::first_attempt(
                &delivery,
                &destination.target_url,
                body_text.to_string(),
            );
            self.publisher.publish(&job).await?;

            created.push(delivery);
        }

        info!(
            "Ingested event {} from source={} type={}, created {} deliveries",
            event.id,
            source_name,
            event_type,
            created.len()
        );

        Ok(created)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::collections::HashSet;
    use std::sync::Mutex;
    use uuid::Uuid;
    use webhookhub_common::sign_hmac;
    use webhookhub_domain::{Destination, DeliveryStatus, Source};

    /// In-memory stand-in for every capability the pipeline touches
    #[derive(Default)]
    struct InMemoryHub {
        sources: Vec<Source>,
        destinations: Vec<Destination>,
        matching_destination_ids: Vec<Uuid>,
        seen_fingerprints: Mutex<HashSet<(String, String)>>,
        events: Mutex<Vec<Event>>,
        deliveries: Mutex<Vec<Delivery>>,
        published: Mutex<Vec<DeliveryJob>>,
    }

    #[async_trait::async_trait]
    impl SourceReader for InMemoryHub {
        async fn find_by_name(&self, name: &str) -> webhookhub_common::Result<Option<Source>> {
            Ok(self.sources.iter().find(|s| s.name == name).cloned())
        }
    }

    #[async_trait::async_trait]
    impl DestinationReader for InMemoryHub {
        async fn find_matching(
            &self,
            _source_name: &str,
            _event_type: &str,
        ) -> webhookhub_common::Result<Vec<Destination>> {
            Ok(self
                .destinations
                .iter()
                .filter(|d| d.active && self.matching_destination_ids.contains(&d.id))
                .cloned()
                .collect())
        }
    }

    #[async_trait::async_trait]
    impl EventStore for InMemoryHub {
        async fn insert_if_absent(&self, event: &Event) -> webhookhub_common::Result<bool> {
            let mut seen = self.seen_fingerprints.lock().unwrap();
            let fresh = seen.insert((event.source_name.clone(), event.idempotency_key.clone()));
            if fresh {
                self.events.lock().unwrap().push(event.clone());
            }
            Ok(fresh)
        }
    }

    #[async_trait::async_trait]
    impl DeliveryStore for InMemoryHub {
        async fn insert(&self, delivery: &Delivery) -> webhookhub_common::Result<()> {
            self.deliveries.lock().unwrap().push(delivery.clone());
            Ok(())
        }
    }

    #[async_trait::async_trait]
    impl JobPublisher for InMemoryHub {
        async fn publish(&self, job: &DeliveryJob) -> webhookhub_common::Result<()> {
            self.published.lock().unwrap().push(job.clone());
            Ok(())
        }
    }

    const SECRET: &str = "8f7d2a91c4b6e3f0a5d8c7b2e9f4a1d6c3b8e5f2a9d4c1b6e3f8a5d2c9b4e7f0";

    fn source(name: &str, active: bool) -> Source {
        Source {
            id: Uuid::new_v4(),
            name: name.to_string(),
            hmac_secret: SECRET.to_string(),
            active,
            created_at: Utc::now(),
        }
    }

    fn destination(active: bool) -> Destination {
        Destination {
            id: Uuid::new_v4(),
            name: "orders-processor".to_string(),
            target_url: "https://example.com/webhook".to_string(),
            active,
            created_at: Utc::now(),
        }
    }

    fn pipeline_with(hub: Arc<InMemoryHub>) -> IngestPipeline {
        IngestPipeline::new(
            hub.clone(),
            hub.clone(),
            hub.clone(),
            hub.clone(),
            hub,
            5,
        )
    }

    #[tokio::test]
    async fn test_successful_ingest_creates_deliveries_and_jobs() {
        let dest_a = destination(true);
        let dest_b = destination(true);
        let hub = Arc::new(InMemoryHub {
            sources: vec![source("github", true)],
            matching_destination_ids: vec![dest_a.id, dest_b.id],
            destinations: vec![dest_a, dest_b],
            ..Default::default()
        });
        let pipeline = pipeline_with(hub.clone());

        let body = br#"{"test":true}"#;
        let sig = sign_hmac(body, SECRET);

        let deliveries = pipeline.ingest("github", "push", body, &sig).await.unwrap();

        assert_eq!(deliveries.len(), 2);
        for delivery in &deliveries {
            assert_eq!(delivery.status, DeliveryStatus::Pending);
            assert_eq!(delivery.attempts, 0);
            assert_eq!(delivery.max_attempts, 5);
        }

        assert_eq!(hub.events.lock().unwrap().len(), 1);

        let published = hub.published.lock().unwrap();
        assert_eq!(published.len(), 2);
        for job in published.iter() {
            assert_eq!(job.attempt, 1);
            // Verbatim string carrier, not a re-encoded object
            assert_eq!(job.payload_json, r#"{"test":true}"#);
            assert_eq!(job.target_url, "https://example.com/webhook");
        }
    }

    #[tokio::test]
    async fn test_duplicate_submission_is_idempotent() {
        let dest = destination(true);
        let hub = Arc::new(InMemoryHub {
            sources: vec![source("github", true)],
            matching_destination_ids: vec![dest.id],
            destinations: vec![dest],
            ..Default::default()
        });
        let pipeline = pipeline_with(hub.clone());

        let body = br#"{"test":true}"#;
        let sig = sign_hmac(body, SECRET);

        let first = pipeline.ingest("github", "push", body, &sig).await.unwrap();
        let second = pipeline.ingest("github", "push", body, &sig).await.unwrap();

        assert_eq!(first.len(), 1);
        assert!(second.is_empty(), "resubmission must return no deliveries");

        // Exactly one event row, one delivery row, one published job
        assert_eq!(hub.events.lock().unwrap().len(), 1);
        assert_eq!(hub.deliveries.lock().unwrap().len(), 1);
        assert_eq!(hub.published.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_blank_event_type_is_rejected() {
        let hub = Arc::new(InMemoryHub {
            sources: vec![source("github", true)],
            ..Default::default()
        });
        let pipeline = pipeline_with(hub);

        let result = pipeline.ingest("github", "  ", b"{}", "sig").await;
        assert!(matches!(result, Err(Error::Validation(_))));
    }

    #[tokio::test]
    async fn test_unknown_source_is_rejected() {
        let hub = Arc::new(InMemoryHub::default());
        let pipeline = pipeline_with(hub);

        let result = pipeline.ingest("nobody", "push", b"{}", "sig").await;
        assert!(matches!(result, Err(Error::SourceNotFound(_))));
    }

    #[tokio::test]
    async fn test_inactive_source_is_rejected() {
        let hub = Arc::new(InMemoryHub {
            sources: vec![source("github", false)],
            ..Default::default()
        });
        let pipeline = pipeline_with(hub);

        let result = pipeline.ingest("github", "push", b"{}", "sig").await;
        assert!(matches!(result, Err(Error::SourceInactive(_))));
    }

    #[tokio::test]
    async fn test_blank_signature_is_missing_not_invalid() {
        let hub = Arc::new(InMemoryHub {
            sources: vec![source("github", true)],
            ..Default::default()
        });
        let pipeline = pipeline_with(hub);

        let result = pipeline.ingest("github", "push", b"{}", "").await;
        assert!(matches!(result, Err(Error::MissingSignature)));

        let result = pipeline.ingest("github", "push", b"{}", "   ").await;
        assert!(matches!(result, Err(Error::MissingSignature)));
    }

    #[tokio::test]
    async fn test_wrong_signature_is_rejected() {
        let hub = Arc::new(InMemoryHub {
            sources: vec![source("github", true)],
            ..Default::default()
        });
        let pipeline = pipeline_with(hub.clone());

        let body = br#"{"test":true}"#;
        let sig = sign_hmac(b"different body", SECRET);

        let result = pipeline.ingest("github", "push", body, &sig).await;
        assert!(matches!(result, Err(Error::InvalidSignature)));
        assert!(hub.events.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_non_json_body_is_rejected() {
        let hub = Arc::new(InMemoryHub {
            sources: vec![source("github", true)],
            ..Default::default()
        });
        let pipeline = pipeline_with(hub);

        let body = b"not json at all";
        let sig = sign_hmac(body, SECRET);

        let result = pipeline.ingest("github", "push", body, &sig).await;
        assert!(matches!(result, Err(Error::Validation(_))));
    }

    #[tokio::test]
    async fn test_inactive_destinations_are_skipped() {
        let active = destination(true);
        let inactive = destination(false);
        let hub = Arc::new(InMemoryHub {
            sources: vec![source("github", true)],
            matching_destination_ids: vec![active.id, inactive.id],
            destinations: vec![active.clone(), inactive],
            ..Default::default()
        });
        let pipeline = pipeline_with(hub.clone());

        let body = br#"{"n":1}"#;
        let sig = sign_hmac(body, SECRET);

        let deliveries = pipeline.ingest("github", "push", body, &sig).await.unwrap();

        assert_eq!(deliveries.len(), 1);
        assert_eq!(deliveries[0].destination_id, active.id);
    }

    #[tokio::test]
    async fn test_no_matching_destinations_still_stores_event() {
        let hub = Arc::new(InMemoryHub {
            sources: vec![source("github", true)],
            ..Default::default()
        });
        let pipeline = pipeline_with(hub.clone());

        let body = br#"{"n":2}"#;
        let sig = sign_hmac(body, SECRET);

        let deliveries = pipeline.ingest("github", "push", body, &sig).await.unwrap();

        assert!(deliveries.is_empty());
        assert_eq!(hub.events.lock().unwrap().len(), 1);
        assert!(hub.published.lock().unwrap().is_empty());
    }
}

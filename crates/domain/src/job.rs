use serde::{Deserialize, Serialize};

use crate::delivery::Delivery;

/// On-wire delivery job (stable JSON format)
///
/// ```json
/// { "deliveryId": "<uuid>", "eventId": "<uuid>", "destinationId": "<uuid>",
///   "targetUrl": "https://...", "payloadJson": "{\"test\":true}", "attempt": 1 }
/// ```
///
/// Ids travel as text, `payloadJson` carries the verbatim inbound request
/// body as a string (not a nested object), and unknown fields are tolerated
/// on decode so older workers keep consuming newer messages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryJob {
    pub delivery_id: String,
    pub event_id: String,
    pub destination_id: String,
    pub target_url: String,
    pub payload_json: String,
    pub attempt: i32,
}

impl DeliveryJob {
    /// First-attempt job for a freshly created delivery record
    pub fn first_attempt(delivery: &Delivery, target_url: &str, payload_json: String) -> Self {
        Self {
            delivery_id: delivery.id.to_string(),
            event_id: delivery.event_id.to_string(),
            destination_id: delivery.destination_id.to_string(),
            target_url: target_url.to_string(),
            payload_json,
            attempt: 1,
        }
    }

    /// Republished copy carrying the next attempt number
    pub fn next_attempt(&self) -> Self {
        Self {
            attempt: self.attempt + 1,
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn sample_job() -> DeliveryJob {
        DeliveryJob {
            delivery_id: "550e8400-e29b-41d4-a716-446655440000".to_string(),
            event_id: "650e8400-e29b-41d4-a716-446655440000".to_string(),
            destination_id: "750e8400-e29b-41d4-a716-446655440000".to_string(),
            target_url: "https://example.com/webhook".to_string(),
            payload_json: r#"{"test":true}"#.to_string(),
            attempt: 1,
        }
    }

    #[test]
    fn test_wire_format_uses_camel_case() {
        let json = serde_json::to_string(&sample_job()).unwrap();

        assert!(json.contains("\"deliveryId\""));
        assert!(json.contains("\"eventId\""));
        assert!(json.contains("\"destinationId\""));
        assert!(json.contains("\"targetUrl\""));
        assert!(json.contains("\"payloadJson\""));
        assert!(json.contains("\"attempt\":1"));
    }

    #[test]
    fn test_payload_is_a_string_carrier() {
        // The payload travels as a string, not a nested object; a re-encode
        // would break byte-equivalence on the retry round-trip.
        let json = serde_json::to_string(&sample_job()).unwrap();
        assert!(json.contains(r#""payloadJson":"{\"test\":true}""#));

        let decoded: DeliveryJob = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded.payload_json, r#"{"test":true}"#);
    }

    #[test]
    fn test_decode_tolerates_unknown_fields() {
        let json = r#"{
            "deliveryId": "550e8400-e29b-41d4-a716-446655440000",
            "eventId": "650e8400-e29b-41d4-a716-446655440000",
            "destinationId": "750e8400-e29b-41d4-a716-446655440000",
            "targetUrl": "https://example.com/webhook",
            "payloadJson": "{}",
            "attempt": 3,
            "correlationId": "abc-123",
            "someFutureField": {"nested": true}
        }"#;

        let job: DeliveryJob = serde_json::from_str(json).unwrap();
        assert_eq!(job.attempt, 3);
        assert_eq!(job.target_url, "https://example.com/webhook");
    }

    #[test]
    fn test_round_trip_is_byte_identical() {
        let job = sample_job();
        let bytes = serde_json::to_vec(&job).unwrap();
        let reparsed: DeliveryJob = serde_json::from_slice(&bytes).unwrap();
        let bytes_again = serde_json::to_vec(&reparsed).unwrap();

        assert_eq!(bytes, bytes_again);
    }

    #[test]
    fn test_first_attempt_and_next_attempt_numbering() {
        let delivery = Delivery::pending(Uuid::new_v4(), Uuid::new_v4(), 5);
        let job =
            DeliveryJob::first_attempt(&delivery, "https://example.com/hook", "{}".to_string());

        assert_eq!(job.attempt, 1);
        assert_eq!(job.delivery_id, delivery.id.to_string());

        let retry = job.next_attempt();
        assert_eq!(retry.attempt, 2);
        assert_eq!(retry.delivery_id, job.delivery_id);
        assert_eq!(retry.payload_json, job.payload_json);
    }
}

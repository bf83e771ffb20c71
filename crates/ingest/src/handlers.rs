/*!
 * Ingest HTTP Handlers
 *
 * One route: `POST /ingest/{source_name}` with the event type and hex HMAC
 * signature carried in headers and the webhook payload as the raw body.
 */

use std::sync::Arc;

use axum::{
    Json,
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use serde_json::json;
use tracing::{error, warn};
use webhookhub_common::Error;
use webhookhub_domain::Delivery;

use crate::pipeline::IngestPipeline;

/// Header carrying the event type
pub const EVENT_TYPE_HEADER: &str = "x-event-type";

/// Header carrying the hex HMAC-SHA256 of the raw body
pub const SIGNATURE_HEADER: &str = "x-webhook-signature";

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<IngestPipeline>,
}

/// Accepted-response body: the delivery records created for this event
/// (empty on idempotent resubmission)
#[derive(Serialize)]
pub struct IngestResponse {
    pub deliveries: Vec<Delivery>,
}

/// POST /ingest/{source_name}
pub async fn ingest(
    State(state): State<AppState>,
    Path(source_name): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let event_type = header_str(&headers, EVENT_TYPE_HEADER);
    let signature = header_str(&headers, SIGNATURE_HEADER);

    match state
        .pipeline
        .ingest(&source_name, event_type, &body, signature)
        .await
    {
        Ok(deliveries) => (StatusCode::ACCEPTED, Json(IngestResponse { deliveries })).into_response(),
        Err(e) => error_response(&source_name, e),
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> &'a str {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("")
}

/// Map error kinds onto the external status contract
pub(crate) fn status_for(error: &Error) -> StatusCode {
    match error {
        Error::Validation(_) => StatusCode::BAD_REQUEST,
        Error::SourceNotFound(_) => StatusCode::NOT_FOUND,
        Error::SourceInactive(_) | Error::MissingSignature | Error::InvalidSignature => {
            StatusCode::UNAUTHORIZED
        }
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn error_response(source_name: &str, error: Error) -> Response {
    let status = status_for(&error);

    if status.is_server_error() {
        error!("Ingest failed for source={}: {}", source_name, error);
        // Infrastructure detail stays out of the response body
        return (
            status,
            Json(json!({ "error": "internal error" })),
        )
            .into_response();
    }

    warn!("Rejected ingest for source={}: {}", source_name, error);
    (status, Json(json!({ "error": error.to_string() }))).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    #[test]
    fn test_status_mapping_follows_the_error_contract() {
        assert_eq!(
            status_for(&Error::Validation("blank".into())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_for(&Error::SourceNotFound("github".into())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_for(&Error::SourceInactive("github".into())),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            status_for(&Error::MissingSignature),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            status_for(&Error::InvalidSignature),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            status_for(&Error::Internal(anyhow!("boom"))),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}

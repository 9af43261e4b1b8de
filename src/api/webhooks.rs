//! Payment-provider webhook endpoint.

use axum::{extract::State, http::HeaderMap, Json};
use serde::Serialize;

use crate::api::AppState;
use crate::http::middleware::RawBody;
use crate::http::response::ApiError;
use crate::observability::metrics;
use crate::webhooks::{WebhookEvent, WebhookEventKind};

/// Acknowledgement returned to the provider.
#[derive(Debug, Serialize)]
pub struct WebhookAck {
    pub received: bool,
    pub duplicate: bool,
}

pub async fn provider_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    RawBody(raw): RawBody,
) -> Result<Json<WebhookAck>, ApiError> {
    let Some(verifier) = state.webhooks.verifier.as_ref() else {
        tracing::error!("Webhook received but no signing secret is configured");
        metrics::record_webhook("unconfigured");
        return Err(ApiError::WebhookSecretMissing);
    };

    let signature = headers
        .get(&state.webhooks.signature_header)
        .and_then(|v| v.to_str().ok());
    if let Err(e) = verifier.verify(&raw, signature) {
        tracing::warn!(error = %e, "Webhook signature rejected");
        metrics::record_webhook("invalid_signature");
        return Err(e.into());
    }

    let event: WebhookEvent = serde_json::from_slice(&raw).map_err(|e| {
        metrics::record_webhook("malformed");
        ApiError::MalformedBody(e.to_string())
    })?;

    let kind = WebhookEventKind::classify(&event.event_type);
    let first = state.webhooks.log.record(&event, kind);
    if !first {
        tracing::info!(event_id = %event.id, event_type = %event.event_type, "Duplicate webhook delivery");
        metrics::record_webhook("duplicate");
        return Ok(Json(WebhookAck {
            received: true,
            duplicate: true,
        }));
    }

    match kind {
        WebhookEventKind::Other => {
            tracing::info!(event_id = %event.id, event_type = %event.event_type, "Unhandled webhook event type");
        }
        kind => {
            tracing::info!(event_id = %event.id, kind = kind.as_str(), "Processing webhook event");
        }
    }
    metrics::record_webhook("accepted");

    Ok(Json(WebhookAck {
        received: true,
        duplicate: false,
    }))
}

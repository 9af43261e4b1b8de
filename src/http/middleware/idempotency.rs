//! Idempotency guard stage.
//!
//! Runs after authentication. Guarded requests either replay a stored
//! response, wait for (or are refused by) an in-flight duplicate, or run
//! the handler under an exclusive lease whose 2xx outcome is snapshotted.

use axum::{
    body::{Body, HttpBody},
    extract::State,
    http::{HeaderName, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use crate::config::schema::{IdempotencyConfig, InFlightPolicy};
use crate::http::middleware::auth::Principal;
use crate::http::request::RequestIdExt;
use crate::http::response::ApiError;
use crate::idempotency::{
    CompositeKey, IdempotencyPolicy, IdempotencyStore, IdempotencyToken, Lease, Reservation,
    StoredResponse,
};
use crate::observability::metrics;

/// Everything the guard needs, shared across requests.
#[derive(Clone)]
pub struct IdempotencyState {
    pub store: Arc<dyn IdempotencyStore>,
    pub policy: Arc<IdempotencyPolicy>,
    pub header: HeaderName,
    pub in_flight: InFlightPolicy,
    pub in_flight_wait: Duration,
    pub max_key_length: usize,
    pub max_response_bytes: usize,
}

impl IdempotencyState {
    /// Build from config. The header name must already be validated.
    pub fn from_config(
        config: &IdempotencyConfig,
        store: Arc<dyn IdempotencyStore>,
    ) -> Result<Self, axum::http::header::InvalidHeaderName> {
        Ok(Self {
            store,
            policy: Arc::new(IdempotencyPolicy::from_config(config)),
            header: HeaderName::from_bytes(config.header.as_bytes())?,
            in_flight: config.in_flight,
            in_flight_wait: Duration::from_secs(config.in_flight_wait_secs),
            max_key_length: config.max_key_length,
            max_response_bytes: config.max_response_bytes,
        })
    }
}

pub async fn idempotency_middleware(
    State(state): State<IdempotencyState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if !state.policy.applies(request.method(), request.uri().path()) {
        return next.run(request).await;
    }
    let Some(value) = request.headers().get(&state.header) else {
        return next.run(request).await;
    };
    let token = match IdempotencyToken::parse(value, state.max_key_length) {
        Ok(token) => token,
        Err(e) => {
            tracing::debug!(request_id = %request.request_id(), error = %e, "Invalid idempotency key");
            return ApiError::InvalidIdempotencyKey(e.to_string()).into_response();
        }
    };
    let Some(principal) = request.extensions().get::<Principal>() else {
        tracing::debug!(
            request_id = %request.request_id(),
            "Idempotency key on anonymous request; not guarded"
        );
        metrics::record_idempotency("anonymous");
        return next.run(request).await;
    };

    let key = CompositeKey::new(principal.id.clone(), token);
    let request_id = request.request_id().to_string();
    let deadline = Instant::now() + state.in_flight_wait;

    loop {
        match state.store.reserve(&key) {
            Reservation::Replay(stored) => {
                tracing::info!(request_id = %request_id, key = %key, status = %stored.status, "Replaying stored response");
                metrics::record_idempotency("replayed");
                return stored.into_replay_response();
            }
            Reservation::Acquired(lease) => {
                return run_guarded(&state, lease, &request_id, request, next).await;
            }
            Reservation::InFlight(waiter) => match state.in_flight {
                InFlightPolicy::Reject => {
                    tracing::info!(request_id = %request_id, key = %key, "Duplicate while original in flight");
                    metrics::record_idempotency("in_flight_rejected");
                    return ApiError::DuplicateInFlight.into_response();
                }
                InFlightPolicy::Wait => {
                    tracing::debug!(request_id = %request_id, key = %key, "Waiting for in-flight original");
                    if tokio::time::timeout_at(deadline, waiter.wait()).await.is_err() {
                        tracing::warn!(request_id = %request_id, key = %key, "Gave up waiting for in-flight original");
                        metrics::record_idempotency("in_flight_timeout");
                        return ApiError::InFlightTimeout.into_response();
                    }
                    metrics::record_idempotency("in_flight_waited");
                }
            },
        }
    }
}

/// Run the handler while holding `lease`, then store or release.
async fn run_guarded(
    state: &IdempotencyState,
    lease: Lease,
    request_id: &str,
    request: Request<Body>,
    next: Next,
) -> Response {
    let response = next.run(request).await;

    if !response.status().is_success() {
        tracing::debug!(
            request_id = %request_id,
            key = %lease.key(),
            status = %response.status(),
            "Handler did not succeed; nothing stored"
        );
        metrics::record_idempotency("not_stored");
        state.store.release(lease);
        return response;
    }

    // The handler has run; from here on the lease is always completed.
    let (parts, body) = response.into_parts();
    if body.size_hint().lower() > state.max_response_bytes as u64 {
        tracing::warn!(
            request_id = %request_id,
            key = %lease.key(),
            size = body.size_hint().lower(),
            limit = state.max_response_bytes,
            "Response too large to store; retries get a marker"
        );
        metrics::record_idempotency("not_buffered");
        state.store.complete(lease, unbuffered_marker().await);
        return Response::from_parts(parts, body);
    }

    match axum::body::to_bytes(body, state.max_response_bytes).await {
        Ok(bytes) => {
            let stored = StoredResponse::new(parts.status, parts.headers.clone(), bytes.clone());
            tracing::info!(request_id = %request_id, key = %lease.key(), status = %parts.status, "Stored response");
            metrics::record_idempotency("stored");
            state.store.complete(lease, stored);
            Response::from_parts(parts, Body::from(bytes))
        }
        Err(e) => {
            tracing::error!(request_id = %request_id, key = %lease.key(), error = %e, "Could not buffer response");
            metrics::record_idempotency("not_buffered");
            state.store.complete(lease, unbuffered_marker().await);
            ApiError::ResponseNotBuffered.into_response()
        }
    }
}

/// Stands in for a successful response that could not be snapshotted.
async fn unbuffered_marker() -> StoredResponse {
    let (parts, body) = ApiError::ResponseNotBuffered.into_response().into_parts();
    let bytes = axum::body::to_bytes(body, usize::MAX).await.unwrap_or_default();
    StoredResponse::new(parts.status, parts.headers, bytes)
}

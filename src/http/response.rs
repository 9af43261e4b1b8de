//! Error responses.
//!
//! # Responsibilities
//! - Define every client-visible failure of the gateway stages
//! - Map each failure to its HTTP status code
//! - Render a uniform JSON error envelope
//!
//! # Design Decisions
//! - Stages never wrap business-handler errors; only their own failures live here
//! - Error codes are stable snake_case strings clients can switch on

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::webhooks::SignatureError;

/// Seconds a client is told to wait before retrying an in-flight duplicate.
pub const IN_FLIGHT_RETRY_AFTER_SECS: u64 = 1;

/// Errors surfaced to clients by the gateway stages and demo handlers.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Body declared as JSON but not parseable.
    #[error("Malformed JSON body: {0}")]
    MalformedBody(String),

    /// Body could not be read from the connection.
    #[error("Request body could not be read")]
    BodyUnreadable,

    /// Declared body length exceeds the configured limit.
    #[error("Request body exceeds {limit} bytes")]
    PayloadTooLarge { limit: usize },

    /// A handler asked for the captured body on a request that has none.
    #[error("Raw request body is not available; send Content-Type: application/json")]
    RawBodyUnavailable,

    /// Idempotency token present but unusable.
    #[error("Invalid idempotency key: {0}")]
    InvalidIdempotencyKey(String),

    /// Missing or unknown credentials.
    #[error("Authentication required")]
    Unauthorized,

    /// Another request with the same key is still executing.
    #[error("A request with this idempotency key is already in progress")]
    DuplicateInFlight,

    /// Waited too long for the original request with the same key.
    #[error("Timed out waiting for the in-progress request with this idempotency key")]
    InFlightTimeout,

    /// Webhook payload signature did not verify.
    #[error("Webhook signature verification failed: {0}")]
    Signature(#[from] SignatureError),

    /// No signing secret configured.
    #[error("Webhook secret not configured")]
    WebhookSecretMissing,

    /// Semantically invalid input.
    #[error("{0}")]
    Validation(String),

    /// Resource does not exist or is not visible to the caller.
    #[error("{0} not found")]
    NotFound(String),

    /// Handler succeeded but its response was too large to snapshot.
    #[error("Request was processed but its response is too large to replay")]
    ResponseNotBuffered,
}

impl ApiError {
    /// HTTP status for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::MalformedBody(_)
            | ApiError::BodyUnreadable
            | ApiError::RawBodyUnavailable
            | ApiError::InvalidIdempotencyKey(_)
            | ApiError::Signature(_) => StatusCode::BAD_REQUEST,
            ApiError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::DuplicateInFlight | ApiError::InFlightTimeout => StatusCode::CONFLICT,
            ApiError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::WebhookSecretMissing | ApiError::ResponseNotBuffered => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::MalformedBody(_) => "malformed_body",
            ApiError::BodyUnreadable => "body_unreadable",
            ApiError::PayloadTooLarge { .. } => "payload_too_large",
            ApiError::RawBodyUnavailable => "raw_body_unavailable",
            ApiError::InvalidIdempotencyKey(_) => "invalid_idempotency_key",
            ApiError::Unauthorized => "unauthorized",
            ApiError::DuplicateInFlight => "duplicate_in_flight",
            ApiError::InFlightTimeout => "in_flight_timeout",
            ApiError::Signature(_) => "invalid_signature",
            ApiError::WebhookSecretMissing => "webhook_secret_missing",
            ApiError::Validation(_) => "validation_failed",
            ApiError::NotFound(_) => "not_found",
            ApiError::ResponseNotBuffered => "response_not_buffered",
        }
    }
}

#[derive(Serialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Serialize)]
struct ErrorBody {
    code: &'static str,
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let envelope = ErrorEnvelope {
            error: ErrorBody {
                code: self.code(),
                message: self.to_string(),
            },
        };
        let mut response = (status, Json(envelope)).into_response();
        if matches!(self, ApiError::DuplicateInFlight) {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(IN_FLIGHT_RETRY_AFTER_SECS));
        }
        if matches!(self, ApiError::Unauthorized) {
            response
                .headers_mut()
                .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        }
        response
    }
}

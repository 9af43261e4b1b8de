//! Stored responses and their expiry.

use axum::{
    body::{Body, Bytes},
    http::{HeaderMap, HeaderName, HeaderValue, StatusCode},
    response::Response,
};
use std::time::Duration;
use tokio::time::Instant;

/// Marks a response served from the idempotency store.
pub const IDEMPOTENT_REPLAYED: HeaderName = HeaderName::from_static("idempotent-replayed");

/// Snapshot of a handler response, replayable any number of times.
#[derive(Debug, Clone)]
pub struct StoredResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl StoredResponse {
    pub fn new(status: StatusCode, headers: HeaderMap, body: Bytes) -> Self {
        Self {
            status,
            headers,
            body,
        }
    }

    /// Rebuild the original response, tagged as a replay.
    pub fn into_replay_response(self) -> Response {
        let mut response = Response::new(Body::from(self.body));
        *response.status_mut() = self.status;
        *response.headers_mut() = self.headers;
        response
            .headers_mut()
            .insert(IDEMPOTENT_REPLAYED, HeaderValue::from_static("true"));
        response
    }
}

/// A stored response and the instant it was written.
#[derive(Debug, Clone)]
pub struct IdempotencyRecord {
    pub response: StoredResponse,
    pub created_at: Instant,
}

impl IdempotencyRecord {
    pub fn new(response: StoredResponse, created_at: Instant) -> Self {
        Self {
            response,
            created_at,
        }
    }

    /// Instant after which the record is no longer replayable.
    pub fn expires_at(&self, retention: Duration) -> Instant {
        self.created_at + retention
    }

    /// Expiry is fixed at write time; reads never extend it.
    pub fn is_expired(&self, now: Instant, retention: Duration) -> bool {
        now >= self.expires_at(retention)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::header;

    #[tokio::test(start_paused = true)]
    async fn test_expiry_window() {
        let record = IdempotencyRecord::new(
            StoredResponse::new(StatusCode::CREATED, HeaderMap::new(), Bytes::from_static(b"{}")),
            Instant::now(),
        );
        let retention = Duration::from_secs(60);

        assert!(!record.is_expired(Instant::now(), retention));
        tokio::time::advance(Duration::from_secs(59)).await;
        assert!(!record.is_expired(Instant::now(), retention));
        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(record.is_expired(Instant::now(), retention));
    }

    #[tokio::test]
    async fn test_replay_response() {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let stored = StoredResponse::new(
            StatusCode::CREATED,
            headers,
            Bytes::from_static(br#"{"id":"pay_1"}"#),
        );

        let response = stored.into_replay_response();
        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "application/json");
        assert_eq!(response.headers()[IDEMPOTENT_REPLAYED], "true");

        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], br#"{"id":"pay_1"}"#);
    }
}

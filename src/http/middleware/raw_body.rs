//! Raw body capture.
//!
//! For JSON requests, buffers the body once and exposes both the exact bytes
//! (`RawBody`, for signature checks) and the decoded value (`JsonBody`).
//! The buffered bytes are put back as the request body, so `Json<T>`
//! extractors downstream keep working.

use axum::{
    body::{Body, Bytes},
    extract::{FromRequestParts, State},
    http::{header, request::Parts, HeaderMap, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::http::request::RequestIdExt;
use crate::http::response::ApiError;
use crate::observability::metrics;

/// Exact bytes of a JSON request body, as received.
#[derive(Debug, Clone)]
pub struct RawBody(pub Bytes);

/// Decoded JSON request body.
#[derive(Debug, Clone)]
pub struct JsonBody(pub serde_json::Value);

/// Settings for the capture stage.
#[derive(Debug, Clone, Copy)]
pub struct RawBodyState {
    pub max_bytes: usize,
}

/// True for `application/json` and `application/*+json`, ignoring parameters.
pub fn is_json_content_type(headers: &HeaderMap) -> bool {
    let Some(value) = headers.get(header::CONTENT_TYPE).and_then(|v| v.to_str().ok()) else {
        return false;
    };
    let essence = value.split(';').next().unwrap_or("").trim().to_ascii_lowercase();
    match essence.split_once('/') {
        Some(("application", subtype)) => subtype == "json" || subtype.ends_with("+json"),
        _ => false,
    }
}

fn declared_length(headers: &HeaderMap) -> Option<usize> {
    headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
}

pub async fn raw_body_middleware(
    State(state): State<RawBodyState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if !is_json_content_type(request.headers()) {
        return next.run(request).await;
    }
    let request_id = request.request_id().to_string();

    if declared_length(request.headers()).is_some_and(|len| len > state.max_bytes) {
        tracing::warn!(request_id = %request_id, limit = state.max_bytes, "Declared body too large");
        metrics::record_body_rejected("too_large");
        return ApiError::PayloadTooLarge { limit: state.max_bytes }.into_response();
    }

    let (mut parts, body) = request.into_parts();
    let bytes = match axum::body::to_bytes(body, state.max_bytes).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!(request_id = %request_id, error = %e, "Failed to read request body");
            metrics::record_body_rejected("unreadable");
            return ApiError::BodyUnreadable.into_response();
        }
    };

    let raw = RawBody(bytes.clone());
    parts.extensions.insert(raw.clone());

    let decoded = if bytes.is_empty() {
        Err("body is empty".to_string())
    } else {
        serde_json::from_slice::<serde_json::Value>(&bytes).map_err(|e| e.to_string())
    };

    match decoded {
        Ok(value) => {
            parts.extensions.insert(JsonBody(value));
            let request = Request::from_parts(parts, Body::from(bytes));
            next.run(request).await
        }
        Err(reason) => {
            tracing::debug!(request_id = %request_id, reason = %reason, "Malformed JSON body");
            metrics::record_body_rejected("malformed");
            let mut response = ApiError::MalformedBody(reason).into_response();
            // Failure-path consumers (outer layers) can still inspect the bytes.
            response.extensions_mut().insert(raw);
            response
        }
    }
}

impl<S> FromRequestParts<S> for RawBody
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<RawBody>()
            .cloned()
            .ok_or(ApiError::RawBodyUnavailable)
    }
}

impl<S> FromRequestParts<S> for JsonBody
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<JsonBody>()
            .cloned()
            .ok_or(ApiError::RawBodyUnavailable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::StatusCode, middleware, routing::post, Json, Router};
    use tower::ServiceExt;

    fn app(max_bytes: usize) -> Router {
        async fn echo(RawBody(raw): RawBody, JsonBody(value): JsonBody) -> Json<serde_json::Value> {
            Json(serde_json::json!({
                "raw": String::from_utf8_lossy(&raw),
                "parsed": value,
            }))
        }
        async fn typed(Json(value): Json<serde_json::Value>) -> Json<serde_json::Value> {
            Json(value)
        }
        async fn plain(body: String) -> String {
            body
        }

        Router::new()
            .route("/echo", post(echo))
            .route("/typed", post(typed))
            .route("/plain", post(plain))
            .layer(middleware::from_fn_with_state(
                RawBodyState { max_bytes },
                raw_body_middleware,
            ))
    }

    fn json_request(uri: &str, body: &'static str) -> Request<Body> {
        Request::post(uri)
            .header(header::CONTENT_TYPE, "application/json; charset=utf-8")
            .body(Body::from(body))
            .unwrap()
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn test_content_type_detection() {
        let mut headers = HeaderMap::new();
        assert!(!is_json_content_type(&headers));
        for (value, expected) in [
            ("application/json", true),
            ("Application/JSON; charset=utf-8", true),
            ("application/vnd.api+json", true),
            ("text/plain", false),
            ("application/jsonp", false),
        ] {
            headers.insert(header::CONTENT_TYPE, value.parse().unwrap());
            assert_eq!(is_json_content_type(&headers), expected, "{}", value);
        }
    }

    #[tokio::test]
    async fn test_raw_bytes_preserved_exactly() {
        let body = "{ \"amount\" :100,\n \"currency\": \"nok\" }";
        let response = app(1024).oneshot(json_request("/echo", body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let json = body_json(response).await;
        assert_eq!(json["raw"], body);
        assert_eq!(json["parsed"]["amount"], 100);
    }

    #[tokio::test]
    async fn test_downstream_json_extractor_still_works() {
        let response = app(1024)
            .oneshot(json_request("/typed", r#"{"a":[1,2]}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["a"][1], 2);
    }

    #[tokio::test]
    async fn test_malformed_json_rejected_with_raw_attached() {
        let response = app(1024)
            .oneshot(json_request("/echo", r#"{"amount": "#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let raw = response.extensions().get::<RawBody>().cloned().unwrap();
        assert_eq!(&raw.0[..], br#"{"amount": "#);
        assert_eq!(body_json(response).await["error"]["code"], "malformed_body");
    }

    #[tokio::test]
    async fn test_empty_json_body_is_malformed() {
        let response = app(1024).oneshot(json_request("/echo", "")).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_too_large() {
        let body = r#"{"amount":100000}"#;
        let request = Request::post("/echo")
            .header(header::CONTENT_TYPE, "application/json")
            .header(header::CONTENT_LENGTH, body.len())
            .body(Body::from(body))
            .unwrap();
        let response = app(8).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);

        // Without a declared length the overflow surfaces while reading.
        let response = app(8).oneshot(json_request("/echo", body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["error"]["code"], "body_unreadable");
    }

    #[tokio::test]
    async fn test_non_json_passes_through() {
        let request = Request::post("/plain")
            .header(header::CONTENT_TYPE, "text/plain")
            .body(Body::from("not { json"))
            .unwrap();
        let response = app(1024).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let request = Request::post("/echo")
            .header(header::CONTENT_TYPE, "text/plain")
            .body(Body::from("{}"))
            .unwrap();
        let response = app(1024).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["error"]["code"], "raw_body_unavailable");
    }
}

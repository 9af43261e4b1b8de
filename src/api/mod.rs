//! Business endpoints served behind the pipeline.
//!
//! These stand in for the academy's domain handlers: a payments ledger to
//! exercise idempotent creation, and the provider webhook that needs the
//! raw body.

pub mod payments;
pub mod webhooks;

use axum::{
    http::HeaderName,
    routing::{get, post},
    Json, Router,
};
use std::sync::Arc;
use std::time::Duration;

use crate::config::WebhookConfig;
use crate::webhooks::{SignatureVerifier, WebhookLog};

pub use payments::{Ledger, Payment};

/// Webhook verification state.
#[derive(Debug)]
pub struct WebhookState {
    /// `None` when no secret is configured; deliveries are then refused.
    pub verifier: Option<SignatureVerifier>,
    pub signature_header: HeaderName,
    pub log: WebhookLog,
}

impl WebhookState {
    pub fn from_config(config: &WebhookConfig) -> Result<Self, axum::http::header::InvalidHeaderName> {
        let verifier = (!config.secret.is_empty()).then(|| {
            SignatureVerifier::new(
                config.secret.as_bytes().to_vec(),
                Duration::from_secs(config.tolerance_secs),
            )
        });
        Ok(Self {
            verifier,
            signature_header: HeaderName::from_bytes(config.signature_header.as_bytes())?,
            log: WebhookLog::new(),
        })
    }
}

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub ledger: Arc<Ledger>,
    pub webhooks: Arc<WebhookState>,
}

/// Routes served by the gateway.
pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route(
            "/api/v1/payments",
            post(payments::create_payment).get(payments::list_payments),
        )
        .route("/api/v1/payments/{id}", get(payments::get_payment))
        .route("/api/v1/webhooks/stripe", post(webhooks::provider_webhook))
        .with_state(state)
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

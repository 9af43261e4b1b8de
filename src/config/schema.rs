//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener configuration (bind address, concurrency).
    pub listener: ListenerConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Request body capture settings.
    pub body: BodyConfig,

    /// Bearer key to principal mapping.
    pub auth: AuthConfig,

    /// Idempotency guard settings.
    pub idempotency: IdempotencyConfig,

    /// Payment-provider webhook verification.
    pub webhooks: WebhookConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Maximum concurrently processed requests (backpressure).
    pub max_connections: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            max_connections: 10_000,
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 30 }
    }
}

/// Raw body capture configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BodyConfig {
    /// Maximum JSON body size in bytes.
    pub max_bytes: usize,
}

impl Default for BodyConfig {
    fn default() -> Self {
        Self {
            max_bytes: 1024 * 1024, // 1MB
        }
    }
}

/// Authentication configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AuthConfig {
    /// Accepted bearer keys and the principal each one resolves to.
    pub api_keys: Vec<ApiKeyConfig>,
}

/// A single bearer key.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiKeyConfig {
    /// The secret presented as `Authorization: Bearer <key>`.
    pub key: String,

    /// Stable identifier of the caller owning the key.
    pub principal: String,
}

/// What a duplicate request does while the original is still executing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum InFlightPolicy {
    /// Block until the original finishes, then replay its outcome.
    #[default]
    Wait,
    /// Answer 409 Conflict immediately.
    Reject,
}

/// Idempotency guard configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct IdempotencyConfig {
    /// Enable the guard.
    pub enabled: bool,

    /// Request header carrying the client token.
    pub header: String,

    /// How long a stored response stays replayable, in seconds.
    pub retention_secs: u64,

    /// Interval of the expiry sweep, in seconds.
    pub sweep_interval_secs: u64,

    /// Methods covered when no route override matches.
    pub methods: Vec<String>,

    /// Per-route method overrides (longest prefix wins).
    pub routes: Vec<IdempotencyRouteConfig>,

    /// Behavior for duplicates of an in-flight request.
    pub in_flight: InFlightPolicy,

    /// Upper bound on waiting for an in-flight original, in seconds.
    pub in_flight_wait_secs: u64,

    /// Maximum accepted token length.
    pub max_key_length: usize,

    /// Maximum response body size that can be snapshotted.
    pub max_response_bytes: usize,
}

impl Default for IdempotencyConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            header: "Idempotency-Key".to_string(),
            retention_secs: 24 * 60 * 60,
            sweep_interval_secs: 60,
            methods: vec!["POST".to_string()],
            routes: Vec::new(),
            in_flight: InFlightPolicy::Wait,
            in_flight_wait_secs: 25,
            max_key_length: 255,
            max_response_bytes: 1024 * 1024,
        }
    }
}

/// Method override for a path prefix.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct IdempotencyRouteConfig {
    /// Path prefix, matched on segment boundaries.
    pub path_prefix: String,

    /// Methods covered under this prefix. Empty disables the guard there.
    #[serde(default)]
    pub methods: Vec<String>,
}

/// Webhook signature configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct WebhookConfig {
    /// Shared signing secret. Usually supplied via `GATEWAY_WEBHOOK_SECRET`.
    pub secret: String,

    /// Header carrying the signature.
    pub signature_header: String,

    /// Accepted clock skew between signing and receipt, in seconds.
    pub tolerance_secs: u64,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            secret: String::new(),
            signature_header: "Stripe-Signature".to_string(),
            tolerance_secs: 300,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, addresses parse)
//! - Check that idempotency methods are real, non-safe HTTP methods
//! - Detect duplicate bearer keys
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatewayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use std::net::SocketAddr;

use axum::http::{HeaderName, Method};

use crate::config::schema::{GatewayConfig, InFlightPolicy};

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path of the offending field.
    pub field: String,
    /// What is wrong with it.
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Parse a configured method name, rejecting methods that never mutate state.
pub fn parse_mutating_method(raw: &str) -> Result<Method, String> {
    let method = Method::from_bytes(raw.trim().to_ascii_uppercase().as_bytes())
        .map_err(|_| format!("'{}' is not a valid HTTP method", raw))?;
    if method.is_safe() {
        return Err(format!("'{}' is a safe method and cannot be guarded", method));
    }
    Ok(method)
}

/// Validate a parsed configuration.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("'{}' is not a socket address", config.listener.bind_address),
        ));
    }
    if config.listener.max_connections == 0 {
        errors.push(ValidationError::new("listener.max_connections", "must be > 0"));
    }
    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::new("timeouts.request_secs", "must be > 0"));
    }
    if config.body.max_bytes == 0 {
        errors.push(ValidationError::new("body.max_bytes", "must be > 0"));
    }

    let mut seen_keys = HashSet::new();
    for (i, key) in config.auth.api_keys.iter().enumerate() {
        if key.key.is_empty() {
            errors.push(ValidationError::new(format!("auth.api_keys[{}].key", i), "must not be empty"));
        } else if !seen_keys.insert(key.key.as_str()) {
            errors.push(ValidationError::new(format!("auth.api_keys[{}].key", i), "duplicate key"));
        }
        if key.principal.trim().is_empty() {
            errors.push(ValidationError::new(
                format!("auth.api_keys[{}].principal", i),
                "must not be empty",
            ));
        }
    }

    let idem = &config.idempotency;
    if HeaderName::from_bytes(idem.header.as_bytes()).is_err() {
        errors.push(ValidationError::new(
            "idempotency.header",
            format!("'{}' is not a valid header name", idem.header),
        ));
    }
    if idem.retention_secs == 0 {
        errors.push(ValidationError::new("idempotency.retention_secs", "must be > 0"));
    }
    if idem.sweep_interval_secs == 0 {
        errors.push(ValidationError::new("idempotency.sweep_interval_secs", "must be > 0"));
    }
    if idem.in_flight == InFlightPolicy::Wait {
        if idem.in_flight_wait_secs == 0 {
            errors.push(ValidationError::new(
                "idempotency.in_flight_wait_secs",
                "must be > 0 when in_flight = \"wait\"",
            ));
        } else if idem.in_flight_wait_secs >= config.timeouts.request_secs {
            // The request timeout runs first and would always win.
            errors.push(ValidationError::new(
                "idempotency.in_flight_wait_secs",
                format!(
                    "must be < timeouts.request_secs ({})",
                    config.timeouts.request_secs
                ),
            ));
        }
    }
    if idem.max_key_length == 0 {
        errors.push(ValidationError::new("idempotency.max_key_length", "must be > 0"));
    }
    if idem.max_response_bytes == 0 {
        errors.push(ValidationError::new("idempotency.max_response_bytes", "must be > 0"));
    }
    for (i, method) in idem.methods.iter().enumerate() {
        if let Err(message) = parse_mutating_method(method) {
            errors.push(ValidationError::new(format!("idempotency.methods[{}]", i), message));
        }
    }
    for (i, route) in idem.routes.iter().enumerate() {
        if !route.path_prefix.starts_with('/') {
            errors.push(ValidationError::new(
                format!("idempotency.routes[{}].path_prefix", i),
                "must start with '/'",
            ));
        }
        for (j, method) in route.methods.iter().enumerate() {
            if let Err(message) = parse_mutating_method(method) {
                errors.push(ValidationError::new(
                    format!("idempotency.routes[{}].methods[{}]", i, j),
                    message,
                ));
            }
        }
    }

    if HeaderName::from_bytes(config.webhooks.signature_header.as_bytes()).is_err() {
        errors.push(ValidationError::new(
            "webhooks.signature_header",
            format!("'{}' is not a valid header name", config.webhooks.signature_header),
        ));
    }
    if config.webhooks.tolerance_secs == 0 {
        errors.push(ValidationError::new("webhooks.tolerance_secs", "must be > 0"));
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("'{}' is not a socket address", config.observability.metrics_address),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::{ApiKeyConfig, IdempotencyRouteConfig};

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&GatewayConfig::default()).is_ok());
    }

    #[test]
    fn test_collects_all_errors() {
        let mut config = GatewayConfig::default();
        config.listener.bind_address = "nope".into();
        config.idempotency.retention_secs = 0;
        config.idempotency.methods = vec!["GET".into(), "POST".into()];

        let errors = validate_config(&config).unwrap_err();
        let fields: Vec<_> = errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(
            fields,
            vec!["listener.bind_address", "idempotency.retention_secs", "idempotency.methods[0]"]
        );
    }

    #[test]
    fn test_route_and_key_checks() {
        let mut config = GatewayConfig::default();
        config.idempotency.routes.push(IdempotencyRouteConfig {
            path_prefix: "payments".into(),
            methods: vec!["patch".into(), "HEAD".into()],
        });
        for _ in 0..2 {
            config.auth.api_keys.push(ApiKeyConfig {
                key: "same".into(),
                principal: "user_1".into(),
            });
        }

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 3);
        assert!(errors.iter().any(|e| e.field == "idempotency.routes[0].path_prefix"));
        assert!(errors.iter().any(|e| e.field == "idempotency.routes[0].methods[1]"));
        assert!(errors.iter().any(|e| e.message == "duplicate key"));
    }

    #[test]
    fn test_in_flight_wait_below_request_timeout() {
        let mut config = GatewayConfig::default();
        config.idempotency.in_flight_wait_secs = config.timeouts.request_secs;

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "idempotency.in_flight_wait_secs");

        config.idempotency.in_flight = InFlightPolicy::Reject;
        assert!(validate_config(&config).is_ok());

        config.idempotency.in_flight = InFlightPolicy::Wait;
        config.idempotency.in_flight_wait_secs = config.timeouts.request_secs - 1;
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_parse_mutating_method() {
        assert_eq!(parse_mutating_method(" put ").unwrap(), Method::PUT);
        assert!(parse_mutating_method("OPTIONS").is_err());
        assert!(parse_mutating_method("bad method").is_err());
    }
}

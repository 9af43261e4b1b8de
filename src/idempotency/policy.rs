//! Which requests the guard covers.
//!
//! # Design Decisions
//! - Default method set applies everywhere unless a route prefix overrides it
//! - Longest matching prefix wins
//! - Prefixes match on path-segment boundaries (`/pay` does not cover `/payments`)

use axum::http::Method;

use crate::config::schema::IdempotencyConfig;
use crate::config::validation::parse_mutating_method;

#[derive(Debug, Clone)]
struct RoutePolicy {
    prefix: String,
    methods: Vec<Method>,
}

/// Resolves whether a method/path pair is guarded.
#[derive(Debug, Clone)]
pub struct IdempotencyPolicy {
    default_methods: Vec<Method>,
    routes: Vec<RoutePolicy>,
}

impl IdempotencyPolicy {
    pub fn new(default_methods: Vec<Method>) -> Self {
        Self {
            default_methods,
            routes: Vec::new(),
        }
    }

    /// Override the covered methods under `prefix`.
    pub fn with_route(mut self, prefix: impl Into<String>, methods: Vec<Method>) -> Self {
        let prefix = prefix.into();
        let prefix = if prefix.len() > 1 {
            prefix.trim_end_matches('/').to_string()
        } else {
            prefix
        };
        self.routes.retain(|r| r.prefix != prefix);
        self.routes.push(RoutePolicy { prefix, methods });
        self.routes.sort_by(|a, b| b.prefix.len().cmp(&a.prefix.len()));
        self
    }

    /// Build from configuration. Invalid methods are skipped; validation reports them.
    pub fn from_config(config: &IdempotencyConfig) -> Self {
        let mut policy = Self::new(parse_methods(&config.methods));
        for route in &config.routes {
            policy = policy.with_route(route.path_prefix.clone(), parse_methods(&route.methods));
        }
        policy
    }

    /// True if requests with this method and path are guarded.
    pub fn applies(&self, method: &Method, path: &str) -> bool {
        let methods = self
            .routes
            .iter()
            .find(|r| prefix_matches(&r.prefix, path))
            .map(|r| &r.methods)
            .unwrap_or(&self.default_methods);
        methods.contains(method)
    }
}

impl Default for IdempotencyPolicy {
    fn default() -> Self {
        Self::new(vec![Method::POST])
    }
}

fn parse_methods(raw: &[String]) -> Vec<Method> {
    raw.iter()
        .filter_map(|m| match parse_mutating_method(m) {
            Ok(method) => Some(method),
            Err(reason) => {
                tracing::warn!(method = %m, reason = %reason, "Ignoring idempotency method");
                None
            }
        })
        .collect()
}

fn prefix_matches(prefix: &str, path: &str) -> bool {
    if prefix == "/" {
        return true;
    }
    match path.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::IdempotencyRouteConfig;

    #[test]
    fn test_default_covers_post_only() {
        let policy = IdempotencyPolicy::default();
        assert!(policy.applies(&Method::POST, "/api/v1/payments"));
        assert!(!policy.applies(&Method::PUT, "/api/v1/payments"));
        assert!(!policy.applies(&Method::GET, "/api/v1/payments"));
    }

    #[test]
    fn test_longest_prefix_wins() {
        let policy = IdempotencyPolicy::new(vec![Method::POST])
            .with_route("/api", vec![Method::POST, Method::PUT])
            .with_route("/api/v1/payments/", vec![Method::POST, Method::PATCH, Method::DELETE])
            .with_route("/api/v1/webhooks", vec![]);

        assert!(policy.applies(&Method::PUT, "/api/v1/sessions"));
        assert!(!policy.applies(&Method::PATCH, "/api/v1/sessions"));
        assert!(policy.applies(&Method::PATCH, "/api/v1/payments/pay_1"));
        assert!(policy.applies(&Method::DELETE, "/api/v1/payments"));
        assert!(!policy.applies(&Method::PUT, "/api/v1/payments"));
        assert!(!policy.applies(&Method::POST, "/api/v1/webhooks/stripe"));
        assert!(policy.applies(&Method::POST, "/other"));
    }

    #[test]
    fn test_segment_boundaries() {
        assert!(prefix_matches("/pay", "/pay"));
        assert!(prefix_matches("/pay", "/pay/1"));
        assert!(!prefix_matches("/pay", "/payments"));
        assert!(prefix_matches("/", "/anything"));
    }

    #[test]
    fn test_from_config() {
        let mut config = IdempotencyConfig::default();
        config.methods = vec!["post".into(), "GET".into()];
        config.routes.push(IdempotencyRouteConfig {
            path_prefix: "/api/v1/bookings".into(),
            methods: vec!["PUT".into()],
        });

        let policy = IdempotencyPolicy::from_config(&config);
        assert!(policy.applies(&Method::POST, "/api/v1/payments"));
        assert!(!policy.applies(&Method::GET, "/api/v1/payments"));
        assert!(policy.applies(&Method::PUT, "/api/v1/bookings/7"));
        assert!(!policy.applies(&Method::POST, "/api/v1/bookings"));
    }
}

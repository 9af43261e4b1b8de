//! Caller identification.
//! Resolves `Authorization: Bearer <key>` to a `Principal`.

use axum::{
    body::Body,
    extract::{FromRequestParts, State},
    http::{header, request::Parts, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::collections::HashMap;
use std::sync::Arc;

use crate::config::schema::AuthConfig;
use crate::http::request::RequestIdExt;
use crate::http::response::ApiError;

/// Authenticated caller attached to the request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Principal {
    pub id: String,
}

/// Known bearer keys.
#[derive(Clone, Debug, Default)]
pub struct AuthState {
    keys: Arc<HashMap<String, String>>,
}

impl AuthState {
    pub fn from_config(config: &AuthConfig) -> Self {
        let keys = config
            .api_keys
            .iter()
            .map(|k| (k.key.clone(), k.principal.clone()))
            .collect();
        Self {
            keys: Arc::new(keys),
        }
    }

    fn resolve(&self, key: &str) -> Option<Principal> {
        self.keys.get(key).map(|id| Principal { id: id.clone() })
    }
}

/// Attach a `Principal` for valid keys; reject unknown keys; let anonymous requests through.
pub async fn auth_middleware(
    State(state): State<AuthState>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    let Some(value) = req.headers().get(header::AUTHORIZATION) else {
        return next.run(req).await;
    };

    let key = value
        .to_str()
        .ok()
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim);

    match key.and_then(|k| state.resolve(k)) {
        Some(principal) => {
            tracing::debug!(request_id = %req.request_id(), principal = %principal.id, "Authenticated");
            req.extensions_mut().insert(principal);
            next.run(req).await
        }
        None => {
            tracing::warn!(request_id = %req.request_id(), "Rejected unknown credentials");
            ApiError::Unauthorized.into_response()
        }
    }
}

impl<S> FromRequestParts<S> for Principal
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Principal>()
            .cloned()
            .ok_or(ApiError::Unauthorized)
    }
}

//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum Router with the API handlers
//! - Wire up the request pipeline (request ID, tracing, timeout, limits)
//! - Own the shared idempotency store
//! - Bind server to listener and shut down gracefully

use axum::{http::header::InvalidHeaderName, middleware, Router};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::api::{self, AppState, Ledger, WebhookState};
use crate::config::GatewayConfig;
use crate::http::middleware::{
    auth_middleware, idempotency_middleware, raw_body_middleware, track_requests, AuthState,
    IdempotencyState, RawBodyState,
};
use crate::http::request::{propagate_request_id_layer, request_id_layer};
use crate::idempotency::{IdempotencyStore, MemoryIdempotencyStore};

/// HTTP server for the academy API.
pub struct HttpServer {
    router: Router,
    config: GatewayConfig,
    store: Arc<dyn IdempotencyStore>,
    state: AppState,
}

impl HttpServer {
    /// Create a new HTTP server backed by an in-memory idempotency store.
    pub fn new(config: GatewayConfig) -> Result<Self, InvalidHeaderName> {
        let store = Arc::new(MemoryIdempotencyStore::new(Duration::from_secs(
            config.idempotency.retention_secs,
        )));
        Self::with_store(config, store)
    }

    /// Create a server around an existing store.
    pub fn with_store(
        config: GatewayConfig,
        store: Arc<dyn IdempotencyStore>,
    ) -> Result<Self, InvalidHeaderName> {
        let state = AppState {
            ledger: Arc::new(Ledger::new()),
            webhooks: Arc::new(WebhookState::from_config(&config.webhooks)?),
        };
        let idempotency = IdempotencyState::from_config(&config.idempotency, store.clone())?;

        let router = Self::build_router(&config, state.clone(), idempotency);
        Ok(Self {
            router,
            config,
            store,
            state,
        })
    }

    /// Build the Axum router with all middleware layers.
    ///
    /// Layers listed last run first: request ID → trace → timeout →
    /// concurrency limit → metrics → raw body → auth → idempotency → handler.
    #[allow(deprecated)]
    fn build_router(config: &GatewayConfig, state: AppState, idempotency: IdempotencyState) -> Router {
        let mut router = api::routes(state);

        if config.idempotency.enabled {
            router = router.layer(middleware::from_fn_with_state(
                idempotency,
                idempotency_middleware,
            ));
        } else {
            tracing::warn!("Idempotency guard disabled");
        }

        router
            .layer(middleware::from_fn_with_state(
                AuthState::from_config(&config.auth),
                auth_middleware,
            ))
            .layer(middleware::from_fn_with_state(
                RawBodyState {
                    max_bytes: config.body.max_bytes,
                },
                raw_body_middleware,
            ))
            .layer(middleware::from_fn(track_requests))
            .layer(ConcurrencyLimitLayer::new(config.listener.max_connections))
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
            .layer(propagate_request_id_layer())
            .layer(TraceLayer::new_for_http())
            .layer(request_id_layer())
    }

    /// Run the server until the shutdown channel fires.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("HTTP server draining connections");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// The fully layered router, for in-process tests.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// The idempotency store shared by every request.
    pub fn store(&self) -> Arc<dyn IdempotencyStore> {
        self.store.clone()
    }

    /// Handler state (ledger, webhook log).
    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }
}

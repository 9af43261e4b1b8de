//! Shared utilities for integration tests.

use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;

use academy_gateway::api::AppState;
use academy_gateway::config::ApiKeyConfig;
use academy_gateway::idempotency::IdempotencyStore;
use academy_gateway::webhooks::SignatureVerifier;
use academy_gateway::{GatewayConfig, HttpServer, Shutdown};

pub const WEBHOOK_SECRET: &str = "whsec_integration";

/// A gateway running on an ephemeral port.
#[allow(dead_code)]
pub struct TestGateway {
    pub addr: SocketAddr,
    pub state: AppState,
    pub store: Arc<dyn IdempotencyStore>,
    pub shutdown: Shutdown,
}

#[allow(dead_code)]
impl TestGateway {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub fn verifier(&self) -> SignatureVerifier {
        SignatureVerifier::new(WEBHOOK_SECRET.as_bytes().to_vec(), std::time::Duration::from_secs(300))
    }
}

/// Config with two known callers and a webhook secret.
pub fn test_config() -> GatewayConfig {
    let mut config = GatewayConfig::default();
    config.listener.bind_address = "127.0.0.1:0".into();
    config.auth.api_keys = vec![
        ApiKeyConfig {
            key: "key_42".into(),
            principal: "user_42".into(),
        },
        ApiKeyConfig {
            key: "key_7".into(),
            principal: "user_7".into(),
        },
    ];
    config.webhooks.secret = WEBHOOK_SECRET.into();
    config
}

/// Start a gateway with `config` and return once it is accepting connections.
pub async fn start_gateway(config: GatewayConfig) -> TestGateway {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let server = HttpServer::new(config).unwrap();
    let state = server.state().clone();
    let store = server.store();
    let shutdown = Shutdown::new();
    let rx = shutdown.subscribe();

    tokio::spawn(async move {
        let _ = server.run(listener, rx).await;
    });

    TestGateway {
        addr,
        state,
        store,
        shutdown,
    }
}

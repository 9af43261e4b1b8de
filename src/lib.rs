//! Academy API gateway library.
//!
//! Request pipeline for the golf-academy API: raw body capture for signed
//! webhooks and an idempotency guard that replays stored responses for
//! retried mutating requests.

pub mod api;
pub mod config;
pub mod http;
pub mod idempotency;
pub mod lifecycle;
pub mod observability;
pub mod webhooks;

pub use config::schema::GatewayConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;

//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, layer stack)
//!     → request.rs (request ID assigned and echoed)
//!     → middleware/ (metrics, raw body, auth, idempotency)
//!     → api handlers
//!     → response.rs (error envelope)
//! ```

pub mod middleware;
pub mod request;
pub mod response;
pub mod server;

pub use request::{RequestIdExt, RequestIdLayer, X_REQUEST_ID};
pub use response::ApiError;
pub use server::HttpServer;

//! Request pipeline stages.
//!
//! # Order
//! ```text
//! metrics.rs      (outermost: sees every final status)
//!     → raw_body.rs   (capture bytes, decode JSON)
//!     → auth.rs       (attach Principal)
//!     → idempotency.rs (replay / lease / snapshot)
//!     → handler
//! ```
//!
//! # Design Decisions
//! - Each stage is an axum `from_fn_with_state` middleware with explicit state
//! - Stages never rewrite handler responses, only short-circuit before them

pub mod auth;
pub mod idempotency;
pub mod metrics;
pub mod raw_body;

pub use auth::{auth_middleware, AuthState, Principal};
pub use idempotency::{idempotency_middleware, IdempotencyState};
pub use metrics::track_requests;
pub use raw_body::{raw_body_middleware, JsonBody, RawBody, RawBodyState};

//! Payment-provider webhooks.
//!
//! # Data Flow
//! ```text
//! raw body (captured before parsing)
//!     → signature.rs (HMAC-SHA256 over "<t>.<bytes>", constant-time compare)
//!     → events.rs (decode envelope, classify, record by event id)
//! ```
//!
//! # Security Constraints
//! - Signing secret only from config or `GATEWAY_WEBHOOK_SECRET`
//! - Never log the secret or the signature
//! - Verification uses the exact received bytes

pub mod events;
pub mod signature;

pub use events::{WebhookEvent, WebhookEventKind, WebhookLog};
pub use signature::{SignatureError, SignatureVerifier};

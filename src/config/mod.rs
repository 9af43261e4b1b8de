//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize, env overrides)
//!     → validation.rs (semantic checks)
//!     → GatewayConfig (validated, immutable)
//!     → cloned into the subsystems that need it at startup
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require a restart
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks
//! - Secrets may come from the environment instead of the file

pub mod loader;
pub mod schema;
pub mod validation;

pub use schema::ApiKeyConfig;
pub use schema::GatewayConfig;
pub use schema::IdempotencyConfig;
pub use schema::IdempotencyRouteConfig;
pub use schema::InFlightPolicy;
pub use schema::ObservabilityConfig;
pub use schema::WebhookConfig;

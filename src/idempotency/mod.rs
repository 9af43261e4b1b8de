//! Idempotency subsystem.
//!
//! # Data Flow
//! ```text
//! guarded request (method covered, token present, principal known)
//!     → key.rs (validate token, build composite key)
//!     → store.rs reserve()
//!         Replay   → stored response returned, handler skipped
//!         InFlight → wait for the owner or answer 409
//!         Acquired → handler runs
//!             2xx      → complete() stores the snapshot (record.rs)
//!             non-2xx  → release() leaves nothing behind
//!
//! sweeper.rs: periodic purge of expired records
//! policy.rs:  per-route method coverage
//! ```
//!
//! # Design Decisions
//! - Store is an injected trait object, owned by the server and shared via Arc
//! - Per-key leases make check-then-act atomic under concurrent duplicates
//! - Expiry is fixed at write time; replays never extend it

pub mod key;
pub mod policy;
pub mod record;
pub mod store;
pub mod sweeper;

pub use key::{CompositeKey, IdempotencyToken, TokenError};
pub use policy::IdempotencyPolicy;
pub use record::{IdempotencyRecord, StoredResponse, IDEMPOTENT_REPLAYED};
pub use store::{IdempotencyStore, InFlightWaiter, Lease, MemoryIdempotencyStore, Reservation};
pub use sweeper::spawn_sweeper;

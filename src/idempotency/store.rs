//! Idempotency record storage.
//!
//! The store hands out exclusive leases so that, for any composite key, the
//! lookup-miss → run handler → write sequence happens at most once at a time.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;

use crate::idempotency::key::CompositeKey;
use crate::idempotency::record::{IdempotencyRecord, StoredResponse};
use crate::observability::metrics;

/// Outcome of trying to reserve a key.
#[derive(Debug)]
pub enum Reservation {
    /// A live record exists; serve it.
    Replay(StoredResponse),
    /// The caller now owns the key and must `complete` or `release` the lease.
    Acquired(Lease),
    /// Another request owns the key right now.
    InFlight(InFlightWaiter),
}

/// Exclusive right to execute the handler for one key.
///
/// Dropping a lease without completing or releasing it (e.g. the request
/// future was cancelled) closes its completion channel; the placeholder it
/// left behind is then treated as stale and reclaimed.
#[derive(Debug)]
pub struct Lease {
    key: CompositeKey,
    id: u64,
    done: watch::Sender<bool>,
}

impl Lease {
    /// Create a lease and the receiver its placeholder should hold.
    pub fn new(key: CompositeKey, id: u64) -> (Self, watch::Receiver<bool>) {
        let (done, rx) = watch::channel(false);
        (Self { key, id, done }, rx)
    }

    pub fn key(&self) -> &CompositeKey {
        &self.key
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Wake everyone waiting on this lease.
    pub fn signal_completed(self) {
        self.done.send_replace(true);
    }
}

/// Handle for waiting until an in-flight lease finishes.
#[derive(Debug)]
pub struct InFlightWaiter {
    rx: watch::Receiver<bool>,
}

impl InFlightWaiter {
    pub fn new(rx: watch::Receiver<bool>) -> Self {
        Self { rx }
    }

    /// Resolves when the owner completes, releases, or drops its lease.
    pub async fn wait(mut self) {
        // Err means the lease was dropped; either way the caller re-reserves.
        let _ = self.rx.wait_for(|done| *done).await;
    }
}

/// Storage behind the idempotency guard.
///
/// Implementations must make `reserve` atomic per key: two concurrent calls
/// for the same absent key may never both return `Acquired`.
pub trait IdempotencyStore: Send + Sync + 'static {
    /// Look up the key, inserting a pending placeholder if it is free.
    fn reserve(&self, key: &CompositeKey) -> Reservation;

    /// Persist the response produced under `lease` and wake waiters.
    fn complete(&self, lease: Lease, response: StoredResponse);

    /// Drop the placeholder without storing anything and wake waiters.
    fn release(&self, lease: Lease);

    /// A live stored response for `key`, if any.
    fn lookup(&self, key: &CompositeKey) -> Option<StoredResponse>;

    /// Remove expired records and abandoned placeholders. Returns how many were removed.
    fn purge_expired(&self) -> usize;

    /// Number of entries, pending placeholders included.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug)]
enum Slot {
    Pending { lease_id: u64, done: watch::Receiver<bool> },
    Completed(IdempotencyRecord),
}

impl Slot {
    /// True if nobody will ever complete this placeholder.
    fn is_abandoned(&self) -> bool {
        match self {
            Slot::Pending { done, .. } => done.has_changed().is_err(),
            Slot::Completed(_) => false,
        }
    }
}

/// A thread-safe, process-local idempotency store with per-entry expiry.
#[derive(Debug)]
pub struct MemoryIdempotencyStore {
    inner: DashMap<CompositeKey, Slot>,
    retention: Duration,
    next_lease: AtomicU64,
}

impl MemoryIdempotencyStore {
    /// Create an empty store whose records live for `retention`.
    pub fn new(retention: Duration) -> Self {
        Self {
            inner: DashMap::new(),
            retention,
            next_lease: AtomicU64::new(1),
        }
    }

    pub fn retention(&self) -> Duration {
        self.retention
    }

    fn new_lease(&self, key: &CompositeKey) -> (Lease, Slot) {
        let id = self.next_lease.fetch_add(1, Ordering::Relaxed);
        let (lease, done) = Lease::new(key.clone(), id);
        (lease, Slot::Pending { lease_id: id, done })
    }
}

impl IdempotencyStore for MemoryIdempotencyStore {
    fn reserve(&self, key: &CompositeKey) -> Reservation {
        let now = Instant::now();
        // The entry holds the shard write lock, making check-then-insert atomic.
        match self.inner.entry(key.clone()) {
            Entry::Occupied(mut entry) => {
                let reuse = match entry.get() {
                    Slot::Completed(record) if !record.is_expired(now, self.retention) => {
                        return Reservation::Replay(record.response.clone());
                    }
                    Slot::Completed(_) => "expired",
                    slot if slot.is_abandoned() => "abandoned",
                    Slot::Pending { done, .. } => {
                        return Reservation::InFlight(InFlightWaiter::new(done.clone()));
                    }
                };
                tracing::debug!(key = %key, previous = reuse, "Reclaiming idempotency slot");
                let (lease, slot) = self.new_lease(key);
                entry.insert(slot);
                Reservation::Acquired(lease)
            }
            Entry::Vacant(entry) => {
                let (lease, slot) = self.new_lease(key);
                entry.insert(slot);
                Reservation::Acquired(lease)
            }
        }
    }

    fn complete(&self, lease: Lease, response: StoredResponse) {
        if let Some(mut slot) = self.inner.get_mut(&lease.key) {
            if matches!(&*slot, Slot::Pending { lease_id, .. } if *lease_id == lease.id) {
                *slot = Slot::Completed(IdempotencyRecord::new(response, Instant::now()));
            }
        }
        metrics::record_store_size(self.inner.len());
        lease.signal_completed();
    }

    fn release(&self, lease: Lease) {
        self.inner.remove_if(&lease.key, |_, slot| {
            matches!(slot, Slot::Pending { lease_id, .. } if *lease_id == lease.id)
        });
        // Dropping the sender wakes waiters with a closed channel.
        drop(lease);
    }

    fn lookup(&self, key: &CompositeKey) -> Option<StoredResponse> {
        let now = Instant::now();
        self.inner.get(key).and_then(|slot| match &*slot {
            Slot::Completed(record) if !record.is_expired(now, self.retention) => {
                Some(record.response.clone())
            }
            _ => None,
        })
    }

    fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let retention = self.retention;
        let mut removed = 0;
        self.inner.retain(|_, slot| {
            let keep = match slot {
                Slot::Completed(record) => !record.is_expired(now, retention),
                pending => !pending.is_abandoned(),
            };
            if !keep {
                removed += 1;
            }
            keep
        });
        metrics::record_store_size(self.inner.len());
        removed
    }

    fn len(&self) -> usize {
        self.inner.len()
    }
}

//! Periodic removal of expired idempotency records.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::idempotency::store::IdempotencyStore;

/// Spawn a task purging `store` every `interval` until shutdown fires.
pub fn spawn_sweeper(
    store: Arc<dyn IdempotencyStore>,
    interval: Duration,
    mut shutdown: broadcast::Receiver<()>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // First tick completes immediately.
        ticker.tick().await;

        tracing::info!(interval_secs = interval.as_secs(), "Idempotency sweeper started");
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let removed = store.purge_expired();
                    if removed > 0 {
                        tracing::debug!(removed, remaining = store.len(), "Purged idempotency records");
                    }
                }
                _ = shutdown.recv() => {
                    tracing::info!("Idempotency sweeper stopping");
                    break;
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::idempotency::key::{CompositeKey, IdempotencyToken};
    use crate::idempotency::record::StoredResponse;
    use crate::idempotency::store::{MemoryIdempotencyStore, Reservation};
    use crate::lifecycle::Shutdown;
    use axum::body::Bytes;
    use axum::http::{HeaderMap, HeaderValue, StatusCode};

    #[tokio::test(start_paused = true)]
    async fn test_sweeper_purges_and_stops() {
        let store = Arc::new(MemoryIdempotencyStore::new(Duration::from_secs(60)));
        let token = IdempotencyToken::parse(&HeaderValue::from_static("abc"), 255).unwrap();
        let key = CompositeKey::new("user_42", token);
        match store.reserve(&key) {
            Reservation::Acquired(lease) => store.complete(
                lease,
                StoredResponse::new(StatusCode::OK, HeaderMap::new(), Bytes::new()),
            ),
            other => panic!("expected Acquired, got {:?}", other),
        }

        let shutdown = Shutdown::new();
        let handle = spawn_sweeper(store.clone(), Duration::from_secs(10), shutdown.subscribe());

        tokio::time::sleep(Duration::from_secs(55)).await;
        assert_eq!(store.len(), 1);

        tokio::time::sleep(Duration::from_secs(20)).await;
        assert!(store.is_empty());

        shutdown.trigger();
        handle.await.unwrap();
    }
}

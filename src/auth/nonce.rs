//! Single-use nonce tracking for replay attack prevention.
//!
//! Nonces are issued as opaque random strings, embedded in the message the
//! client signs, and recorded as consumed only after the full request
//! validates. The consumed set lives behind [`KeyValueStore`] so replay
//! state can be externalized for multi-node deployments.

use std::sync::Arc;
use std::time::Duration;

use rand::rngs::OsRng;
use rand::RngCore;
use tokio::sync::Notify;
use tracing::debug;

use crate::store::{now_millis, KeyValueStore};

/// Length of issued nonces in random bytes (hex-encoded to twice this).
const NONCE_BYTES: usize = 32;

/// Thread-safe nonce store with TTL-based expiry.
///
/// The TTL is intentionally the same as the signed-message timestamp
/// tolerance: a nonce never outlives the validity window of the message
/// that carries it.
pub struct NonceStore {
    store: Arc<dyn KeyValueStore>,
    ttl: Duration,
}

impl NonceStore {
    /// Create a new nonce store with the given TTL.
    pub fn new(store: Arc<dyn KeyValueStore>, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    /// Issue a fresh cryptographically random nonce.
    pub fn issue(&self) -> String {
        let mut bytes = [0u8; NONCE_BYTES];
        OsRng.fill_bytes(&mut bytes);
        hex::encode(bytes)
    }

    /// Cheap pre-check: has this nonce already been consumed?
    ///
    /// Runs before signature verification so known replays are rejected
    /// without paying for recovery. A `false` here is not a reservation;
    /// the nonce is only committed by [`try_consume`](Self::try_consume)
    /// after the request fully validates.
    pub fn is_spent(&self, nonce: &str) -> bool {
        self.is_spent_at(nonce, now_millis())
    }

    fn is_spent_at(&self, nonce: &str, now_ms: u64) -> bool {
        self.store.contains_at(&Self::key(nonce), now_ms)
    }

    /// Record the nonce as consumed.
    ///
    /// Returns `false` if it was already present (replay), `true` if this
    /// call durably consumed it. Atomic with respect to concurrent calls
    /// for the same value. Never panics.
    pub fn try_consume(&self, nonce: &str) -> bool {
        self.try_consume_at(nonce, now_millis())
    }

    fn try_consume_at(&self, nonce: &str, now_ms: u64) -> bool {
        self.store
            .insert_if_absent_at(&Self::key(nonce), self.ttl.as_millis() as u64, now_ms)
    }

    // The store may be shared with the rate limiter; the prefix keeps an
    // attacker-controlled identifier from squatting on a nonce key.
    fn key(nonce: &str) -> String {
        format!("nonce:{nonce}")
    }

    /// Number of currently tracked nonces (for monitoring).
    pub fn len(&self) -> usize {
        self.store.len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    /// Drop expired nonces now.
    pub fn sweep(&self) {
        self.store.sweep_at(now_millis());
    }

    /// Start a background sweep task.
    ///
    /// The task stops when `shutdown` is notified, so no timer outlives a
    /// graceful shutdown. A missed sweep only delays memory reclamation:
    /// presence in the set is what blocks replay, not the sweep.
    pub fn start_sweep_task(
        self: &Arc<Self>,
        interval: Duration,
        shutdown: Arc<Notify>,
    ) -> tokio::task::JoinHandle<()> {
        let store = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // One pinned future for the task's whole life: a notification
            // that lands while a sweep is running is retained, not lost.
            let stop = shutdown.notified();
            tokio::pin!(stop);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        store.sweep();
                        debug!(live = store.len(), "Nonce sweep complete");
                    }
                    _ = &mut stop => {
                        debug!("Nonce sweep task stopping");
                        break;
                    }
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn store() -> NonceStore {
        NonceStore::new(Arc::new(MemoryStore::new()), Duration::from_secs(300))
    }

    #[test]
    fn test_issue_is_long_and_unique() {
        let store = store();
        let a = store.issue();
        let b = store.issue();
        assert_eq!(a.len(), NONCE_BYTES * 2);
        assert_ne!(a, b);
    }

    #[test]
    fn test_consume_exactly_once() {
        let store = store();
        let nonce = store.issue();

        assert!(!store.is_spent(&nonce));
        assert!(store.try_consume(&nonce));
        assert!(store.is_spent(&nonce));
        assert!(!store.try_consume(&nonce));
    }

    #[test]
    fn test_expired_nonce_becomes_available() {
        let store = NonceStore::new(Arc::new(MemoryStore::new()), Duration::from_secs(300));
        assert!(store.try_consume_at("n1", 0));
        assert!(store.is_spent_at("n1", 299_999));
        // Past the TTL the value is evicted lazily and reusable.
        assert!(!store.is_spent_at("n1", 300_001));
        assert!(store.try_consume_at("n1", 300_001));
    }

    #[test]
    fn test_sweep_bounds_memory() {
        let mem = Arc::new(MemoryStore::new());
        let store = NonceStore::new(Arc::clone(&mem) as Arc<dyn KeyValueStore>, Duration::from_millis(10));
        store.try_consume_at("n1", 0);
        store.try_consume_at("n2", 0);
        assert_eq!(store.len(), 2);

        mem.sweep_at(1_000);
        assert_eq!(store.len(), 0);
    }

    #[tokio::test]
    async fn test_sweep_task_stops_on_shutdown() {
        let store = Arc::new(store());
        let shutdown = Arc::new(Notify::new());
        let handle = store.start_sweep_task(Duration::from_millis(5), Arc::clone(&shutdown));

        tokio::time::sleep(Duration::from_millis(20)).await;
        shutdown.notify_waiters();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("sweep task did not stop")
            .unwrap();
    }

    // A notification that lands while the task is mid-sweep (not parked in
    // the select) must still stop it. Repeated cycles with a hot ticker
    // make that interleaving likely.
    #[tokio::test]
    async fn test_shutdown_during_sweep_is_not_lost() {
        for _ in 0..25 {
            let store = Arc::new(store());
            let shutdown = Arc::new(Notify::new());
            let handle =
                store.start_sweep_task(Duration::from_millis(1), Arc::clone(&shutdown));

            tokio::time::sleep(Duration::from_millis(3)).await;
            shutdown.notify_waiters();
            tokio::time::timeout(Duration::from_secs(1), handle)
                .await
                .expect("sweep task missed the stop signal")
                .unwrap();
        }
    }
}

//! TTL-aware key-value storage behind the stateful components.
//!
//! The nonce store and rate limiter keep their state behind the
//! [`KeyValueStore`] trait so a distributed backend (e.g. Redis) can be
//! substituted without touching the request gate. [`MemoryStore`] is the
//! local, single-process variant: it is correct for one node only, and
//! horizontally scaled deployments must externalize this state to a shared
//! store.
//!
//! Expiry is lazy: entries are checked whenever a key is touched, and a
//! periodic sweep drops whatever was never touched again. There are no
//! per-key timers, so shutdown is just stopping the sweep task.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

/// Current wall-clock time in milliseconds since the Unix epoch.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Snapshot of a fixed rate-limit window after an increment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowSnapshot {
    /// Requests counted in the current window, including this one.
    pub count: u32,
    /// When the current window closes (epoch milliseconds).
    pub reset_at_ms: u64,
}

/// Key-value storage with TTL semantics.
///
/// All operations take an explicit `now_ms` so callers (and tests) control
/// the clock. Implementations must make each operation atomic with respect
/// to concurrent calls for the same key.
pub trait KeyValueStore: Send + Sync {
    /// Insert `key` with the given TTL if it is not currently live.
    ///
    /// Returns `true` if the key was inserted, `false` if it already exists.
    fn insert_if_absent_at(&self, key: &str, ttl_ms: u64, now_ms: u64) -> bool;

    /// Whether `key` is currently live (present and unexpired).
    fn contains_at(&self, key: &str, now_ms: u64) -> bool;

    /// Atomically count a request against the fixed window at `key`.
    ///
    /// Opens a fresh window (`count = 1`) when the key is absent or its
    /// window has closed; otherwise increments the existing count. Exactly
    /// one caller wins the reset when concurrent requests race on an
    /// expired window.
    fn increment_window_at(&self, key: &str, window_ms: u64, now_ms: u64) -> WindowSnapshot;

    /// Drop entries whose expiry has passed.
    fn sweep_at(&self, now_ms: u64);

    /// Number of live entries (for monitoring).
    fn len(&self) -> usize;

    /// Whether the store is empty.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, Copy)]
struct Entry {
    expires_at_ms: u64,
    count: u32,
}

/// In-memory [`KeyValueStore`], the "local" variant.
///
/// A single mutex guards the map; every check-and-set holds it only for the
/// duration of the operation.
pub struct MemoryStore {
    entries: Mutex<HashMap<String, Entry>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Entry>> {
        // Recover from mutex poisoning; the map is always left consistent.
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyValueStore for MemoryStore {
    fn insert_if_absent_at(&self, key: &str, ttl_ms: u64, now_ms: u64) -> bool {
        let mut entries = self.lock();
        match entries.get(key) {
            Some(entry) if entry.expires_at_ms > now_ms => false,
            _ => {
                entries.insert(
                    key.to_string(),
                    Entry {
                        expires_at_ms: now_ms + ttl_ms,
                        count: 1,
                    },
                );
                true
            }
        }
    }

    fn contains_at(&self, key: &str, now_ms: u64) -> bool {
        let entries = self.lock();
        entries
            .get(key)
            .map(|entry| entry.expires_at_ms > now_ms)
            .unwrap_or(false)
    }

    fn increment_window_at(&self, key: &str, window_ms: u64, now_ms: u64) -> WindowSnapshot {
        let mut entries = self.lock();
        let entry = entries
            .entry(key.to_string())
            .and_modify(|entry| {
                if now_ms > entry.expires_at_ms {
                    entry.expires_at_ms = now_ms + window_ms;
                    entry.count = 1;
                } else {
                    entry.count = entry.count.saturating_add(1);
                }
            })
            .or_insert(Entry {
                expires_at_ms: now_ms + window_ms,
                count: 1,
            });

        WindowSnapshot {
            count: entry.count,
            reset_at_ms: entry.expires_at_ms,
        }
    }

    fn sweep_at(&self, now_ms: u64) {
        let mut entries = self.lock();
        entries.retain(|_, entry| entry.expires_at_ms > now_ms);
    }

    fn len(&self) -> usize {
        self.lock().len()
    }
}

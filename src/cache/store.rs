//! In-memory response store with per-entry TTL.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use serde_json::Value;
use tokio::time::{self, Instant, MissedTickBehavior};

use super::key::CacheKey;
use crate::error::{CineError, Result};
use crate::util::background::{shutdown_requested, BackgroundTask};

/// Shared TTL cache of response payloads.
///
/// Cloning is cheap and every clone sees the same entries. Entries are
/// stamped with `tokio::time::Instant`, so a paused test clock drives expiry.
#[derive(Clone)]
pub struct CacheStore {
    inner: Arc<RwLock<StoreInner>>,
}

struct StoreInner {
    entries: HashMap<CacheKey, CacheEntry>,
    ttl: Duration,
}

struct CacheEntry {
    payload: Value,
    created_at: Instant,
    ttl: Duration,
}

impl CacheEntry {
    fn is_fresh(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.created_at) < self.ttl
    }
}

impl CacheStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            inner: Arc::new(RwLock::new(StoreInner {
                entries: HashMap::new(),
                ttl,
            })),
        }
    }

    /// Default TTL applied by [`CacheStore::set`].
    pub fn ttl(&self) -> Duration {
        self.read().ttl
    }

    /// Get a cached payload, returning None if expired or missing.
    pub fn get(&self, key: &CacheKey) -> Option<Value> {
        let now = Instant::now();
        {
            let inner = self.read();
            match inner.entries.get(key) {
                Some(entry) if entry.is_fresh(now) => return Some(entry.payload.clone()),
                Some(_) => {}
                None => return None,
            }
        }

        // Expired: drop it now rather than waiting for the sweep. Re-check
        // under the write lock in case a writer refreshed it meanwhile.
        let mut inner = self.write();
        if inner
            .entries
            .get(key)
            .is_some_and(|entry| !entry.is_fresh(now))
        {
            inner.entries.remove(key);
            tracing::trace!(key = %key, "Dropped expired cache entry");
        }
        None
    }

    /// Whether a fresh entry exists, without cloning its payload.
    pub fn contains_fresh(&self, key: &CacheKey) -> bool {
        let now = Instant::now();
        self.read()
            .entries
            .get(key)
            .is_some_and(|entry| entry.is_fresh(now))
    }

    /// Store a payload under the default TTL, replacing any previous entry.
    pub fn set(&self, key: CacheKey, payload: Value) {
        let ttl = self.ttl();
        self.set_with_ttl(key, payload, ttl);
    }

    /// Store a payload with its own TTL, replacing any previous entry.
    pub fn set_with_ttl(&self, key: CacheKey, payload: Value, ttl: Duration) {
        tracing::trace!(key = %key, ttl_ms = ttl.as_millis() as u64, "Caching response");
        self.write().entries.insert(
            key,
            CacheEntry {
                payload,
                created_at: Instant::now(),
                ttl,
            },
        );
    }

    /// Remove every entry whose key matches. Returns how many were removed.
    pub fn invalidate<P>(&self, predicate: P) -> usize
    where
        P: Fn(&CacheKey) -> bool,
    {
        let mut inner = self.write();
        let before = inner.entries.len();
        inner.entries.retain(|key, _| !predicate(key));
        before - inner.entries.len()
    }

    /// Remove every expired entry. Returns how many were removed.
    pub fn sweep(&self) -> usize {
        let now = Instant::now();
        let mut inner = self.write();
        let before = inner.entries.len();
        inner.entries.retain(|_, entry| entry.is_fresh(now));
        before - inner.entries.len()
    }

    /// Clear all entries.
    pub fn clear(&self) {
        self.write().entries.clear();
    }

    /// Number of stored entries, expired ones included until swept.
    pub fn len(&self) -> usize {
        self.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Run [`CacheStore::sweep`] every `interval` until the handle is shut down.
    pub fn spawn_sweeper(&self, interval: Duration) -> Result<BackgroundTask> {
        if interval.is_zero() {
            return Err(CineError::InvalidArgument(
                "sweep interval must be non-zero".into(),
            ));
        }
        let store = self.clone();
        Ok(BackgroundTask::spawn("cache-sweeper", move |mut shutdown_rx| async move {
            let mut ticker = time::interval_at(Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    changed = shutdown_rx.changed() => {
                        if shutdown_requested(changed, &shutdown_rx) {
                            break;
                        }
                    }
                    _ = ticker.tick() => {
                        let removed = store.sweep();
                        tracing::debug!(removed, remaining = store.len(), "Cache sweep");
                    }
                }
            }
        }))
    }

    // A panic while holding the lock cannot leave a half-written entry
    // (inserts and removals are single map operations), so poisoning is ignored.
    fn read(&self) -> RwLockReadGuard<'_, StoreInner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, StoreInner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }
}

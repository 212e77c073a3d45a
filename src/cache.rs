//! Read-through TTL cache for staking analytics results.
//!
//! Entries are keyed by contract address and stamped with the clock time at
//! which they were produced. A lookup inside the TTL window returns the stored
//! value; anything older (or absent) is recomputed through the caller-supplied
//! refresh and overwritten. A failed refresh leaves the entry untouched and
//! hands the error back unchanged.
//!
//! Each key has its own async mutex held across check, refresh and store, so
//! concurrent lookups of one key share a single refresh. Entry timestamps are
//! mirrored in a separate map so inspection never waits on a refresh.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;

use crate::clock::Clock;
use crate::staking::ProcessedStakingData;

/// Default freshness window: 5 minutes.
pub const DEFAULT_TTL_MS: i64 = 5 * 60 * 1000;

#[derive(Debug, Clone)]
struct CacheEntry<V> {
    data: V,
    timestamp: i64,
}

type Slot<V> = Arc<Mutex<Option<CacheEntry<V>>>>;

/// Cache of analytics results per contract address.
pub type StakingCache = TtlCache<ProcessedStakingData>;

pub struct TtlCache<V> {
    slots: Mutex<HashMap<String, Slot<V>>>,
    /// Timestamp of every stored entry. Lock order: `slots` before `stamps`.
    stamps: Mutex<HashMap<String, i64>>,
    ttl_ms: i64,
    clock: Arc<dyn Clock>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl<V: Clone> TtlCache<V> {
    /// Create a cache with the given TTL, reading time from `clock`.
    ///
    /// TTLs beyond `i64::MAX` milliseconds saturate.
    pub fn new(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        let ttl_ms = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX);
        Self::with_ttl_ms(ttl_ms, clock)
    }

    pub fn with_ttl_ms(ttl_ms: i64, clock: Arc<dyn Clock>) -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
            stamps: Mutex::new(HashMap::new()),
            ttl_ms,
            clock,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn ttl_ms(&self) -> i64 {
        self.ttl_ms
    }

    /// Look up `key` at the current clock time, refreshing if absent or stale.
    pub async fn get_or_refresh<F, Fut, E>(&self, key: &str, refresh: F) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        let now = self.clock.now_ms();
        self.get_or_refresh_at(key, now, refresh).await
    }

    /// Look up `key` as of `now` (ms), refreshing if absent or stale.
    ///
    /// Fresh means `now - entry.timestamp < ttl`.
    pub async fn get_or_refresh_at<F, Fut, E>(
        &self,
        key: &str,
        now: i64,
        refresh: F,
    ) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        let slot = self.slot(key).await;
        let mut entry = slot.lock().await;

        if let Some(cached) = entry.as_ref() {
            let age_ms = now.saturating_sub(cached.timestamp);
            if age_ms < self.ttl_ms {
                self.hits.fetch_add(1, Ordering::Relaxed);
                crate::metrics::record_cache_hit();
                tracing::debug!(key, age_ms, "cache hit");
                return Ok(cached.data.clone());
            }
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        crate::metrics::record_cache_miss();
        tracing::debug!(key, stale = entry.is_some(), "cache miss, refreshing");

        let data = match refresh().await {
            Ok(data) => data,
            Err(e) => {
                if entry.is_none() {
                    self.discard_slot(key, &slot).await;
                }
                return Err(e);
            }
        };
        *entry = Some(CacheEntry {
            data: data.clone(),
            timestamp: now,
        });
        self.publish(key, &slot, now).await;
        Ok(data)
    }

    /// Timestamp of the stored entry for `key`, fresh or not.
    pub async fn entry_timestamp(&self, key: &str) -> Option<i64> {
        self.stamps.lock().await.get(key).copied()
    }

    pub async fn contains_key(&self, key: &str) -> bool {
        self.entry_timestamp(key).await.is_some()
    }

    /// Number of stored entries (fresh or stale).
    pub async fn len(&self) -> usize {
        self.stamps.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Drop the entry for `key`, forcing the next lookup to refresh.
    pub async fn invalidate(&self, key: &str) {
        let mut slots = self.slots.lock().await;
        slots.remove(key);
        self.stamps.lock().await.remove(key);
    }

    pub async fn clear(&self) {
        let mut slots = self.slots.lock().await;
        slots.clear();
        self.stamps.lock().await.clear();
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }

    async fn slot(&self, key: &str) -> Slot<V> {
        let mut slots = self.slots.lock().await;
        Arc::clone(slots.entry(key.to_string()).or_default())
    }

    /// Record a stored entry, unless its slot was invalidated mid-refresh.
    async fn publish(&self, key: &str, slot: &Slot<V>, timestamp: i64) {
        let slots = self.slots.lock().await;
        if slots.get(key).is_some_and(|current| Arc::ptr_eq(current, slot)) {
            self.stamps.lock().await.insert(key.to_string(), timestamp);
        }
    }

    /// Drop a slot that never held an entry.
    async fn discard_slot(&self, key: &str, slot: &Slot<V>) {
        let mut slots = self.slots.lock().await;
        if slots.get(key).is_some_and(|current| Arc::ptr_eq(current, slot)) {
            slots.remove(key);
        }
    }
}

/// Cache statistics for monitoring
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
}

impl CacheStats {
    /// Hit rate in [0.0, 1.0]
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

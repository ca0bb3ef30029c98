//! In-memory TTL cache for idempotent upstream reads.
//!
//! Each key owns a slot guarded by its own async mutex, so the
//! read / evict / fetch / populate sequence for one key runs atomically
//! while unrelated keys proceed in parallel. There is no size bound:
//! memory grows with the number of distinct keys requested.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;

/// Source of the current instant.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

struct Entry<V> {
    value: V,
    stored_at: Instant,
}

type Slot<V> = Arc<Mutex<Option<Entry<V>>>>;

pub struct TtlCache<V> {
    enabled: bool,
    ttl: Duration,
    clock: Arc<dyn Clock>,
    slots: Mutex<HashMap<String, Slot<V>>>,
}

impl<V: Clone + Send> TtlCache<V> {
    pub fn new(enabled: bool, ttl: Duration) -> Self {
        Self::with_clock(enabled, ttl, Arc::new(SystemClock))
    }

    pub fn with_clock(enabled: bool, ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            enabled,
            ttl,
            clock,
            slots: Mutex::new(HashMap::new()),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Returns the value stored under `key` if it is younger than the TTL.
    /// A stale entry is dropped as a side effect.
    pub async fn get(&self, key: &str) -> Option<V> {
        if !self.enabled {
            return None;
        }
        let slot = self.slots.lock().await.get(key).cloned()?;
        let mut entry = slot.lock().await;
        self.take_fresh(&mut entry)
    }

    /// Stores `value` under `key`, stamped with the current instant.
    pub async fn put(&self, key: &str, value: V) {
        if !self.enabled {
            return;
        }
        let slot = self.slot(key).await;
        let mut entry = slot.lock().await;
        *entry = Some(Entry {
            value,
            stored_at: self.clock.now(),
        });
    }

    /// Returns the cached value for `key`, or runs `fetch` and caches its
    /// result. Concurrent callers for the same key wait on the first fetch
    /// instead of racing it. Errors are returned as-is and never cached.
    pub async fn get_or_try_fetch<F, Fut, E>(&self, key: &str, fetch: F) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        if !self.enabled {
            return fetch().await;
        }

        let slot = self.slot(key).await;
        let mut entry = slot.lock().await;
        if let Some(value) = self.take_fresh(&mut entry) {
            tracing::debug!(key, "cache hit");
            return Ok(value);
        }

        tracing::debug!(key, "cache miss");
        let value = fetch().await?;
        *entry = Some(Entry {
            value: value.clone(),
            stored_at: self.clock.now(),
        });
        Ok(value)
    }

    /// Number of entries currently holding a value (stale or not).
    pub async fn len(&self) -> usize {
        let slots: Vec<Slot<V>> = self.slots.lock().await.values().cloned().collect();
        let mut count = 0;
        for slot in slots {
            if slot.lock().await.is_some() {
                count += 1;
            }
        }
        count
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    async fn slot(&self, key: &str) -> Slot<V> {
        let mut slots = self.slots.lock().await;
        slots
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(None)))
            .clone()
    }

    fn take_fresh(&self, entry: &mut Option<Entry<V>>) -> Option<V> {
        let fresh = entry
            .as_ref()
            .is_some_and(|e| self.clock.now().saturating_duration_since(e.stored_at) < self.ttl);
        if fresh {
            entry.as_ref().map(|e| e.value.clone())
        } else {
            *entry = None;
            None
        }
    }
}

//! A generic TTL cache with single-flight de-duplication (§5).
//!
//! Used both by the [`collector`](crate::collector) for its `(iss, sub)`
//! fetch cache and by the [`resolver`](crate::resolver) for its
//! `(entity_id, entity_type)` result cache. Concurrent callers requesting
//! the same missing or expired key observe exactly one in-flight population
//! and all receive its result — each cache key gets its own lock, so a
//! population in progress for one key never blocks lookups of another.

use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;
use std::time::Instant;

use tokio::sync::Mutex;
use tokio::sync::RwLock;

use crate::error::Error;

type Slot<V> = Arc<Mutex<Option<(V, Instant)>>>;

/// A shared, async-safe TTL cache.
pub struct TtlCache<K, V> {
    entries: RwLock<HashMap<K, Slot<V>>>,
}

impl<K, V> Default for TtlCache<K, V>
where
    K: Eq + Hash,
{
    fn default() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new() -> Self {
        Self::default()
    }

    async fn slot_for(&self, key: &K) -> Slot<V> {
        if let Some(slot) = self.entries.read().await.get(key) {
            return slot.clone();
        }

        let mut entries = self.entries.write().await;
        entries
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Mutex::new(None)))
            .clone()
    }

    /// Return the cached value for `key` if still fresh; otherwise run
    /// `populate` (exactly once across any concurrently-waiting callers) and
    /// cache its result under the expiry it returns.
    pub async fn get_or_populate<F, Fut>(&self, key: K, populate: F) -> Result<V, Error>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<(V, Instant), Error>>,
    {
        let slot = self.slot_for(&key).await;
        let mut guard = slot.lock().await;

        if let Some((value, expires_at)) = guard.as_ref() {
            if Instant::now() < *expires_at {
                return Ok(value.clone());
            }
        }

        let (value, expires_at) = populate().await?;
        *guard = Some((value.clone(), expires_at));
        Ok(value)
    }

    /// Remove a key from the cache, e.g. after a verification failure that
    /// must not be remembered (§8, "Expired intermediate... result key NOT
    /// cached").
    pub async fn invalidate(&self, key: &K) {
        self.entries.write().await.remove(key);
    }
}

#[cfg(test)]
mod tests;

use std::num::NonZeroUsize;
use std::time::Duration;

use lru::LruCache;
use sha2::{Digest, Sha256};
use tokio::sync::Mutex;
use tokio::time::Instant;

use super::Retrieval;

pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(5 * 60);
pub const DEFAULT_CACHE_CAPACITY: usize = 200;

#[derive(Debug, Clone)]
struct CacheEntry {
    payload: Retrieval,
    stored_at: Instant,
}

/// Short-lived in-process cache of retrieval results
///
/// Owned by a single retriever and dropped with it; nothing is persisted.
/// Concurrent identical queries may both miss and both store, in which case
/// the last write wins.
#[derive(Debug)]
pub struct RetrievalCache {
    entries: Mutex<LruCache<String, CacheEntry>>,
    ttl: Duration,
}

impl Default for RetrievalCache {
    #[inline]
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_TTL, DEFAULT_CACHE_CAPACITY)
    }
}

impl RetrievalCache {
    #[inline]
    pub fn new(ttl: Duration, capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            ttl,
        }
    }

    /// Cache key of a query: SHA-256 of the result limit and match expression
    #[inline]
    pub fn key(limit: usize, match_query: &str) -> String {
        let digest = Sha256::digest(format!("{}:{}", limit, match_query).as_bytes());
        format!("{:x}", digest)
    }

    /// Cached payload for `key`, unless it is older than the TTL. Expired
    /// entries are removed.
    #[inline]
    pub async fn get(&self, key: &str) -> Option<Retrieval> {
        let mut entries = self.entries.lock().await;

        // Reads do not refresh recency, so eviction stays oldest-first
        let expired = entries.peek(key)?.stored_at.elapsed() > self.ttl;
        if expired {
            entries.pop(key);
            return None;
        }

        entries.peek(key).map(|entry| entry.payload.clone())
    }

    /// Store a payload, evicting the oldest entry once over capacity
    #[inline]
    pub async fn insert(&self, key: String, payload: Retrieval) {
        self.entries.lock().await.put(
            key,
            CacheEntry {
                payload,
                stored_at: Instant::now(),
            },
        );
    }

    #[inline]
    pub async fn clear(&self) {
        self.entries.lock().await.clear();
    }

    #[inline]
    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    #[inline]
    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }
}

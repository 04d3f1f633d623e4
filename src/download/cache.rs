//! Result cache
//!
//! Bounded, time-expiring LRU of [`VideoInfo`] keyed by the normalized
//! source URL. Values are shared `Arc`s and never mutated: a hit hands out
//! the same object, a re-extraction replaces the entry wholesale.

use lru_time_cache::LruCache;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use url::Url;

use crate::core::config;
use crate::download::formats::VideoInfo;

/// Canonical cache key for a source URL.
///
/// Parses and re-serializes (lowercases the host, drops the fragment);
/// anything unparseable is keyed by its trimmed text.
pub fn cache_key(url: &str) -> String {
    let trimmed = url.trim();
    match Url::parse(trimmed) {
        Ok(mut parsed) => {
            parsed.set_fragment(None);
            parsed.to_string()
        }
        Err(_) => trimmed.to_string(),
    }
}

/// Stored value with its creation time
struct CachedInfo {
    info: Arc<VideoInfo>,
    stored_at: Instant,
}

pub struct ResultCache {
    entries: Mutex<LruCache<String, CachedInfo>>,
    ttl: Duration,
    hit_count: AtomicU64,
    miss_count: AtomicU64,
}

impl ResultCache {
    pub fn new(ttl: Duration, capacity: usize) -> Self {
        Self {
            entries: Mutex::new(LruCache::with_expiry_duration_and_capacity(ttl, capacity)),
            ttl,
            hit_count: AtomicU64::new(0),
            miss_count: AtomicU64::new(0),
        }
    }

    /// Cache with the configured TTL and capacity.
    pub fn from_config() -> Self {
        Self::new(config::cache::ttl(), config::cache::CAPACITY)
    }

    /// Look up a URL. A hit refreshes the entry's recency, not its expiry:
    /// an entry lives at most one TTL from `put`, however often it is read.
    pub async fn get(&self, url: &str) -> Option<Arc<VideoInfo>> {
        let key = cache_key(url);
        let found = {
            let mut entries = self.entries.lock().await;
            let fresh = match entries.get(&key) {
                Some(entry) if entry.stored_at.elapsed() < self.ttl => Some(entry.info.clone()),
                _ => None,
            };
            if fresh.is_none() {
                entries.remove(&key);
            }
            fresh
        };
        match found {
            Some(info) => {
                self.hit_count.fetch_add(1, Ordering::Relaxed);
                log::debug!("Cache hit for {}", key);
                Some(info)
            }
            None => {
                self.miss_count.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Store (or replace) the result for a URL.
    pub async fn put(&self, url: &str, info: Arc<VideoInfo>) {
        let key = cache_key(url);
        let entry = CachedInfo {
            info,
            stored_at: Instant::now(),
        };
        self.entries.lock().await.insert(key, entry);
    }

    /// (hits, misses) since creation
    pub fn stats(&self) -> (u64, u64) {
        (
            self.hit_count.load(Ordering::Relaxed),
            self.miss_count.load(Ordering::Relaxed),
        )
    }
}

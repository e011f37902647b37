//! Retrieval cache: TTL + LRU around `retrieve`, invalidated per user on
//! write (component U).

use memory_core::{CacheConfig, EntityIdType, Memory, UserId};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::{Duration, Instant};

#[derive(Clone)]
struct Entry {
    value: Vec<Memory>,
    inserted_at: Instant,
    last_used: u64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CacheMetrics {
    pub hits: u64,
    pub misses: u64,
}

impl CacheMetrics {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Key: (user, normalized query, limit).
type CacheKey = (UserId, String, usize);

struct Inner {
    ttl: Duration,
    max_size: usize,
    entries: HashMap<CacheKey, Entry>,
    clock: u64,
    metrics: CacheMetrics,
}

/// LRU+TTL cache wrapping the top-level retrieve call only (not Stage 1), so
/// retrieval metrics stay accurate on a cache miss.
pub struct RetrievalCache {
    inner: Mutex<Inner>,
}

impl RetrievalCache {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            inner: Mutex::new(Inner {
                ttl: Duration::from_secs(config.ttl_seconds),
                max_size: config.max_entries,
                entries: HashMap::new(),
                clock: 0,
                metrics: CacheMetrics::default(),
            }),
        }
    }

    fn normalize(query: &str) -> String {
        query.trim().to_lowercase()
    }

    pub fn get(&self, user_id: UserId, query: &str, limit: usize) -> Option<Vec<Memory>> {
        let key = (user_id, Self::normalize(query), limit);
        let mut inner = self.inner.lock();
        inner.clock += 1;
        let tick = inner.clock;
        let ttl = inner.ttl;

        let hit = match inner.entries.get_mut(&key) {
            Some(entry) if entry.inserted_at.elapsed() <= ttl => {
                entry.last_used = tick;
                Some(entry.value.clone())
            }
            Some(_) => {
                inner.entries.remove(&key);
                None
            }
            None => None,
        };

        if hit.is_some() {
            inner.metrics.hits += 1;
        } else {
            inner.metrics.misses += 1;
        }
        hit
    }

    pub fn put(&self, user_id: UserId, query: &str, limit: usize, value: Vec<Memory>) {
        let key = (user_id, Self::normalize(query), limit);
        let mut inner = self.inner.lock();
        inner.clock += 1;
        let tick = inner.clock;
        let max_size = inner.max_size;

        inner.entries.insert(
            key,
            Entry {
                value,
                inserted_at: Instant::now(),
                last_used: tick,
            },
        );

        if inner.entries.len() > max_size {
            if let Some(lru_key) = inner
                .entries
                .iter()
                .min_by_key(|(_, e)| e.last_used)
                .map(|(k, _)| k.clone())
            {
                inner.entries.remove(&lru_key);
            }
        }
    }

    /// Invalidate every cached entry for a user. Called on `store`/`delete`;
    /// must be linearized with the write that triggered it.
    pub fn invalidate_user(&self, user_id: UserId) {
        let mut inner = self.inner.lock();
        inner.entries.retain(|(u, _, _), _| *u != user_id);
    }

    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn metrics(&self) -> CacheMetrics {
        self.inner.lock().metrics.clone()
    }
}

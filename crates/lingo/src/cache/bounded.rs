//! Bounded concurrent cache with TTL and statistics.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use bon::Builder;
use dashmap::DashMap;

/// When an entry's TTL clock restarts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpiryPolicy {
    /// TTL measured from the last read (hot entries stay alive).
    AfterAccess,
    /// TTL measured from the write (entries age out regardless of reads).
    AfterWrite,
}

/// Sizing and expiry configuration for one cache tier.
#[derive(Debug, Clone, Copy, Builder)]
pub struct CacheConfig {
    /// Maximum number of entries before eviction kicks in.
    pub max_size: usize,
    /// Time-to-live for an entry under the tier's expiry policy.
    pub ttl: Duration,
    pub policy: ExpiryPolicy,
}

/// A point-in-time view of a tier's counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub invalidations: u64,
    /// Average load time recorded by callers, in nanoseconds.
    pub avg_load_nanos: u64,
    pub entry_count: usize,
}

impl CacheStats {
    /// Hit rate in `[0.0, 1.0]`; zero when no lookups happened.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

#[derive(Debug, Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
    invalidations: AtomicU64,
    load_nanos: AtomicU64,
    loads: AtomicU64,
}

#[derive(Debug, Clone)]
struct Entry<V> {
    value: V,
    /// Instant the TTL clock last restarted from (write or access).
    stamp: Instant,
}

/// A bounded concurrent cache keyed by `lang:ns:key` strings.
///
/// Eviction runs on insert once `max_size` is reached: expired entries go
/// first, then the entry with the oldest TTL stamp. Lookups are lock-free
/// from the caller's view apart from the shard touch under
/// [`ExpiryPolicy::AfterAccess`].
#[derive(Debug)]
pub struct BoundedCache<V: Clone> {
    entries: DashMap<String, Entry<V>>,
    config: CacheConfig,
    counters: Counters,
}

impl<V: Clone> BoundedCache<V> {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            entries: DashMap::new(),
            config,
            counters: Counters::default(),
        }
    }

    /// Look up a key, counting a hit or miss.
    pub fn get(&self, key: &str) -> Option<V> {
        let now = Instant::now();
        let found = match self.config.policy {
            ExpiryPolicy::AfterAccess => match self.entries.get_mut(key) {
                // The access refreshes the TTL clock, so a shard write lock
                // is taken even on the read path.
                Some(mut entry) => {
                    if now.duration_since(entry.stamp) > self.config.ttl {
                        drop(entry);
                        self.remove_expired(key);
                        None
                    } else {
                        entry.stamp = now;
                        Some(entry.value.clone())
                    }
                }
                None => None,
            },
            ExpiryPolicy::AfterWrite => match self.entries.get(key) {
                Some(entry) => {
                    if now.duration_since(entry.stamp) > self.config.ttl {
                        drop(entry);
                        self.remove_expired(key);
                        None
                    } else {
                        Some(entry.value.clone())
                    }
                }
                None => None,
            },
        };
        match &found {
            Some(_) => {
                self.counters.hits.fetch_add(1, Ordering::Relaxed);
            }
            None => {
                self.counters.misses.fetch_add(1, Ordering::Relaxed);
            }
        }
        found
    }

    fn remove_expired(&self, key: &str) {
        if self.entries.remove(key).is_some() {
            self.counters.evictions.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Insert or replace a value, evicting if the tier is full.
    pub fn put(&self, key: impl Into<String>, value: V) {
        let key = key.into();
        if !self.entries.contains_key(&key) && self.entries.len() >= self.config.max_size {
            self.evict_one();
        }
        self.entries.insert(
            key,
            Entry {
                value,
                stamp: Instant::now(),
            },
        );
    }

    /// Drop expired entries; if none were expired, drop the oldest entry.
    fn evict_one(&self) {
        let now = Instant::now();
        let mut expired: Vec<String> = Vec::new();
        let mut oldest: Option<(String, Instant)> = None;
        for entry in self.entries.iter() {
            if now.duration_since(entry.stamp) > self.config.ttl {
                expired.push(entry.key().clone());
            } else if oldest.as_ref().is_none_or(|(_, stamp)| entry.stamp < *stamp) {
                oldest = Some((entry.key().clone(), entry.stamp));
            }
        }
        if expired.is_empty() {
            if let Some((key, _)) = oldest
                && self.entries.remove(&key).is_some()
            {
                self.counters.evictions.fetch_add(1, Ordering::Relaxed);
            }
        } else {
            for key in expired {
                if self.entries.remove(&key).is_some() {
                    self.counters.evictions.fetch_add(1, Ordering::Relaxed);
                }
            }
        }
    }

    /// Remove one key. Counted as an invalidation, not an eviction.
    pub fn invalidate(&self, key: &str) {
        if self.entries.remove(key).is_some() {
            self.counters.invalidations.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Remove every key whose middle `lang:ns:key` segment equals `ns`.
    ///
    /// This scan is the atomic-reload primitive: after it returns, no entry
    /// derived from the namespace's previous contents remains in this tier.
    pub fn invalidate_namespace(&self, namespace: &str) -> usize {
        let doomed: Vec<String> = self
            .entries
            .iter()
            .filter(|entry| key_namespace(entry.key()) == Some(namespace))
            .map(|entry| entry.key().clone())
            .collect();
        let mut removed = 0;
        for key in doomed {
            if self.entries.remove(&key).is_some() {
                removed += 1;
            }
        }
        self.counters
            .invalidations
            .fetch_add(removed as u64, Ordering::Relaxed);
        removed
    }

    /// Drop everything.
    pub fn invalidate_all(&self) {
        let count = self.entries.len() as u64;
        self.entries.clear();
        self.counters
            .invalidations
            .fetch_add(count, Ordering::Relaxed);
    }

    /// Record how long a caller spent computing a value for this tier.
    pub fn record_load(&self, elapsed: Duration) {
        self.counters
            .load_nanos
            .fetch_add(elapsed.as_nanos() as u64, Ordering::Relaxed);
        self.counters.loads.fetch_add(1, Ordering::Relaxed);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Snapshot the counters.
    pub fn stats(&self) -> CacheStats {
        let loads = self.counters.loads.load(Ordering::Relaxed);
        let avg_load_nanos = if loads == 0 {
            0
        } else {
            self.counters.load_nanos.load(Ordering::Relaxed) / loads
        };
        CacheStats {
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            evictions: self.counters.evictions.load(Ordering::Relaxed),
            invalidations: self.counters.invalidations.load(Ordering::Relaxed),
            avg_load_nanos,
            entry_count: self.entries.len(),
        }
    }
}

/// Extract the namespace (middle) segment of a `lang:ns:key` cache key.
pub fn key_namespace(cache_key: &str) -> Option<&str> {
    let mut parts = cache_key.splitn(3, ':');
    let _lang = parts.next()?;
    let ns = parts.next()?;
    parts.next()?;
    Some(ns)
}

/// Build the canonical `lang:ns:key` cache key.
pub fn cache_key(language: &str, namespace: &str, key: &str) -> String {
    let mut out = String::with_capacity(language.len() + namespace.len() + key.len() + 2);
    out.push_str(language);
    out.push(':');
    out.push_str(namespace);
    out.push(':');
    out.push_str(key);
    out
}

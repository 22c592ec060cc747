//! Tiered resolution caches.
//!
//! Two independent bounded tiers sit in front of the registry (which plays
//! the L2 role and is not a cache):
//!
//! - **L1** holds fully resolved strings under an access-based TTL.
//! - **L3** holds compiled templates under a write-based TTL.
//!
//! Both are keyed `lang:ns:key`; namespace invalidation removes every key
//! whose middle segment matches, which is what makes namespace reloads
//! atomic from the resolver's perspective.

mod bounded;

use std::sync::Arc;
use std::time::Duration;

pub use bounded::{BoundedCache, CacheConfig, CacheStats, ExpiryPolicy, cache_key, key_namespace};

use crate::config::CacheSettings;
use crate::template::CompiledTemplate;

/// The L1 + L3 pair used by the resolver.
#[derive(Debug)]
pub struct TieredCache {
    /// Resolved strings; TTL refreshed on access.
    pub l1: BoundedCache<String>,
    /// Compiled templates; TTL fixed at write.
    pub l3: BoundedCache<Arc<CompiledTemplate>>,
}

impl TieredCache {
    /// Build both tiers from the configured sizes and TTLs.
    pub fn new(settings: &CacheSettings) -> Self {
        Self {
            l1: BoundedCache::new(
                CacheConfig::builder()
                    .max_size(settings.l1.max_size)
                    .ttl(Duration::from_secs(settings.l1.ttl_seconds))
                    .policy(ExpiryPolicy::AfterAccess)
                    .build(),
            ),
            l3: BoundedCache::new(
                CacheConfig::builder()
                    .max_size(settings.l3.max_size)
                    .ttl(Duration::from_secs(settings.l3.ttl_seconds))
                    .policy(ExpiryPolicy::AfterWrite)
                    .build(),
            ),
        }
    }

    /// Remove a namespace's slice from both tiers.
    ///
    /// Returns `(l1_removed, l3_removed)`.
    pub fn invalidate_namespace(&self, namespace: &str) -> (usize, usize) {
        (
            self.l1.invalidate_namespace(namespace),
            self.l3.invalidate_namespace(namespace),
        )
    }

    /// Drop everything from both tiers.
    pub fn invalidate_all(&self) {
        self.l1.invalidate_all();
        self.l3.invalidate_all();
    }
}

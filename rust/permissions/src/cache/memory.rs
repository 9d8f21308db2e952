// =============================================================================
// Fast (request-scoped) cache tier
// =============================================================================

use ahash::AHashSet;
use lru::LruCache;
use parking_lot::Mutex;
use std::collections::BTreeSet;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use super::{CacheStore, Result};
use crate::cacheability::CacheMetadata;
use crate::set::PermissionSet;

/// Default number of sets kept in memory.
pub const DEFAULT_CAPACITY: usize = 1024;

#[derive(Debug, Clone)]
struct Entry {
    value: Arc<PermissionSet>,
    tags: BTreeSet<String>,
    /// `None` = permanent.
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| now >= at)
    }
}

/// Bounded in-memory tier.
///
/// Least-recently-used sets are evicted once `capacity` is reached. Entries
/// honour max-age and tag invalidation.
pub struct MemoryCacheStore {
    entries: Mutex<LruCache<String, Entry>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl MemoryCacheStore {
    /// Create a store holding at most `capacity` sets (minimum 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.len(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }

    fn miss(&self) -> Result<Option<Arc<PermissionSet>>> {
        self.misses.fetch_add(1, Ordering::Relaxed);
        Ok(None)
    }
}

impl Default for MemoryCacheStore {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl CacheStore for MemoryCacheStore {
    fn get(&self, key: &str) -> Result<Option<Arc<PermissionSet>>> {
        let mut entries = self.entries.lock();
        let expired = match entries.get(key) {
            None => return self.miss(),
            Some(entry) if entry.is_expired(Instant::now()) => true,
            Some(entry) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                return Ok(Some(Arc::clone(&entry.value)));
            }
        };
        if expired {
            entries.pop(key);
        }
        self.miss()
    }

    fn set(&self, key: &str, value: Arc<PermissionSet>, policy: &CacheMetadata) -> Result<()> {
        let expires_at = policy
            .max_age()
            .as_duration()
            .map(|ttl| Instant::now() + ttl);
        let entry = Entry {
            value,
            tags: policy.tags().clone(),
            expires_at,
        };
        self.entries.lock().put(key.to_string(), entry);
        Ok(())
    }

    fn invalidate_tags(&self, tags: &[&str]) -> Result<()> {
        let wanted: AHashSet<&str> = tags.iter().copied().collect();
        let mut entries = self.entries.lock();
        let stale: Vec<String> = entries
            .iter()
            .filter(|(_, entry)| entry.tags.iter().any(|t| wanted.contains(t.as_str())))
            .map(|(key, _)| key.clone())
            .collect();
        for key in stale {
            entries.pop(&key);
        }
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        self.entries.lock().clear();
        Ok(())
    }
}

/// Memory tier statistics.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct CacheStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cacheability::MaxAge;

    fn policy(tags: &[&str], max_age: MaxAge) -> CacheMetadata {
        CacheMetadata::new()
            .with_tags(tags.iter().copied())
            .with_max_age(max_age)
    }

    #[test]
    fn put_get_and_stats() {
        let store = MemoryCacheStore::new(4);
        assert!(store.get("a").unwrap().is_none());

        store
            .set("a", Arc::new(PermissionSet::default()), &policy(&["t"], MaxAge::Permanent))
            .unwrap();
        assert!(store.get("a").unwrap().is_some());

        let stats = store.stats();
        assert_eq!(stats.entries, 1);
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
    }

    #[test]
    fn zero_max_age_expires_immediately() {
        let store = MemoryCacheStore::new(4);
        store
            .set("a", Arc::new(PermissionSet::default()), &policy(&[], MaxAge::Seconds(0)))
            .unwrap();
        assert!(store.get("a").unwrap().is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn tag_invalidation_removes_matching_entries() {
        let store = MemoryCacheStore::new(4);
        let set = Arc::new(PermissionSet::default());
        store
            .set("a", Arc::clone(&set), &policy(&["permissions", "role:1"], MaxAge::Permanent))
            .unwrap();
        store
            .set("b", Arc::clone(&set), &policy(&["permissions"], MaxAge::Permanent))
            .unwrap();

        store.invalidate_tags(&["role:1"]).unwrap();
        assert!(store.get("a").unwrap().is_none());
        assert!(store.get("b").unwrap().is_some());

        store.invalidate_tags(&["permissions"]).unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn evicts_least_recently_used() {
        let store = MemoryCacheStore::new(2);
        let set = Arc::new(PermissionSet::default());
        let p = policy(&[], MaxAge::Permanent);
        store.set("a", Arc::clone(&set), &p).unwrap();
        store.set("b", Arc::clone(&set), &p).unwrap();
        assert!(store.get("a").unwrap().is_some());
        store.set("c", Arc::clone(&set), &p).unwrap();

        assert!(store.get("b").unwrap().is_none());
        assert!(store.get("a").unwrap().is_some());
        assert!(store.get("c").unwrap().is_some());
    }
}

//! Cache tiers for calculated permissions.
//!
//! The chain talks to two instances of the same [`CacheStore`] interface:
//!
//! - a fast, request-scoped tier ([`MemoryCacheStore`])
//! - a persistent, cross-request tier ([`RedbCacheStore`] with the `redb`
//!   feature, or any host-provided backend)
//!
//! [`NullCacheStore`] never stores anything; it stands in for a tier that is
//! disabled or unavailable.
//!
//! Stores are eventually consistent key-value maps. Two requests racing on
//! the same key both compute and both write; calculation is a pure function
//! of (account, scope) so either value is correct.

mod memory;
#[cfg(feature = "redb")]
mod redb_store;

use std::sync::Arc;
use thiserror::Error;

use crate::cacheability::CacheMetadata;
use crate::set::PermissionSet;

pub use memory::{CacheStats, MemoryCacheStore, DEFAULT_CAPACITY};
#[cfg(feature = "redb")]
pub use redb_store::RedbCacheStore;

/// Errors that can occur in a cache backend.
#[derive(Error, Debug)]
pub enum CacheError {
    #[cfg(feature = "redb")]
    #[error("redb database error: {0}")]
    Database(#[from] redb::DatabaseError),

    #[cfg(feature = "redb")]
    #[error("redb table error: {0}")]
    Table(#[from] redb::TableError),

    #[cfg(feature = "redb")]
    #[error("redb transaction error: {0}")]
    Transaction(#[from] redb::TransactionError),

    #[cfg(feature = "redb")]
    #[error("redb commit error: {0}")]
    Commit(#[from] redb::CommitError),

    #[cfg(feature = "redb")]
    #[error("redb storage error: {0}")]
    Storage(#[from] redb::StorageError),

    #[error("serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    #[error("cache backend unavailable: {0}")]
    Unavailable(String),
}

pub type Result<T> = std::result::Result<T, CacheError>;

/// Key-value storage for frozen permission sets.
pub trait CacheStore: Send + Sync {
    /// Look up a set. Expired or tag-invalidated entries are misses.
    fn get(&self, key: &str) -> Result<Option<Arc<PermissionSet>>>;

    /// Store a set. `policy` supplies the invalidation tags and max-age.
    fn set(&self, key: &str, value: Arc<PermissionSet>, policy: &CacheMetadata) -> Result<()>;

    /// Invalidate every entry carrying any of `tags`.
    fn invalidate_tags(&self, tags: &[&str]) -> Result<()>;

    /// Drop every entry.
    fn clear(&self) -> Result<()>;
}

/// A tier that stores nothing: every lookup misses.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullCacheStore;

impl CacheStore for NullCacheStore {
    fn get(&self, _key: &str) -> Result<Option<Arc<PermissionSet>>> {
        Ok(None)
    }

    fn set(&self, _key: &str, _value: Arc<PermissionSet>, _policy: &CacheMetadata) -> Result<()> {
        Ok(())
    }

    fn invalidate_tags(&self, _tags: &[&str]) -> Result<()> {
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_store_always_misses() {
        let store = NullCacheStore;
        store
            .set("k", Arc::new(PermissionSet::default()), &CacheMetadata::new())
            .unwrap();
        assert!(store.get("k").unwrap().is_none());
    }
}

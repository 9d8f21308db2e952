#![allow(clippy::result_large_err)]
//! Persistent (cross-request) cache tier backed by redb.
//!
//! Two tables:
//!
//! - `permission_sets`: cache id -> bincode-encoded [`StoredEntry`]
//! - `cache_tag_invalidations`: tag -> invalidation counter
//!
//! Tag invalidation never scans entries. Each entry records the sum of its
//! tags' counters at write time; invalidating a tag bumps its counter, and
//! any entry whose recorded checksum no longer matches is a miss.
//!
//! # Example
//!
//! ```rust,ignore
//! use permissions::cache::{CacheStore, RedbCacheStore};
//!
//! let store = RedbCacheStore::open("/var/lib/app/permissions.redb")?;
//! store.invalidate_tags(&["group_role_list"])?;
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::debug;

use redb::{Database, ReadableTable, ReadableTableMetadata, TableDefinition};

use super::{CacheStore, Result};
use crate::cacheability::CacheMetadata;
use crate::set::PermissionSet;

const ENTRIES_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("permission_sets");

const TAG_INVALIDATIONS_TABLE: TableDefinition<&str, u64> =
    TableDefinition::new("cache_tag_invalidations");

/// On-disk value of one cache entry.
#[derive(Debug, Serialize, Deserialize)]
struct StoredEntry {
    set: PermissionSet,
    tags: Vec<String>,
    /// Sum of the tags' invalidation counters when written.
    checksum: u64,
    /// Unix seconds; `None` = permanent.
    expires_at: Option<u64>,
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Sum of the invalidation counters of `tags`.
fn tag_checksum<T>(table: &T, tags: &[String]) -> Result<u64>
where
    T: ReadableTable<&'static str, u64>,
{
    let mut checksum = 0u64;
    for tag in tags {
        if let Some(count) = table.get(tag.as_str())? {
            checksum = checksum.wrapping_add(count.value());
        }
    }
    Ok(checksum)
}

/// redb-backed [`CacheStore`].
#[derive(Clone)]
pub struct RedbCacheStore {
    db: Arc<Database>,
}

impl RedbCacheStore {
    /// Open or create the cache database at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let db = Database::create(path)?;
        Ok(Self { db: Arc::new(db) })
    }

    /// Number of stored entries, including stale ones not yet overwritten.
    pub fn len(&self) -> Result<u64> {
        let read_txn = self.db.begin_read()?;
        match read_txn.open_table(ENTRIES_TABLE) {
            Ok(table) => Ok(table.len()?),
            Err(redb::TableError::TableDoesNotExist(_)) => Ok(0),
            Err(e) => Err(e.into()),
        }
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Current invalidation counter of a tag.
    pub fn invalidation_count(&self, tag: &str) -> Result<u64> {
        let read_txn = self.db.begin_read()?;
        match read_txn.open_table(TAG_INVALIDATIONS_TABLE) {
            Ok(table) => Ok(table.get(tag)?.map(|v| v.value()).unwrap_or(0)),
            Err(redb::TableError::TableDoesNotExist(_)) => Ok(0),
            Err(e) => Err(e.into()),
        }
    }
}

impl CacheStore for RedbCacheStore {
    fn get(&self, key: &str) -> Result<Option<Arc<PermissionSet>>> {
        let read_txn = self.db.begin_read()?;
        let bytes = match read_txn.open_table(ENTRIES_TABLE) {
            Ok(table) => match table.get(key)? {
                Some(value) => value.value().to_vec(),
                None => return Ok(None),
            },
            Err(redb::TableError::TableDoesNotExist(_)) => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let entry: StoredEntry = bincode::deserialize(&bytes)?;

        if entry.expires_at.is_some_and(|at| now_secs() >= at) {
            debug!("persistent cache entry {} expired", key);
            return Ok(None);
        }

        let checksum = match read_txn.open_table(TAG_INVALIDATIONS_TABLE) {
            Ok(table) => tag_checksum(&table, &entry.tags)?,
            Err(redb::TableError::TableDoesNotExist(_)) => 0,
            Err(e) => return Err(e.into()),
        };
        if checksum != entry.checksum {
            debug!("persistent cache entry {} invalidated by tag", key);
            return Ok(None);
        }

        Ok(Some(Arc::new(entry.set)))
    }

    fn set(&self, key: &str, value: Arc<PermissionSet>, policy: &CacheMetadata) -> Result<()> {
        let tags: Vec<String> = policy.tags().iter().cloned().collect();
        let expires_at = policy
            .max_age()
            .as_duration()
            .map(|ttl| now_secs().saturating_add(ttl.as_secs()));

        let write_txn = self.db.begin_write()?;
        {
            let counters = write_txn.open_table(TAG_INVALIDATIONS_TABLE)?;
            let checksum = tag_checksum(&counters, &tags)?;
            let entry = StoredEntry {
                set: PermissionSet::clone(&value),
                tags,
                checksum,
                expires_at,
            };
            let bytes = bincode::serialize(&entry)?;
            let mut table = write_txn.open_table(ENTRIES_TABLE)?;
            table.insert(key, bytes.as_slice())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    fn invalidate_tags(&self, tags: &[&str]) -> Result<()> {
        let write_txn = self.db.begin_write()?;
        {
            let mut counters = write_txn.open_table(TAG_INVALIDATIONS_TABLE)?;
            for tag in tags {
                let current = counters.get(*tag)?.map(|v| v.value()).unwrap_or(0);
                counters.insert(*tag, current.wrapping_add(1))?;
            }
        }
        write_txn.commit()?;
        debug!("invalidated {} cache tag(s)", tags.len());
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        let write_txn = self.db.begin_write()?;
        write_txn.delete_table(ENTRIES_TABLE)?;
        write_txn.commit()?;
        Ok(())
    }
}

//! Permission sets: a refinable builder and the frozen snapshot.
//!
//! Calculators and the chain accumulate into a [`RefinablePermissionSet`];
//! [`RefinablePermissionSet::freeze`] turns it into the immutable
//! [`PermissionSet`] that gets cached and handed to callers.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::cacheability::{CacheMetadata, MaxAge};
use crate::error::Result;
use crate::item::PermissionItem;
use crate::types::Identifier;

/// scope -> identifier -> item. At most one item per (scope, identifier).
pub type ItemMap = BTreeMap<String, BTreeMap<Identifier, PermissionItem>>;

// ============================================================================
// Frozen snapshot
// ============================================================================

/// Immutable calculated permissions plus their cache metadata.
#[derive(Debug, Clone, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct PermissionSet {
    items: ItemMap,
    cache: CacheMetadata,
}

impl PermissionSet {
    /// Look up the item for (scope, identifier).
    pub fn item(&self, scope: &str, identifier: &Identifier) -> Option<&PermissionItem> {
        self.items.get(scope).and_then(|by_id| by_id.get(identifier))
    }

    /// All items, ordered by scope then identifier.
    pub fn items(&self) -> impl Iterator<Item = &PermissionItem> {
        self.items.values().flat_map(|by_id| by_id.values())
    }

    pub fn items_by_scope<'a>(&'a self, scope: &str) -> impl Iterator<Item = &'a PermissionItem> {
        self.items.get(scope).into_iter().flat_map(|by_id| by_id.values())
    }

    pub fn scopes(&self) -> impl Iterator<Item = &str> {
        self.items.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.items.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn cache_metadata(&self) -> &CacheMetadata {
        &self.cache
    }

    /// Merge two snapshots into a new one.
    ///
    /// Tags union, max-age takes the more restrictive value, contexts stay
    /// empty because snapshots never carry them.
    pub fn merge(&self, other: &PermissionSet) -> Result<PermissionSet> {
        let mut refinable = RefinablePermissionSet::from(self.clone());
        refinable.merge_frozen(other)?;
        Ok(refinable.freeze())
    }
}

// ============================================================================
// Refinable builder
// ============================================================================

/// Mutable permission set used while calculating.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct RefinablePermissionSet {
    items: ItemMap,
    cache: CacheMetadata,
}

impl RefinablePermissionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an item. When an item already exists for the key it is merged
    /// with the new one, unless `overwrite` is set.
    pub fn add_item(&mut self, item: PermissionItem, overwrite: bool) -> Result<()> {
        let by_id = self.items.entry(item.scope().to_string()).or_default();
        let stored = match by_id.get(item.identifier()) {
            Some(existing) if !overwrite => existing.merge(&item)?,
            _ => item,
        };
        by_id.insert(stored.identifier().clone(), stored);
        Ok(())
    }

    pub fn remove_item(&mut self, scope: &str, identifier: &Identifier) -> Option<PermissionItem> {
        let by_id = self.items.get_mut(scope)?;
        let removed = by_id.remove(identifier);
        if by_id.is_empty() {
            self.items.remove(scope);
        }
        removed
    }

    pub fn remove_items_by_scope(&mut self, scope: &str) {
        self.items.remove(scope);
    }

    pub fn remove_items(&mut self) {
        self.items.clear();
    }

    pub fn item(&self, scope: &str, identifier: &Identifier) -> Option<&PermissionItem> {
        self.items.get(scope).and_then(|by_id| by_id.get(identifier))
    }

    pub fn items(&self) -> impl Iterator<Item = &PermissionItem> {
        self.items.values().flat_map(|by_id| by_id.values())
    }

    pub fn is_empty(&self) -> bool {
        self.items.values().all(BTreeMap::is_empty)
    }

    pub fn cache_metadata(&self) -> &CacheMetadata {
        &self.cache
    }

    pub fn add_cache_tags(&mut self, tags: impl IntoIterator<Item = impl Into<String>>) {
        self.cache.add_tags(tags);
    }

    pub fn add_cache_contexts(&mut self, contexts: impl IntoIterator<Item = impl Into<String>>) {
        self.cache.add_contexts(contexts);
    }

    pub fn merge_cache_max_age(&mut self, max_age: MaxAge) {
        self.cache.merge_max_age(max_age);
    }

    /// Make this set vary with / be invalidated by a dependency.
    pub fn add_cacheable_dependency(&mut self, dependency: &CacheMetadata) {
        self.cache.merge(dependency);
    }

    /// Merge another refinable set: items merge per key, metadata folds in.
    pub fn merge(&mut self, other: &RefinablePermissionSet) -> Result<()> {
        self.merge_items(&other.items)?;
        self.cache.merge(&other.cache);
        Ok(())
    }

    /// Merge a frozen snapshot into this builder.
    pub fn merge_frozen(&mut self, other: &PermissionSet) -> Result<()> {
        self.merge_items(&other.items)?;
        self.cache.merge(&other.cache);
        Ok(())
    }

    fn merge_items(&mut self, items: &ItemMap) -> Result<()> {
        for item in items.values().flat_map(|by_id| by_id.values()) {
            self.add_item(item.clone(), false)?;
        }
        Ok(())
    }

    /// Freeze into an immutable snapshot.
    ///
    /// Contexts are dropped: by the time a set is frozen they have been
    /// folded into its cache key and must not bubble further.
    pub fn freeze(self) -> PermissionSet {
        let mut cache = self.cache;
        cache.clear_contexts();
        PermissionSet {
            items: self.items,
            cache,
        }
    }
}

impl From<PermissionSet> for RefinablePermissionSet {
    fn from(set: PermissionSet) -> Self {
        Self {
            items: set.items,
            cache: set.cache,
        }
    }
}

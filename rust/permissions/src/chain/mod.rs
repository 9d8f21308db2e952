//! Calculator chain: runs every registered calculator for a scope, merges
//! their output and caches the result in two tiers.
//!
//! Lookup order for `calculate(account, scope)`:
//!
//! 1. persistent cache contexts of the scope (memoized per process)
//! 2. cache id = namespace + scope + resolved context values
//! 3. fast tier -> return on hit
//! 4. persistent tier -> warm the fast tier, return on hit
//! 5. run calculators in registration order, merge, run `alter` hooks
//! 6. freeze, store in both tiers, return
//!
//! Calculator errors propagate and nothing is cached. Cache errors are
//! logged and treated as misses.

use dashmap::DashMap;
use std::borrow::Cow;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::cache::{CacheStore, MemoryCacheStore, NullCacheStore};
use crate::calculator::PermissionCalculator;
use crate::context::{AccountContextResolver, CacheContextResolver};
use crate::error::Result;
use crate::set::{PermissionSet, RefinablePermissionSet};
use crate::types::Account;

/// Tag carried by every calculated set; invalidating it flushes all of them.
pub const PERMISSIONS_CACHE_TAG: &str = "permissions";

/// First cache key segment of every chain entry.
pub const CACHE_KEY_NAMESPACE: &str = "permissions";

/// Ordered calculators plus the two cache tiers.
pub struct CalculatorChain {
    calculators: Vec<Arc<dyn PermissionCalculator>>,
    contexts: Arc<dyn CacheContextResolver>,
    fast: Arc<dyn CacheStore>,
    persistent: Arc<dyn CacheStore>,
    /// scope -> union of persistent contexts. Never varies by account.
    persistent_contexts: DashMap<String, Arc<BTreeSet<String>>>,
}

impl CalculatorChain {
    pub fn builder() -> CalculatorChainBuilder {
        CalculatorChainBuilder::default()
    }

    /// Registered calculators, in run order.
    pub fn calculators(&self) -> &[Arc<dyn PermissionCalculator>] {
        &self.calculators
    }

    /// Union of every calculator's persistent contexts for `scope`.
    pub fn persistent_cache_contexts(&self, scope: &str) -> Arc<BTreeSet<String>> {
        if let Some(contexts) = self.persistent_contexts.get(scope) {
            return Arc::clone(contexts.value());
        }

        let contexts: BTreeSet<String> = self
            .calculators
            .iter()
            .flat_map(|calculator| calculator.persistent_cache_contexts(scope))
            .collect();
        let contexts = Arc::new(contexts);
        self.persistent_contexts
            .insert(scope.to_string(), Arc::clone(&contexts));
        contexts
    }

    /// Cache id for (account, scope).
    ///
    /// `permissions:{scope}` followed by `:[context]=value` for every
    /// persistent context, in sorted order. Delimiters inside the scope,
    /// context names and values are percent-encoded, so distinct inputs never
    /// share an id.
    pub fn cache_id(&self, account: &Account, scope: &str) -> Result<String> {
        let contexts = self.persistent_cache_contexts(scope);
        let mut cid = format!("{CACHE_KEY_NAMESPACE}:{}", escape_key_part(scope));
        for (context, value) in self.contexts.resolve_all(&*contexts, account)? {
            cid.push_str(&format!(
                ":[{}]={}",
                escape_key_part(&context),
                escape_key_part(&value)
            ));
        }
        Ok(cid)
    }

    /// Calculate (or fetch) the merged permissions of `account` in `scope`.
    pub fn calculate(&self, account: &Account, scope: &str) -> Result<Arc<PermissionSet>> {
        let persistent_contexts = self.persistent_cache_contexts(scope);
        let cid = self.cache_id(account, scope)?;

        if let Some(hit) = lookup(self.fast.as_ref(), "fast", &cid) {
            debug!("permissions {} served from fast cache", cid);
            return Ok(hit);
        }

        if let Some(hit) = lookup(self.persistent.as_ref(), "persistent", &cid) {
            debug!("permissions {} served from persistent cache", cid);
            store(self.fast.as_ref(), "fast", &cid, &hit);
            return Ok(hit);
        }

        let mut calculated = RefinablePermissionSet::new();
        calculated.add_cache_contexts(persistent_contexts.iter().cloned());
        for calculator in &self.calculators {
            let partial = calculator.calculate(account, scope)?;
            calculated.merge(&partial)?;
        }
        for calculator in &self.calculators {
            calculator.alter(account, scope, &mut calculated)?;
        }
        calculated.add_cache_tags([PERMISSIONS_CACHE_TAG]);

        let undeclared: Vec<&String> = calculated
            .cache_metadata()
            .contexts()
            .difference(&*persistent_contexts)
            .collect();
        if !undeclared.is_empty() {
            warn!(
                "calculators for scope {} returned undeclared cache contexts {:?}; they are not part of the cache key",
                scope, undeclared
            );
        }

        let frozen = Arc::new(calculated.freeze());
        if frozen.cache_metadata().max_age().is_cacheable() {
            store(self.persistent.as_ref(), "persistent", &cid, &frozen);
            store(self.fast.as_ref(), "fast", &cid, &frozen);
        }
        debug!(
            "calculated {} permission item(s) for {} with {} calculator(s)",
            frozen.len(),
            cid,
            self.calculators.len()
        );
        Ok(frozen)
    }

    /// Invalidate both tiers by tag. Failures are logged, not returned.
    pub fn invalidate_tags(&self, tags: &[&str]) {
        for (tier, cache) in [("fast", &self.fast), ("persistent", &self.persistent)] {
            if let Err(e) = cache.invalidate_tags(tags) {
                warn!("failed to invalidate {:?} in {} cache: {}", tags, tier, e);
            }
        }
    }

    /// Invalidate every calculated set.
    pub fn invalidate_all(&self) {
        self.invalidate_tags(&[PERMISSIONS_CACHE_TAG]);
    }

    /// Forget memoized persistent contexts.
    pub fn reset(&self) {
        self.persistent_contexts.clear();
    }
}

const KEY_DELIMITERS: &[char] = &['%', ':', '[', ']', '='];

/// Percent-encode the characters that delimit cache id segments.
fn escape_key_part(part: &str) -> Cow<'_, str> {
    if !part.contains(KEY_DELIMITERS) {
        return Cow::Borrowed(part);
    }
    let mut escaped = String::with_capacity(part.len() + 8);
    for c in part.chars() {
        match c {
            '%' => escaped.push_str("%25"),
            ':' => escaped.push_str("%3A"),
            '[' => escaped.push_str("%5B"),
            ']' => escaped.push_str("%5D"),
            '=' => escaped.push_str("%3D"),
            c => escaped.push(c),
        }
    }
    Cow::Owned(escaped)
}

/// Cache read that degrades to a miss.
fn lookup(cache: &dyn CacheStore, tier: &str, cid: &str) -> Option<Arc<PermissionSet>> {
    match cache.get(cid) {
        Ok(hit) => hit,
        Err(e) => {
            warn!("{} cache lookup for {} failed, recalculating: {}", tier, cid, e);
            None
        }
    }
}

/// Cache write that never fails the calculation.
fn store(cache: &dyn CacheStore, tier: &str, cid: &str, set: &Arc<PermissionSet>) {
    if let Err(e) = cache.set(cid, Arc::clone(set), set.cache_metadata()) {
        warn!("failed to store {} in {} cache: {}", cid, tier, e);
    }
}

/// Builder with an explicit, ordered calculator list.
///
/// Defaults: [`AccountContextResolver`], a [`MemoryCacheStore`] fast tier and
/// a [`NullCacheStore`] persistent tier.
#[derive(Default)]
pub struct CalculatorChainBuilder {
    calculators: Vec<Arc<dyn PermissionCalculator>>,
    contexts: Option<Arc<dyn CacheContextResolver>>,
    fast: Option<Arc<dyn CacheStore>>,
    persistent: Option<Arc<dyn CacheStore>>,
}

impl CalculatorChainBuilder {
    /// Append a calculator; calculators run in the order they are added.
    pub fn calculator(mut self, calculator: Arc<dyn PermissionCalculator>) -> Self {
        self.calculators.push(calculator);
        self
    }

    pub fn context_resolver(mut self, resolver: Arc<dyn CacheContextResolver>) -> Self {
        self.contexts = Some(resolver);
        self
    }

    pub fn fast_cache(mut self, cache: Arc<dyn CacheStore>) -> Self {
        self.fast = Some(cache);
        self
    }

    pub fn persistent_cache(mut self, cache: Arc<dyn CacheStore>) -> Self {
        self.persistent = Some(cache);
        self
    }

    pub fn build(self) -> CalculatorChain {
        CalculatorChain {
            calculators: self.calculators,
            contexts: self
                .contexts
                .unwrap_or_else(|| Arc::new(AccountContextResolver)),
            fast: self
                .fast
                .unwrap_or_else(|| Arc::new(MemoryCacheStore::default())),
            persistent: self.persistent.unwrap_or_else(|| Arc::new(NullCacheStore)),
            persistent_contexts: DashMap::new(),
        }
    }
}

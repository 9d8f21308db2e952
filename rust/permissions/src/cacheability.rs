//! Cache metadata carried by permission sets.
//!
//! Tags are invalidation handles, contexts are axes of variation that get
//! folded into the cache key, max-age bounds the lifetime of a cached set.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::time::Duration;

/// Maximum lifetime of a cached value.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize, Default)]
pub enum MaxAge {
    #[default]
    Permanent,
    Seconds(u64),
}

impl MaxAge {
    /// The more restrictive of the two. `Permanent` is the identity.
    pub fn merge(self, other: MaxAge) -> MaxAge {
        match (self, other) {
            (MaxAge::Permanent, other) | (other, MaxAge::Permanent) => other,
            (MaxAge::Seconds(a), MaxAge::Seconds(b)) => MaxAge::Seconds(a.min(b)),
        }
    }

    /// `Seconds(0)` values must not be stored.
    pub fn is_cacheable(self) -> bool {
        self != MaxAge::Seconds(0)
    }

    pub fn as_duration(self) -> Option<Duration> {
        match self {
            MaxAge::Permanent => None,
            MaxAge::Seconds(s) => Some(Duration::from_secs(s)),
        }
    }
}

#[derive(Debug, Clone, Eq, PartialEq, Default, Serialize, Deserialize)]
pub struct CacheMetadata {
    tags: BTreeSet<String>,
    contexts: BTreeSet<String>,
    max_age: MaxAge,
}

impl CacheMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tags(mut self, tags: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.add_tags(tags);
        self
    }

    pub fn with_contexts(mut self, contexts: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.add_contexts(contexts);
        self
    }

    pub fn with_max_age(mut self, max_age: MaxAge) -> Self {
        self.max_age = max_age;
        self
    }

    pub fn tags(&self) -> &BTreeSet<String> {
        &self.tags
    }

    pub fn contexts(&self) -> &BTreeSet<String> {
        &self.contexts
    }

    pub fn max_age(&self) -> MaxAge {
        self.max_age
    }

    pub fn add_tags(&mut self, tags: impl IntoIterator<Item = impl Into<String>>) {
        self.tags.extend(tags.into_iter().map(Into::into));
    }

    pub fn add_contexts(&mut self, contexts: impl IntoIterator<Item = impl Into<String>>) {
        self.contexts.extend(contexts.into_iter().map(Into::into));
    }

    pub fn merge_max_age(&mut self, max_age: MaxAge) {
        self.max_age = self.max_age.merge(max_age);
    }

    pub fn clear_contexts(&mut self) {
        self.contexts.clear();
    }

    /// Fold `other` in: union of tags and contexts, most restrictive max-age.
    pub fn merge(&mut self, other: &CacheMetadata) {
        self.tags.extend(other.tags.iter().cloned());
        self.contexts.extend(other.contexts.iter().cloned());
        self.merge_max_age(other.max_age);
    }

    pub fn has_any_tag<'a>(&self, tags: impl IntoIterator<Item = &'a str>) -> bool {
        tags.into_iter().any(|t| self.tags.contains(t))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn max_age_takes_most_restrictive() {
        assert_eq!(MaxAge::Permanent.merge(MaxAge::Permanent), MaxAge::Permanent);
        assert_eq!(MaxAge::Permanent.merge(MaxAge::Seconds(30)), MaxAge::Seconds(30));
        assert_eq!(MaxAge::Seconds(30).merge(MaxAge::Permanent), MaxAge::Seconds(30));
        assert_eq!(MaxAge::Seconds(30).merge(MaxAge::Seconds(10)), MaxAge::Seconds(10));
        assert!(!MaxAge::Seconds(0).is_cacheable());
        assert!(MaxAge::Permanent.is_cacheable());
    }

    #[test]
    fn merge_unions_tags_and_contexts() {
        let mut a = CacheMetadata::new()
            .with_tags(["a"])
            .with_contexts(["user"])
            .with_max_age(MaxAge::Seconds(60));
        let b = CacheMetadata::new()
            .with_tags(["b", "a"])
            .with_contexts(["user.roles"]);
        a.merge(&b);
        assert_eq!(a.tags().len(), 2);
        assert_eq!(a.contexts().len(), 2);
        assert_eq!(a.max_age(), MaxAge::Seconds(60));
        assert!(a.has_any_tag(["zzz", "b"]));
        assert!(!a.has_any_tag(["zzz"]));
    }
}

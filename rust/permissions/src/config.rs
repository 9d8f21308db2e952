//! Cache configuration.
//!
//! ```json
//! { "fast_capacity": 4096, "persistent_path": "/var/lib/app/permissions.redb" }
//! ```
//!
//! Both keys are optional. Without `persistent_path` the persistent tier is
//! disabled.

use serde::Deserialize;
use std::path::PathBuf;

use crate::cache::DEFAULT_CAPACITY;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CacheConfig {
    /// Maximum number of sets held by the fast tier.
    pub fast_capacity: usize,
    /// redb file backing the persistent tier.
    pub persistent_path: Option<PathBuf>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            fast_capacity: DEFAULT_CAPACITY,
            persistent_path: None,
        }
    }
}

/// Parse a cache config from a JSON string.
pub fn parse_cache_config(json: &str) -> Result<CacheConfig, serde_json::Error> {
    serde_json::from_str(json)
}

use thiserror::Error;

use crate::cache::CacheError;
use crate::types::Identifier;

#[derive(Error, Debug)]
pub enum PermissionError {
    #[error("cannot merge item ({left_scope}, {left_id}) with item ({right_scope}, {right_id})")]
    ItemMismatch {
        left_scope: String,
        left_id: Identifier,
        right_scope: String,
        right_id: Identifier,
    },

    #[error("unknown cache context: {0}")]
    UnknownCacheContext(String),

    #[error("failed to encode cache context value: {0}")]
    ContextEncoding(#[from] serde_json::Error),

    /// A lookup collaborator (membership loader, role source, ...) failed.
    #[error("lookup failed: {source}")]
    Lookup {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("cache error: {0}")]
    Cache(#[from] CacheError),
}

impl PermissionError {
    /// Wrap a collaborator failure.
    pub fn lookup(source: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        PermissionError::Lookup {
            source: source.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, PermissionError>;

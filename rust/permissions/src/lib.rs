//! `permissions`: scoped permission calculation.
//!
//! Computes the effective permission set of an account within a scope by
//! running an ordered list of calculators, merging their output with
//! admin-override semantics, and caching the result in two tiers.
//!
//! Modules:
//! - `types`: identifiers and the account (actor) type
//! - `item`: `PermissionItem`, the (scope, identifier) grant value
//! - `cacheability`: cache tags / contexts / max-age carried by sets
//! - `set`: refinable builder and frozen `PermissionSet` snapshot
//! - `calculator`: the `PermissionCalculator` capability
//! - `context`: cache-context resolution and the ambient account switch
//! - `cache`: `CacheStore` tiers (memory, null, redb)
//! - `chain`: `CalculatorChain`, the caching aggregator
//! - `checker`: `PermissionChecker` yes/no façade
//! - `config`: cache configuration parsing

pub mod cache;
pub mod cacheability;
pub mod calculator;
pub mod chain;
pub mod checker;
pub mod config;
pub mod context;
pub mod error;
pub mod item;
pub mod set;
pub mod types;

pub use cacheability::{CacheMetadata, MaxAge};
pub use calculator::PermissionCalculator;
pub use chain::{CalculatorChain, CalculatorChainBuilder, PERMISSIONS_CACHE_TAG};
pub use checker::PermissionChecker;
pub use error::{PermissionError, Result};
pub use item::PermissionItem;
pub use set::{PermissionSet, RefinablePermissionSet};
pub use types::{Account, Identifier};

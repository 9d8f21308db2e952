//! The permission calculator capability.

use std::collections::BTreeSet;

use crate::error::Result;
use crate::set::RefinablePermissionSet;
use crate::types::Account;

/// Computes permissions for an account from one authoritative source.
///
/// A calculator only produces items for the scopes it understands. For any
/// other scope it returns [`PermissionCalculator::empty_for`].
///
/// # Persistent cache contexts
///
/// Every set a calculator returns for a scope must carry the contexts from
/// [`PermissionCalculator::persistent_cache_contexts`], whether or not this
/// particular invocation varied by them. The chain builds its cache key from
/// these declarations before any calculator runs; a context that matters but
/// is only declared conditionally lets one account's permissions be served
/// to another.
pub trait PermissionCalculator: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &str;

    fn calculate(&self, account: &Account, scope: &str) -> Result<RefinablePermissionSet>;

    /// Contexts that always apply to the given scope.
    fn persistent_cache_contexts(&self, _scope: &str) -> BTreeSet<String> {
        BTreeSet::new()
    }

    /// Refine the merged result of all calculators before it is cached.
    fn alter(
        &self,
        _account: &Account,
        _scope: &str,
        _permissions: &mut RefinablePermissionSet,
    ) -> Result<()> {
        Ok(())
    }

    /// Empty set tagged with this calculator's persistent contexts.
    fn empty_for(&self, scope: &str) -> RefinablePermissionSet {
        let mut set = RefinablePermissionSet::new();
        set.add_cache_contexts(self.persistent_cache_contexts(scope));
        set
    }
}

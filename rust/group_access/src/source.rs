//! Lookup collaborators the group calculators depend on.
//!
//! Implementations wrap whatever storage the host uses. Failures are
//! reported as [`PermissionError::Lookup`](permissions::PermissionError)
//! and propagate through the chain uncached.

use permissions::{Account, Result};
use std::collections::BTreeSet;

use crate::model::{Group, GroupRole, Membership};
use crate::scope::GroupScope;

pub trait MembershipLoader: Send + Sync {
    /// Every membership of `account`.
    fn load_by_account(&self, account: &Account) -> Result<Vec<Membership>>;

    /// The membership of `account` in `group`, if any.
    fn load(&self, group: &Group, account: &Account) -> Result<Option<Membership>>;
}

pub trait SynchronizedRoleSource: Send + Sync {
    /// Roles in `scope` synchronized from any of `global_roles`.
    fn load_synchronized(
        &self,
        global_roles: &BTreeSet<String>,
        scope: GroupScope,
    ) -> Result<Vec<GroupRole>>;
}

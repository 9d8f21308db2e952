//! Calculators for the group scopes.

use permissions::context::{USER_CONTEXT, USER_ROLES_CONTEXT};
use permissions::{Account, PermissionCalculator, PermissionItem, RefinablePermissionSet, Result};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::debug;

use crate::model::{membership_list_tag, GROUP_ROLE_LIST_TAG};
use crate::scope::GroupScope;
use crate::source::{MembershipLoader, SynchronizedRoleSource};

fn synchronized_scope(scope: &str) -> Option<GroupScope> {
    scope.parse::<GroupScope>().ok().filter(|s| s.is_synchronized())
}

// ============================================================================
// Synchronized roles (outsider / insider)
// ============================================================================

/// Grants derived from the account's global roles, keyed by group type.
pub struct SynchronizedRoleCalculator {
    roles: Arc<dyn SynchronizedRoleSource>,
}

impl SynchronizedRoleCalculator {
    pub fn new(roles: Arc<dyn SynchronizedRoleSource>) -> Self {
        Self { roles }
    }
}

impl PermissionCalculator for SynchronizedRoleCalculator {
    fn name(&self) -> &str {
        "synchronized_roles"
    }

    fn calculate(&self, account: &Account, scope: &str) -> Result<RefinablePermissionSet> {
        let mut set = self.empty_for(scope);
        let Some(group_scope) = synchronized_scope(scope) else {
            return Ok(set);
        };

        // New roles can start matching the account at any time.
        set.add_cache_tags([GROUP_ROLE_LIST_TAG]);

        let roles = self.roles.load_synchronized(&account.roles, group_scope)?;
        debug!(
            "{} synchronized {} role(s) in scope {}",
            account.id,
            roles.len(),
            scope
        );
        for role in roles {
            let item = PermissionItem::new(
                scope,
                role.group_type.clone(),
                role.permissions.iter().cloned(),
                role.admin,
            );
            set.add_item(item, false)?;
            set.add_cache_tags([role.cache_tag()]);
        }
        Ok(set)
    }

    fn persistent_cache_contexts(&self, scope: &str) -> BTreeSet<String> {
        match synchronized_scope(scope) {
            Some(_) => BTreeSet::from([USER_ROLES_CONTEXT.to_string()]),
            None => BTreeSet::new(),
        }
    }
}

// ============================================================================
// Individual memberships
// ============================================================================

/// Grants from roles assigned on the account's memberships, keyed by group ID.
pub struct IndividualMembershipCalculator {
    memberships: Arc<dyn MembershipLoader>,
}

impl IndividualMembershipCalculator {
    pub fn new(memberships: Arc<dyn MembershipLoader>) -> Self {
        Self { memberships }
    }
}

impl PermissionCalculator for IndividualMembershipCalculator {
    fn name(&self) -> &str {
        "individual_memberships"
    }

    fn calculate(&self, account: &Account, scope: &str) -> Result<RefinablePermissionSet> {
        let mut set = self.empty_for(scope);
        if scope != GroupScope::Individual.as_str() {
            return Ok(set);
        }

        set.add_cache_tags([membership_list_tag(&account.id)]);

        let memberships = self.memberships.load_by_account(account)?;
        debug!("{} has {} membership(s)", account.id, memberships.len());
        for membership in &memberships {
            set.add_cache_tags([membership.cache_tag()]);
            for role in membership.individual_roles() {
                let item = PermissionItem::new(
                    scope,
                    membership.group.id.clone(),
                    role.permissions.iter().cloned(),
                    role.admin,
                );
                set.add_item(item, false)?;
                set.add_cache_tags([role.cache_tag()]);
            }
        }
        Ok(set)
    }

    fn persistent_cache_contexts(&self, scope: &str) -> BTreeSet<String> {
        if scope == GroupScope::Individual.as_str() {
            BTreeSet::from([USER_CONTEXT.to_string()])
        } else {
            BTreeSet::new()
        }
    }
}

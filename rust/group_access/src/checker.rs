use permissions::{Account, PermissionSet, Result};
use std::sync::Arc;
use tracing::warn;

use crate::aggregate::GroupPermissionCalculator;
use crate::model::Group;
use crate::scope::GroupScope;
use crate::source::MembershipLoader;

/// Answers "may `account` do `permission` in `group`?".
///
/// Individual grants on the group are consulted first and win. Otherwise
/// members are checked against insider grants for the group type and
/// everyone else against outsider grants.
#[derive(Clone)]
pub struct GroupPermissionChecker {
    calculator: GroupPermissionCalculator,
    memberships: Arc<dyn MembershipLoader>,
}

impl GroupPermissionChecker {
    pub fn new(calculator: GroupPermissionCalculator, memberships: Arc<dyn MembershipLoader>) -> Self {
        Self {
            calculator,
            memberships,
        }
    }

    pub fn has_permission_in_group(
        &self,
        permission: &str,
        account: &Account,
        group: &Group,
    ) -> Result<bool> {
        let permissions = self.calculator.calculate_full_permissions(account)?;

        if grants(&permissions, GroupScope::Individual, group, permission) {
            return Ok(true);
        }

        let scope = match self.memberships.load(group, account)? {
            Some(_) => GroupScope::Insider,
            None => GroupScope::Outsider,
        };
        Ok(grants(&permissions, scope, group, permission))
    }

    /// Like [`has_permission_in_group`](Self::has_permission_in_group), with
    /// any error logged and treated as denied.
    pub fn is_granted(&self, permission: &str, account: &Account, group: &Group) -> bool {
        match self.has_permission_in_group(permission, account, group) {
            Ok(granted) => granted,
            Err(e) => {
                warn!(
                    "permission check {} for {} in group {} failed, denying: {}",
                    permission, account.id, group.id, e
                );
                false
            }
        }
    }
}

fn grants(permissions: &PermissionSet, scope: GroupScope, group: &Group, permission: &str) -> bool {
    let identifier = match scope {
        GroupScope::Individual => &group.id,
        GroupScope::Outsider | GroupScope::Insider => &group.group_type,
    };
    permissions
        .item(scope.as_str(), identifier)
        .is_some_and(|item| item.has_permission(permission))
}

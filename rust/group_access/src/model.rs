//! Groups, group roles and memberships, as seen by the calculators.

use permissions::Identifier;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::scope::GroupScope;

/// Tag on every set derived from the list of group roles.
pub const GROUP_ROLE_LIST_TAG: &str = "group_role_list";

/// Tag on every individual set of `account`; invalidate it when the
/// account joins or leaves a group.
pub fn membership_list_tag(account: &Identifier) -> String {
    format!("group_membership_list:{account}")
}

#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct Group {
    pub id: Identifier,
    pub group_type: Identifier,
    #[serde(default)]
    pub label: Option<String>,
}

impl Group {
    pub fn new(id: impl Into<Identifier>, group_type: impl Into<Identifier>) -> Self {
        Self {
            id: id.into(),
            group_type: group_type.into(),
            label: None,
        }
    }
}

/// A role defined on a group type.
///
/// Synchronized roles (outsider/insider) name the `global_role` they are
/// granted through. Individual roles are assigned per membership.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct GroupRole {
    pub id: String,
    pub group_type: Identifier,
    pub scope: GroupScope,
    #[serde(default)]
    pub global_role: Option<String>,
    #[serde(default)]
    pub admin: bool,
    #[serde(default)]
    pub permissions: BTreeSet<String>,
}

impl GroupRole {
    pub fn cache_tag(&self) -> String {
        format!("group_role:{}", self.id)
    }
}

/// An account's membership in one group with its assigned roles.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct Membership {
    pub id: Identifier,
    pub group: Group,
    pub account: Identifier,
    pub roles: Vec<GroupRole>,
}

impl Membership {
    pub fn cache_tag(&self) -> String {
        format!("group_membership:{}", self.id)
    }

    /// Roles that grant in the individual scope.
    pub fn individual_roles(&self) -> impl Iterator<Item = &GroupRole> {
        self.roles
            .iter()
            .filter(|role| role.scope == GroupScope::Individual)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_tags() {
        let role = GroupRole {
            id: "club-editor".into(),
            group_type: "club".into(),
            scope: GroupScope::Individual,
            global_role: None,
            admin: false,
            permissions: BTreeSet::new(),
        };
        assert_eq!(role.cache_tag(), "group_role:club-editor");
        assert_eq!(
            membership_list_tag(&Identifier::from(42u64)),
            "group_membership_list:42"
        );

        let membership = Membership {
            id: 5u64.into(),
            group: Group::new(7u64, "club"),
            account: 42u64.into(),
            roles: vec![role],
        };
        assert_eq!(membership.cache_tag(), "group_membership:5");
        assert_eq!(membership.individual_roles().count(), 1);
    }

    #[test]
    fn role_defaults_from_json() {
        let json = r#"{"id":"club-outsider","group_type":"club","scope":"outsider"}"#;
        let role: GroupRole = serde_json::from_str(json).unwrap();
        assert!(!role.admin);
        assert!(role.permissions.is_empty());
        assert!(role.global_role.is_none());
    }
}

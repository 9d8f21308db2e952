//! In-memory groups, roles and memberships loaded from a JSON fixture.
//!
//! ```json
//! {
//!   "roles": [
//!     {"id": "club-outsider", "group_type": "club", "scope": "outsider",
//!      "global_role": "authenticated", "permissions": ["view"]},
//!     {"id": "club-editor", "group_type": "club", "scope": "individual",
//!      "permissions": ["edit"]}
//!   ],
//!   "groups": [{"id": "7", "group_type": "club"}],
//!   "memberships": [
//!     {"id": "1", "group": "7", "account": "42", "roles": ["club-editor"]}
//!   ]
//! }
//! ```
//!
//! Identifiers are JSON strings; canonical numeric strings become integer
//! identifiers.

use permissions::{Account, Identifier, Result};
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use tracing::debug;

use crate::error::DirectoryError;
use crate::model::{Group, GroupRole, Membership};
use crate::scope::GroupScope;
use crate::source::{MembershipLoader, SynchronizedRoleSource};

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct Fixture {
    roles: Vec<GroupRole>,
    groups: Vec<Group>,
    memberships: Vec<FixtureMembership>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct FixtureMembership {
    id: Identifier,
    group: Identifier,
    account: Identifier,
    #[serde(default)]
    roles: Vec<String>,
}

/// Implements both lookup collaborators over data held in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryDirectory {
    roles: BTreeMap<String, GroupRole>,
    groups: BTreeMap<Identifier, Group>,
    memberships: Vec<Membership>,
}

impl InMemoryDirectory {
    /// Load a fixture file.
    pub fn load<P: AsRef<Path>>(path: P) -> std::result::Result<Self, DirectoryError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Parse a fixture. Memberships must reference known groups and roles
    /// of the group's type.
    pub fn from_json(json: &str) -> std::result::Result<Self, DirectoryError> {
        let fixture: Fixture = serde_json::from_str(json)?;

        let mut directory = Self::default();
        for role in fixture.roles {
            directory.roles.insert(role.id.clone(), role);
        }
        for group in fixture.groups {
            if directory.groups.contains_key(&group.id) {
                return Err(DirectoryError::DuplicateGroup(group.id));
            }
            directory.groups.insert(group.id.clone(), group);
        }
        for raw in fixture.memberships {
            let membership = directory.resolve(raw)?;
            directory.memberships.push(membership);
        }

        debug!(
            "loaded directory: {} role(s), {} group(s), {} membership(s)",
            directory.roles.len(),
            directory.groups.len(),
            directory.memberships.len()
        );
        Ok(directory)
    }

    fn resolve(&self, raw: FixtureMembership) -> std::result::Result<Membership, DirectoryError> {
        let group = self
            .groups
            .get(&raw.group)
            .ok_or_else(|| DirectoryError::UnknownGroup {
                membership: raw.id.clone(),
                group: raw.group.clone(),
            })?;

        let mut roles = Vec::with_capacity(raw.roles.len());
        for role_id in &raw.roles {
            let role = self
                .roles
                .get(role_id)
                .ok_or_else(|| DirectoryError::UnknownRole {
                    membership: raw.id.clone(),
                    role: role_id.clone(),
                })?;
            if role.group_type != group.group_type {
                return Err(DirectoryError::RoleTypeMismatch {
                    role: role.id.clone(),
                    role_type: role.group_type.clone(),
                    group: group.id.clone(),
                    group_type: group.group_type.clone(),
                });
            }
            roles.push(role.clone());
        }

        Ok(Membership {
            id: raw.id,
            group: group.clone(),
            account: raw.account,
            roles,
        })
    }

    pub fn group(&self, id: &Identifier) -> Option<&Group> {
        self.groups.get(id)
    }

    pub fn groups(&self) -> impl Iterator<Item = &Group> {
        self.groups.values()
    }

    pub fn role(&self, id: &str) -> Option<&GroupRole> {
        self.roles.get(id)
    }

    pub fn memberships(&self) -> &[Membership] {
        &self.memberships
    }
}

impl MembershipLoader for InMemoryDirectory {
    fn load_by_account(&self, account: &Account) -> Result<Vec<Membership>> {
        Ok(self
            .memberships
            .iter()
            .filter(|m| m.account == account.id)
            .cloned()
            .collect())
    }

    fn load(&self, group: &Group, account: &Account) -> Result<Option<Membership>> {
        Ok(self
            .memberships
            .iter()
            .find(|m| m.account == account.id && m.group.id == group.id)
            .cloned())
    }
}

impl SynchronizedRoleSource for InMemoryDirectory {
    fn load_synchronized(
        &self,
        global_roles: &BTreeSet<String>,
        scope: GroupScope,
    ) -> Result<Vec<GroupRole>> {
        Ok(self
            .roles
            .values()
            .filter(|role| role.scope == scope)
            .filter(|role| {
                role.global_role
                    .as_ref()
                    .is_some_and(|global| global_roles.contains(global))
            })
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FIXTURE: &str = r#"{
        "roles": [
            {"id": "club-outsider", "group_type": "club", "scope": "outsider",
             "global_role": "authenticated", "permissions": ["view"]},
            {"id": "club-editor", "group_type": "club", "scope": "individual",
             "permissions": ["edit"]},
            {"id": "team-admin", "group_type": "team", "scope": "individual", "admin": true}
        ],
        "groups": [
            {"id": "7", "group_type": "club", "label": "Chess club"},
            {"id": "8", "group_type": "team"}
        ],
        "memberships": [
            {"id": "1", "group": "7", "account": "42", "roles": ["club-editor"]}
        ]
    }"#;

    #[test]
    fn loads_and_resolves_memberships() {
        let directory = InMemoryDirectory::from_json(FIXTURE).unwrap();
        let group = directory.group(&Identifier::int(7)).unwrap();
        assert_eq!(group.label.as_deref(), Some("Chess club"));

        let member = Account::authenticated(42u64, Vec::<String>::new());
        let memberships = directory.load_by_account(&member).unwrap();
        assert_eq!(memberships.len(), 1);
        assert_eq!(memberships[0].roles[0].id, "club-editor");
        assert!(directory.load(group, &member).unwrap().is_some());

        let stranger = Account::authenticated(43u64, Vec::<String>::new());
        assert!(directory.load(group, &stranger).unwrap().is_none());

        assert_eq!(directory.memberships().len(), 1);
        assert_eq!(directory.memberships()[0].group.id, group.id);
        assert!(directory.role("team-admin").unwrap().admin);
        assert!(directory.role("missing").is_none());
    }

    #[test]
    fn synchronized_roles_match_global_roles() {
        let directory = InMemoryDirectory::from_json(FIXTURE).unwrap();
        let authenticated = BTreeSet::from(["authenticated".to_string()]);
        let roles = directory
            .load_synchronized(&authenticated, GroupScope::Outsider)
            .unwrap();
        assert_eq!(roles.len(), 1);
        assert!(directory
            .load_synchronized(&authenticated, GroupScope::Insider)
            .unwrap()
            .is_empty());
        let anonymous = BTreeSet::from(["anonymous".to_string()]);
        assert!(directory
            .load_synchronized(&anonymous, GroupScope::Outsider)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn rejects_dangling_references() {
        let unknown_group = r#"{"memberships": [{"id": "1", "group": "9", "account": "1"}]}"#;
        assert!(matches!(
            InMemoryDirectory::from_json(unknown_group),
            Err(DirectoryError::UnknownGroup { .. })
        ));

        let unknown_role = r#"{
            "groups": [{"id": "7", "group_type": "club"}],
            "memberships": [{"id": "1", "group": "7", "account": "1", "roles": ["nope"]}]
        }"#;
        assert!(matches!(
            InMemoryDirectory::from_json(unknown_role),
            Err(DirectoryError::UnknownRole { .. })
        ));

        let wrong_type = r#"{
            "roles": [{"id": "team-admin", "group_type": "team", "scope": "individual"}],
            "groups": [{"id": "7", "group_type": "club"}],
            "memberships": [{"id": "1", "group": "7", "account": "1", "roles": ["team-admin"]}]
        }"#;
        assert!(matches!(
            InMemoryDirectory::from_json(wrong_type),
            Err(DirectoryError::RoleTypeMismatch { .. })
        ));
    }

    #[test]
    fn load_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("directory.json");
        std::fs::write(&path, FIXTURE).unwrap();
        let directory = InMemoryDirectory::load(&path).unwrap();
        assert_eq!(directory.groups().count(), 2);
        assert!(matches!(
            InMemoryDirectory::load(dir.path().join("missing.json")),
            Err(DirectoryError::Io(_))
        ));
    }
}

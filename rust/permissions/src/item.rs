//! Permission item: the grant for one (scope, identifier) pair.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::error::{PermissionError, Result};
use crate::types::Identifier;

/// "Within `scope`, for `identifier`, these permissions (or everything) apply."
///
/// Immutable once built. An admin item never enumerates permissions: the
/// set is emptied on construction because admin already grants everything.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(from = "StoredItem")]
pub struct PermissionItem {
    scope: String,
    identifier: Identifier,
    permissions: BTreeSet<String>,
    is_admin: bool,
}

/// Wire form; decoding goes through [`PermissionItem::new`].
#[derive(Deserialize)]
struct StoredItem {
    scope: String,
    identifier: Identifier,
    permissions: BTreeSet<String>,
    is_admin: bool,
}

impl From<StoredItem> for PermissionItem {
    fn from(raw: StoredItem) -> Self {
        PermissionItem::new(raw.scope, raw.identifier, raw.permissions, raw.is_admin)
    }
}

impl PermissionItem {
    /// Build an item. Duplicate permission names collapse.
    pub fn new(
        scope: impl Into<String>,
        identifier: impl Into<Identifier>,
        permissions: impl IntoIterator<Item = impl Into<String>>,
        is_admin: bool,
    ) -> Self {
        let permissions = if is_admin {
            BTreeSet::new()
        } else {
            permissions.into_iter().map(Into::into).collect()
        };
        Self {
            scope: scope.into(),
            identifier: identifier.into(),
            permissions,
            is_admin,
        }
    }

    /// An admin item for (scope, identifier).
    pub fn admin(scope: impl Into<String>, identifier: impl Into<Identifier>) -> Self {
        Self::new(scope, identifier, std::iter::empty::<String>(), true)
    }

    pub fn scope(&self) -> &str {
        &self.scope
    }

    pub fn identifier(&self) -> &Identifier {
        &self.identifier
    }

    pub fn permissions(&self) -> &BTreeSet<String> {
        &self.permissions
    }

    pub fn is_admin(&self) -> bool {
        self.is_admin
    }

    /// Admin grants everything; otherwise the name must be enumerated.
    pub fn has_permission(&self, permission: &str) -> bool {
        self.is_admin || self.permissions.contains(permission)
    }

    /// Merge with another item for the same (scope, identifier).
    ///
    /// Admin flags OR together; permissions union unless the result is
    /// admin. Commutative and associative.
    pub fn merge(&self, other: &PermissionItem) -> Result<PermissionItem> {
        if self.scope != other.scope || self.identifier != other.identifier {
            return Err(PermissionError::ItemMismatch {
                left_scope: self.scope.clone(),
                left_id: self.identifier.clone(),
                right_scope: other.scope.clone(),
                right_id: other.identifier.clone(),
            });
        }

        let is_admin = self.is_admin || other.is_admin;
        let permissions = self.permissions.union(&other.permissions).cloned();
        Ok(PermissionItem::new(
            self.scope.clone(),
            self.identifier.clone(),
            permissions,
            is_admin,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn item(perms: &[&str], admin: bool) -> PermissionItem {
        PermissionItem::new("s", "foo", perms.iter().copied(), admin)
    }

    #[test]
    fn decoding_applies_admin_invariant() {
        let json = r#"{"scope":"s","identifier":"foo","permissions":["bar"],"is_admin":true}"#;
        let decoded: PermissionItem = serde_json::from_str(json).unwrap();
        assert!(decoded.is_admin());
        assert!(decoded.permissions().is_empty());
        assert_eq!(decoded, PermissionItem::admin("s", "foo"));

        let plain = item(&["bar"], false);
        let bytes = bincode::serialize(&plain).unwrap();
        assert_eq!(bincode::deserialize::<PermissionItem>(&bytes).unwrap(), plain);
    }

    #[test]
    fn duplicates_collapse() {
        let it = item(&["bar", "baz", "bar"], false);
        let expected: BTreeSet<String> = ["bar", "baz"].iter().map(|s| s.to_string()).collect();
        assert_eq!(it.permissions(), &expected);
    }

    #[test]
    fn admin_drops_enumerated_permissions() {
        let it = item(&["bar"], true);
        assert!(it.is_admin());
        assert!(it.permissions().is_empty());
        assert!(it.has_permission("anything at all"));
    }

    #[test]
    fn merge_unions_permissions() {
        let merged = item(&["bar"], false).merge(&item(&["baz"], false)).unwrap();
        assert!(!merged.is_admin());
        assert!(merged.has_permission("bar"));
        assert!(merged.has_permission("baz"));
        assert_eq!(merged.permissions().len(), 2);
    }

    #[test]
    fn merge_with_admin_is_admin() {
        let merged = item(&["bar"], false).merge(&item(&["baz"], true)).unwrap();
        assert!(merged.is_admin());
        assert!(merged.permissions().is_empty());
    }

    #[test]
    fn merge_rejects_other_key() {
        let a = PermissionItem::new("s", "foo", ["bar"], false);
        let b = PermissionItem::new("s", "other", ["bar"], false);
        assert!(matches!(
            a.merge(&b),
            Err(PermissionError::ItemMismatch { .. })
        ));
        let c = PermissionItem::new("t", "foo", ["bar"], false);
        assert!(a.merge(&c).is_err());
    }

    fn arb_item() -> impl Strategy<Value = PermissionItem> {
        (
            proptest::collection::vec("[a-e]{1,2}", 0..6),
            any::<bool>(),
        )
            .prop_map(|(perms, admin)| PermissionItem::new("s", "foo", perms, admin))
    }

    proptest! {
        #[test]
        fn merge_is_commutative(a in arb_item(), b in arb_item()) {
            prop_assert_eq!(a.merge(&b).unwrap(), b.merge(&a).unwrap());
        }

        #[test]
        fn merge_is_associative(a in arb_item(), b in arb_item(), c in arb_item()) {
            let left = a.merge(&b).unwrap().merge(&c).unwrap();
            let right = a.merge(&b.merge(&c).unwrap()).unwrap();
            prop_assert_eq!(left, right);
        }

        #[test]
        fn merge_admin_is_or(a in arb_item(), b in arb_item()) {
            let merged = a.merge(&b).unwrap();
            prop_assert_eq!(merged.is_admin(), a.is_admin() || b.is_admin());
            if merged.is_admin() {
                prop_assert!(merged.permissions().is_empty());
            } else {
                let union: BTreeSet<String> =
                    a.permissions().union(b.permissions()).cloned().collect();
                prop_assert_eq!(merged.permissions(), &union);
            }
        }

        #[test]
        fn admin_items_never_enumerate(perms in proptest::collection::vec("[a-z]{1,4}", 0..8)) {
            let it = PermissionItem::new("s", 1u64, perms, true);
            prop_assert!(it.permissions().is_empty());
        }
    }
}

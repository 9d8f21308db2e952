//! Domain types shared across the permissions modules.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Role every anonymous account carries.
pub const ANONYMOUS_ROLE: &str = "anonymous";

/// Role every authenticated account carries.
pub const AUTHENTICATED_ROLE: &str = "authenticated";

/// Key of a grant within a scope: a group-type ID, a group ID, ...
///
/// Canonical numeric strings normalize to integers, so `"42"` and `42` name
/// the same key. Every constructor normalizes, which keeps equality stable
/// across a round trip through the string form used for serialization.
#[derive(Debug, Clone, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub struct Identifier(Repr);

#[derive(Debug, Clone, Hash, Eq, PartialEq, Ord, PartialOrd)]
enum Repr {
    Int(u64),
    Str(String),
}

impl Identifier {
    pub const fn int(n: u64) -> Self {
        Identifier(Repr::Int(n))
    }

    /// Numeric form, if this identifier is an integer.
    pub fn as_int(&self) -> Option<u64> {
        match &self.0 {
            Repr::Int(n) => Some(*n),
            Repr::Str(_) => None,
        }
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            Repr::Int(n) => write!(f, "{n}"),
            Repr::Str(s) => f.write_str(s),
        }
    }
}

impl From<u64> for Identifier {
    fn from(n: u64) -> Self {
        Identifier::int(n)
    }
}

impl From<String> for Identifier {
    fn from(s: String) -> Self {
        // Only canonical renderings become integers ("042" stays a string).
        match s.parse::<u64>() {
            Ok(n) if n.to_string() == s => Identifier::int(n),
            _ => Identifier(Repr::Str(s)),
        }
    }
}

impl From<&str> for Identifier {
    fn from(s: &str) -> Self {
        Identifier::from(s.to_string())
    }
}

impl From<Identifier> for String {
    fn from(id: Identifier) -> Self {
        match id.0 {
            Repr::Int(n) => n.to_string(),
            Repr::Str(s) => s,
        }
    }
}

/// The actor permissions are calculated for.
///
/// Only the ID and global role names are modelled; memberships and group
/// roles come from the lookup collaborators.
#[derive(Debug, Clone, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub id: Identifier,
    pub roles: BTreeSet<String>,
}

impl Account {
    pub fn new(id: impl Into<Identifier>, roles: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            id: id.into(),
            roles: roles.into_iter().map(Into::into).collect(),
        }
    }

    /// The anonymous account: ID 0 with only the anonymous role.
    pub fn anonymous() -> Self {
        Self::new(0u64, [ANONYMOUS_ROLE])
    }

    /// An authenticated account; the authenticated role is always added.
    pub fn authenticated(
        id: impl Into<Identifier>,
        roles: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        let mut account = Self::new(id, roles);
        account.roles.insert(AUTHENTICATED_ROLE.to_string());
        account
    }

    pub fn is_anonymous(&self) -> bool {
        self.id == Identifier::int(0)
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.contains(role)
    }
}

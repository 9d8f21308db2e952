use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Non-members, keyed by group type.
pub const OUTSIDER_ID: &str = "outsider";

/// Members, keyed by group type.
pub const INSIDER_ID: &str = "insider";

/// Roles on a single membership, keyed by group ID.
pub const INDIVIDUAL_ID: &str = "individual";

/// Permission scopes of the group domain.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupScope {
    Outsider,
    Insider,
    Individual,
}

impl GroupScope {
    pub const ALL: [GroupScope; 3] = [GroupScope::Outsider, GroupScope::Insider, GroupScope::Individual];

    pub fn as_str(self) -> &'static str {
        match self {
            GroupScope::Outsider => OUTSIDER_ID,
            GroupScope::Insider => INSIDER_ID,
            GroupScope::Individual => INDIVIDUAL_ID,
        }
    }

    /// Whether grants in this scope derive from global roles.
    pub fn is_synchronized(self) -> bool {
        matches!(self, GroupScope::Outsider | GroupScope::Insider)
    }
}

impl fmt::Display for GroupScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GroupScope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            OUTSIDER_ID => Ok(GroupScope::Outsider),
            INSIDER_ID => Ok(GroupScope::Insider),
            INDIVIDUAL_ID => Ok(GroupScope::Individual),
            other => Err(format!("unknown group scope: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_and_display() {
        for scope in GroupScope::ALL {
            assert_eq!(scope.as_str().parse::<GroupScope>().unwrap(), scope);
        }
        assert!("member".parse::<GroupScope>().is_err());
        assert!(GroupScope::Insider.is_synchronized());
        assert!(!GroupScope::Individual.is_synchronized());
    }

    #[test]
    fn serde_uses_scope_ids() {
        let json = serde_json::to_string(&GroupScope::Individual).unwrap();
        assert_eq!(json, r#""individual""#);
    }
}

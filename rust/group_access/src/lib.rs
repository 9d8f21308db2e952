//! `group_access`: group permissions on top of the `permissions` engine.
//!
//! Three scopes partition group grants:
//!
//! - `outsider`: accounts that are not members of the group, by group type
//! - `insider`: members of the group, by group type
//! - `individual`: roles assigned on one membership, by group ID
//!
//! Outsider and insider grants are synchronized from global roles
//! ([`SynchronizedRoleCalculator`]); individual grants come from the
//! account's memberships ([`IndividualMembershipCalculator`]).
//! [`GroupPermissionChecker`] combines them, consulting individual grants
//! first.

pub mod aggregate;
pub mod calculator;
pub mod checker;
pub mod directory;
pub mod error;
pub mod model;
pub mod scope;
pub mod source;

pub use aggregate::{group_calculator_chain, GroupPermissionCalculator};
pub use calculator::{IndividualMembershipCalculator, SynchronizedRoleCalculator};
pub use checker::GroupPermissionChecker;
pub use directory::InMemoryDirectory;
pub use error::DirectoryError;
pub use model::{Group, GroupRole, Membership};
pub use scope::GroupScope;
pub use source::{MembershipLoader, SynchronizedRoleSource};

use permissions::Identifier;
use thiserror::Error;

/// Errors loading an [`InMemoryDirectory`](crate::InMemoryDirectory).
#[derive(Error, Debug)]
pub enum DirectoryError {
    #[error("failed to read directory fixture: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid directory fixture: {0}")]
    Json(#[from] serde_json::Error),

    #[error("duplicate group {0}")]
    DuplicateGroup(Identifier),

    #[error("membership {membership} references unknown group {group}")]
    UnknownGroup {
        membership: Identifier,
        group: Identifier,
    },

    #[error("membership {membership} references unknown role {role}")]
    UnknownRole { membership: Identifier, role: String },

    #[error("role {role} is for group type {role_type}, but group {group} is a {group_type}")]
    RoleTypeMismatch {
        role: String,
        role_type: Identifier,
        group: Identifier,
        group_type: Identifier,
    },
}

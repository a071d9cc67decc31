//! Domain error types for permission resolution.

use thiserror::Error;

use crate::model::GroupId;

/// Domain-specific errors.
///
/// Resolution itself never fails for missing data: an absent group, role,
/// membership or override resolves to "no permission". Errors only surface
/// for collaborator faults and for rejected writes.
#[derive(Debug, Error)]
pub enum DomainError {
    /// A storage collaborator failed.
    #[error("storage error: {message}")]
    StorageError { message: String },

    /// A cache backend failed.
    #[error("cache error: {message}")]
    CacheError { message: String },

    /// Group not found.
    #[error("group not found: {group_id}")]
    GroupNotFound { group_id: GroupId },

    /// Group type not found.
    #[error("group type not found: {group_type}")]
    GroupTypeNotFound { group_type: String },

    /// Override failed validation.
    #[error("invalid permission override: {message}")]
    InvalidOverride { message: String },

    /// A second override was about to be created for the same group.
    #[error("a permission override already exists for group {group_id}")]
    DuplicateOverride { group_id: GroupId },

    /// The acting account may not perform the operation.
    #[error("access denied for operation '{operation}'")]
    AccessDenied { operation: String },
}

/// Result type for domain operations.
pub type DomainResult<T> = Result<T, DomainError>;

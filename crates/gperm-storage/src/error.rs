//! Storage error types.

use thiserror::Error;

/// Storage-specific errors.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Group not found.
    #[error("group not found: {group_id}")]
    GroupNotFound { group_id: u64 },

    /// Group type not found.
    #[error("group type not found: {group_type}")]
    GroupTypeNotFound { group_type: String },

    /// Override not found.
    #[error("permission override not found: {override_id}")]
    OverrideNotFound { override_id: u64 },

    /// A group can hold at most one override.
    #[error("permission override already exists for group {group_id}")]
    DuplicateOverride { group_id: u64 },

    /// Invalid input error.
    #[error("invalid input: {message}")]
    InvalidInput { message: String },

    /// Serialization error.
    #[error("serialization error: {message}")]
    SerializationError { message: String },

    /// Internal error.
    #[error("internal storage error: {message}")]
    InternalError { message: String },
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::SerializationError {
            message: err.to_string(),
        }
    }
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

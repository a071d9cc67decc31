//! Storage trait definitions and stored record types.

use std::collections::{BTreeMap, BTreeSet};

use crate::error::{StorageError, StorageResult};

/// A stored permission override: role id -> permission strings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredOverride {
    pub id: u64,
    pub group_id: u64,
    pub permissions: BTreeMap<String, Vec<String>>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

/// A stored group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredGroup {
    pub id: u64,
    pub group_type: String,
    pub label: String,
}

/// A stored group type. Its member roles are the stored roles of the type
/// with scope `member`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredGroupType {
    pub id: String,
    pub anonymous_role: String,
    pub outsider_role: String,
}

/// A stored group role.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredRole {
    pub id: String,
    pub group_type: String,
    /// One of `anonymous`, `outsider`, `member`.
    pub scope: String,
    pub permissions: Vec<String>,
    pub weight: i32,
    /// Set for synchronized outsider roles.
    pub global_role: Option<String>,
}

/// A stored membership.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredMembership {
    pub account_id: u64,
    pub group_id: u64,
    pub roles: Vec<String>,
}

/// A stored content item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredContent {
    pub id: u64,
    pub plugin_id: String,
    pub owner_id: u64,
    pub published: bool,
    pub groups: Vec<u64>,
}

/// A stored ACL record of one content item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredAccessRecord {
    pub content_id: u64,
    pub grant_id: u64,
    pub realm: String,
    pub grant_view: u8,
    pub grant_update: u8,
    pub grant_delete: u8,
    pub priority: i32,
}

impl StoredAccessRecord {
    /// The grant bit for `operation`; unknown operations grant nothing.
    pub fn grants(&self, operation: &str) -> bool {
        let bit = match operation {
            "view" => self.grant_view,
            "update" => self.grant_update,
            "delete" => self.grant_delete,
            _ => 0,
        };
        bit != 0
    }
}

/// Override persistence.
///
/// At most one override exists per group; `create` enforces it atomically.
pub trait OverrideStorage: Send + Sync + 'static {
    fn load_override_by_group(&self, group_id: u64) -> StorageResult<Option<StoredOverride>>;

    fn load_overrides(&self) -> StorageResult<Vec<StoredOverride>>;

    /// Creates the override of `group_id`.
    ///
    /// Fails with [`StorageError::DuplicateOverride`] when one exists.
    fn create_override(
        &self,
        group_id: u64,
        permissions: BTreeMap<String, Vec<String>>,
    ) -> StorageResult<StoredOverride>;

    /// Replaces the permissions of an existing override.
    fn update_override(
        &self,
        override_id: u64,
        permissions: BTreeMap<String, Vec<String>>,
    ) -> StorageResult<StoredOverride>;

    fn delete_override(&self, override_id: u64) -> StorageResult<()>;
}

/// Groups, group types, roles and memberships.
pub trait GroupStore: Send + Sync + 'static {
    fn get_group(&self, group_id: u64) -> StorageResult<Option<StoredGroup>>;

    fn list_groups(&self) -> StorageResult<Vec<StoredGroup>>;

    /// Inserts or replaces a group. Returns `true` when the group is new.
    fn put_group(&self, group: StoredGroup) -> StorageResult<bool>;

    fn get_group_type(&self, group_type: &str) -> StorageResult<Option<StoredGroupType>>;

    fn put_group_type(&self, group_type: StoredGroupType) -> StorageResult<()>;

    fn get_role(&self, role_id: &str) -> StorageResult<Option<StoredRole>>;

    /// All roles of a group type, synchronized ones included.
    fn roles_for_type(&self, group_type: &str) -> StorageResult<Vec<StoredRole>>;

    fn put_role(&self, role: StoredRole) -> StorageResult<()>;

    fn get_membership(&self, account_id: u64, group_id: u64) -> StorageResult<Option<StoredMembership>>;

    fn memberships_for(&self, account_id: u64) -> StorageResult<Vec<StoredMembership>>;

    fn put_membership(&self, membership: StoredMembership) -> StorageResult<()>;

    fn remove_membership(&self, account_id: u64, group_id: u64) -> StorageResult<()>;
}

/// Content items and their ACL records.
pub trait AccessRecordStore: Send + Sync + 'static {
    fn put_content(&self, content: StoredContent) -> StorageResult<()>;

    fn get_content(&self, content_id: u64) -> StorageResult<Option<StoredContent>>;

    fn content_in_group(&self, group_id: u64) -> StorageResult<Vec<StoredContent>>;

    /// Replaces every record of `content_id`.
    fn write_records(&self, content_id: u64, records: Vec<StoredAccessRecord>) -> StorageResult<()>;

    fn records_for(&self, content_id: u64) -> StorageResult<Vec<StoredAccessRecord>>;

    /// Ids of content granted to a subject holding `grants` for `operation`.
    ///
    /// Within each realm of an item only the rows with the highest priority
    /// count; the item matches when one of them has its realm and grant id in
    /// `grants` and the operation bit set. Items without records never match.
    fn accessible_content(
        &self,
        grants: &BTreeMap<String, BTreeSet<u64>>,
        operation: &str,
    ) -> StorageResult<Vec<u64>>;
}

/// Validates a role or group type identifier.
pub fn validate_identifier(kind: &str, value: &str) -> StorageResult<()> {
    if value.trim().is_empty() {
        return Err(StorageError::InvalidInput {
            message: format!("{kind} cannot be empty"),
        });
    }
    if value.len() > 255 {
        return Err(StorageError::InvalidInput {
            message: format!("{kind} exceeds 255 characters"),
        });
    }
    Ok(())
}

/// Validates a stored role scope.
pub fn validate_scope(scope: &str) -> StorageResult<()> {
    match scope {
        "anonymous" | "outsider" | "member" => Ok(()),
        other => Err(StorageError::InvalidInput {
            message: format!("unknown role scope '{other}'"),
        }),
    }
}

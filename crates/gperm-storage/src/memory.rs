//! In-memory storage implementation for testing and single-process use.
//!
//! Override permission maps are kept as JSON text, the same shape a SQL
//! backend stores in its `permissions` column, so serialization failures
//! surface here as they would there.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::{debug, instrument};

use crate::error::{StorageError, StorageResult};
use crate::traits::{
    validate_identifier, validate_scope, AccessRecordStore, GroupStore, OverrideStorage,
    StoredAccessRecord, StoredContent, StoredGroup, StoredGroupType, StoredMembership,
    StoredOverride, StoredRole,
};

/// Override row as persisted.
#[derive(Debug, Clone)]
struct OverrideRow {
    id: u64,
    group_id: u64,
    permissions: String,
    created_at: chrono::DateTime<chrono::Utc>,
    updated_at: chrono::DateTime<chrono::Utc>,
}

impl OverrideRow {
    fn decode(&self) -> StorageResult<StoredOverride> {
        Ok(StoredOverride {
            id: self.id,
            group_id: self.group_id,
            permissions: serde_json::from_str(&self.permissions)?,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// In-memory implementation of every storage trait.
///
/// # Performance Characteristics
///
/// - **Override by group**: O(1) (group index, then row lookup)
/// - **Override create**: O(1), unique per group via the index entry
/// - **Accessible content**: O(R) where R is the total number of ACL records
///
/// Uses DashMap for thread-safe concurrent access without a global lock.
#[derive(Debug, Default)]
pub struct MemoryStore {
    overrides: DashMap<u64, OverrideRow>,
    /// group id -> override id.
    override_by_group: DashMap<u64, u64>,
    next_override_id: AtomicU64,
    groups: DashMap<u64, StoredGroup>,
    group_types: DashMap<String, StoredGroupType>,
    roles: DashMap<String, StoredRole>,
    memberships: DashMap<(u64, u64), StoredMembership>,
    content: DashMap<u64, StoredContent>,
    records: DashMap<u64, Vec<StoredAccessRecord>>,
}

impl MemoryStore {
    /// Creates a new in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new in-memory store wrapped in Arc.
    pub fn new_shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    fn encode(permissions: &BTreeMap<String, Vec<String>>) -> StorageResult<String> {
        for role_id in permissions.keys() {
            validate_identifier("role id", role_id)?;
        }
        Ok(serde_json::to_string(permissions)?)
    }
}

impl OverrideStorage for MemoryStore {
    #[instrument(skip(self))]
    fn load_override_by_group(&self, group_id: u64) -> StorageResult<Option<StoredOverride>> {
        let Some(override_id) = self.override_by_group.get(&group_id).map(|id| *id) else {
            return Ok(None);
        };
        self.overrides
            .get(&override_id)
            .map(|row| row.decode())
            .transpose()
    }

    #[instrument(skip(self))]
    fn load_overrides(&self) -> StorageResult<Vec<StoredOverride>> {
        let mut overrides = self
            .overrides
            .iter()
            .map(|row| row.decode())
            .collect::<StorageResult<Vec<_>>>()?;
        overrides.sort_by_key(|entity| entity.group_id);
        Ok(overrides)
    }

    #[instrument(skip(self, permissions))]
    fn create_override(
        &self,
        group_id: u64,
        permissions: BTreeMap<String, Vec<String>>,
    ) -> StorageResult<StoredOverride> {
        let encoded = Self::encode(&permissions)?;

        // The index entry holds its shard lock until the row is in place.
        match self.override_by_group.entry(group_id) {
            Entry::Occupied(_) => Err(StorageError::DuplicateOverride { group_id }),
            Entry::Vacant(slot) => {
                let id = self.next_override_id.fetch_add(1, Ordering::SeqCst) + 1;
                let now = chrono::Utc::now();
                let row = OverrideRow {
                    id,
                    group_id,
                    permissions: encoded,
                    created_at: now,
                    updated_at: now,
                };
                let stored = row.decode()?;
                self.overrides.insert(id, row);
                slot.insert(id);
                debug!(override_id = id, "created permission override");
                Ok(stored)
            }
        }
    }

    #[instrument(skip(self, permissions))]
    fn update_override(
        &self,
        override_id: u64,
        permissions: BTreeMap<String, Vec<String>>,
    ) -> StorageResult<StoredOverride> {
        let encoded = Self::encode(&permissions)?;
        let mut row = self
            .overrides
            .get_mut(&override_id)
            .ok_or(StorageError::OverrideNotFound { override_id })?;
        row.permissions = encoded;
        row.updated_at = chrono::Utc::now();
        row.decode()
    }

    #[instrument(skip(self))]
    fn delete_override(&self, override_id: u64) -> StorageResult<()> {
        let (_, row) = self
            .overrides
            .remove(&override_id)
            .ok_or(StorageError::OverrideNotFound { override_id })?;
        self.override_by_group
            .remove_if(&row.group_id, |_, id| *id == override_id);
        debug!(group_id = row.group_id, "deleted permission override");
        Ok(())
    }
}

impl GroupStore for MemoryStore {
    fn get_group(&self, group_id: u64) -> StorageResult<Option<StoredGroup>> {
        Ok(self.groups.get(&group_id).map(|group| group.clone()))
    }

    fn list_groups(&self) -> StorageResult<Vec<StoredGroup>> {
        let mut groups: Vec<StoredGroup> = self.groups.iter().map(|g| g.clone()).collect();
        groups.sort_by_key(|group| group.id);
        Ok(groups)
    }

    #[instrument(skip(self, group), fields(group_id = group.id))]
    fn put_group(&self, group: StoredGroup) -> StorageResult<bool> {
        validate_identifier("group type", &group.group_type)?;
        if !self.group_types.contains_key(&group.group_type) {
            return Err(StorageError::GroupTypeNotFound {
                group_type: group.group_type,
            });
        }
        Ok(self.groups.insert(group.id, group).is_none())
    }

    fn get_group_type(&self, group_type: &str) -> StorageResult<Option<StoredGroupType>> {
        Ok(self.group_types.get(group_type).map(|t| t.clone()))
    }

    fn put_group_type(&self, group_type: StoredGroupType) -> StorageResult<()> {
        validate_identifier("group type", &group_type.id)?;
        validate_identifier("role id", &group_type.anonymous_role)?;
        validate_identifier("role id", &group_type.outsider_role)?;
        self.group_types.insert(group_type.id.clone(), group_type);
        Ok(())
    }

    fn get_role(&self, role_id: &str) -> StorageResult<Option<StoredRole>> {
        Ok(self.roles.get(role_id).map(|role| role.clone()))
    }

    fn roles_for_type(&self, group_type: &str) -> StorageResult<Vec<StoredRole>> {
        let mut roles: Vec<StoredRole> = self
            .roles
            .iter()
            .filter(|role| role.group_type == group_type)
            .map(|role| role.clone())
            .collect();
        roles.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(roles)
    }

    fn put_role(&self, role: StoredRole) -> StorageResult<()> {
        validate_identifier("role id", &role.id)?;
        validate_scope(&role.scope)?;
        if !self.group_types.contains_key(&role.group_type) {
            return Err(StorageError::GroupTypeNotFound {
                group_type: role.group_type,
            });
        }
        self.roles.insert(role.id.clone(), role);
        Ok(())
    }

    fn get_membership(&self, account_id: u64, group_id: u64) -> StorageResult<Option<StoredMembership>> {
        Ok(self
            .memberships
            .get(&(account_id, group_id))
            .map(|membership| membership.clone()))
    }

    fn memberships_for(&self, account_id: u64) -> StorageResult<Vec<StoredMembership>> {
        let mut memberships: Vec<StoredMembership> = self
            .memberships
            .iter()
            .filter(|membership| membership.account_id == account_id)
            .map(|membership| membership.clone())
            .collect();
        memberships.sort_by_key(|membership| membership.group_id);
        Ok(memberships)
    }

    #[instrument(skip(self, membership), fields(account_id = membership.account_id, group_id = membership.group_id))]
    fn put_membership(&self, membership: StoredMembership) -> StorageResult<()> {
        if !self.groups.contains_key(&membership.group_id) {
            return Err(StorageError::GroupNotFound {
                group_id: membership.group_id,
            });
        }
        self.memberships
            .insert((membership.account_id, membership.group_id), membership);
        Ok(())
    }

    fn remove_membership(&self, account_id: u64, group_id: u64) -> StorageResult<()> {
        self.memberships.remove(&(account_id, group_id));
        Ok(())
    }
}

impl AccessRecordStore for MemoryStore {
    fn put_content(&self, content: StoredContent) -> StorageResult<()> {
        if content.plugin_id.trim().is_empty() {
            return Err(StorageError::InvalidInput {
                message: "content plugin id cannot be empty".to_string(),
            });
        }
        self.content.insert(content.id, content);
        Ok(())
    }

    fn get_content(&self, content_id: u64) -> StorageResult<Option<StoredContent>> {
        Ok(self.content.get(&content_id).map(|content| content.clone()))
    }

    fn content_in_group(&self, group_id: u64) -> StorageResult<Vec<StoredContent>> {
        let mut content: Vec<StoredContent> = self
            .content
            .iter()
            .filter(|content| content.groups.contains(&group_id))
            .map(|content| content.clone())
            .collect();
        content.sort_by_key(|content| content.id);
        Ok(content)
    }

    #[instrument(skip(self, records), fields(count = records.len()))]
    fn write_records(&self, content_id: u64, records: Vec<StoredAccessRecord>) -> StorageResult<()> {
        if records.iter().any(|record| record.content_id != content_id) {
            return Err(StorageError::InvalidInput {
                message: format!("record does not belong to content {content_id}"),
            });
        }
        if records.is_empty() {
            self.records.remove(&content_id);
        } else {
            self.records.insert(content_id, records);
        }
        Ok(())
    }

    fn records_for(&self, content_id: u64) -> StorageResult<Vec<StoredAccessRecord>> {
        Ok(self
            .records
            .get(&content_id)
            .map(|records| records.clone())
            .unwrap_or_default())
    }

    #[instrument(skip(self, grants))]
    fn accessible_content(
        &self,
        grants: &BTreeMap<String, BTreeSet<u64>>,
        operation: &str,
    ) -> StorageResult<Vec<u64>> {
        let mut ids: Vec<u64> = self
            .records
            .iter()
            .filter(|entry| records_grant(entry.value(), grants, operation))
            .map(|entry| *entry.key())
            .collect();
        ids.sort_unstable();
        Ok(ids)
    }
}

/// Applies per-realm priority, then matches the remaining rows.
fn records_grant(
    records: &[StoredAccessRecord],
    grants: &BTreeMap<String, BTreeSet<u64>>,
    operation: &str,
) -> bool {
    let mut top: BTreeMap<&str, i32> = BTreeMap::new();
    for record in records {
        let priority = top.entry(record.realm.as_str()).or_insert(record.priority);
        *priority = (*priority).max(record.priority);
    }

    records.iter().any(|record| {
        top.get(record.realm.as_str()) == Some(&record.priority)
            && grants
                .get(&record.realm)
                .is_some_and(|ids| ids.contains(&record.grant_id))
            && record.grants(operation)
    })
}

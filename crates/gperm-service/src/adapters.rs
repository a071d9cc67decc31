//! Adapters that bridge the storage layer to the domain layer.
//!
//! The domain layer (gperm-domain) defines read contracts for its
//! collaborators:
//! - `GroupDirectory`: groups, group types, roles and memberships
//! - `OverrideReader`: per-group permission overrides
//!
//! The storage layer (gperm-storage) implements its own traits with stored
//! record types. The adapters here convert between the two and map storage
//! errors onto domain errors.

use std::collections::BTreeMap;
use std::sync::Arc;

use gperm_domain::access::AccessGrantRow;
use gperm_domain::error::{DomainError, DomainResult};
use gperm_domain::model::{
    AccountId, ContentItem, Group, GroupId, GroupRole, GroupType, Membership, OverrideTable,
    PermissionOverride, RoleId, RoleScope,
};
use gperm_domain::resolver::{GroupDirectory, OverrideReader};
use gperm_storage::{
    GroupStore, OverrideStorage, StorageError, StoredAccessRecord, StoredContent, StoredGroup,
    StoredMembership, StoredOverride, StoredRole,
};

/// Maps a storage error onto the domain taxonomy.
pub fn map_storage_error(err: StorageError) -> DomainError {
    match err {
        StorageError::DuplicateOverride { group_id } => DomainError::DuplicateOverride {
            group_id: GroupId(group_id),
        },
        StorageError::GroupNotFound { group_id } => DomainError::GroupNotFound {
            group_id: GroupId(group_id),
        },
        StorageError::GroupTypeNotFound { group_type } => {
            DomainError::GroupTypeNotFound { group_type }
        }
        other => DomainError::StorageError {
            message: other.to_string(),
        },
    }
}

fn parse_scope(role: &StoredRole) -> DomainResult<RoleScope> {
    match role.scope.as_str() {
        "anonymous" => Ok(RoleScope::Anonymous),
        "outsider" => Ok(RoleScope::Outsider),
        "member" => Ok(RoleScope::Member),
        other => Err(DomainError::StorageError {
            message: format!("role '{}' has unknown scope '{other}'", role.id),
        }),
    }
}

fn to_group(group: StoredGroup) -> Group {
    Group {
        id: GroupId(group.id),
        group_type: group.group_type,
        label: group.label,
    }
}

fn to_role(role: StoredRole) -> DomainResult<GroupRole> {
    let scope = parse_scope(&role)?;
    let mut converted = GroupRole::new(role.id, role.group_type, scope, role.permissions)
        .with_weight(role.weight);
    if let Some(global_role) = role.global_role {
        converted = converted.synchronized_from(global_role);
    }
    Ok(converted)
}

fn to_override(stored: StoredOverride) -> PermissionOverride {
    let permissions: OverrideTable = stored
        .permissions
        .into_iter()
        .map(|(role_id, permissions)| (RoleId::new(role_id), permissions.into_iter().collect()))
        .collect();
    PermissionOverride {
        id: Some(stored.id),
        group_id: GroupId(stored.group_id),
        permissions,
    }
}

/// Converts an override table into its stored shape.
pub fn to_stored_permissions(table: &OverrideTable) -> BTreeMap<String, Vec<String>> {
    table
        .iter()
        .map(|(role_id, permissions)| {
            (
                role_id.as_str().to_string(),
                permissions.iter().cloned().collect(),
            )
        })
        .collect()
}

/// Converts a content item into its stored shape.
pub fn to_stored_content(item: &ContentItem) -> StoredContent {
    StoredContent {
        id: item.id,
        plugin_id: item.plugin_id.clone(),
        owner_id: item.owner.0,
        published: item.published,
        groups: item.groups.iter().map(|group_id| group_id.0).collect(),
    }
}

/// Converts a stored content record back into a content item.
pub fn to_content_item(stored: StoredContent) -> ContentItem {
    ContentItem {
        id: stored.id,
        plugin_id: stored.plugin_id,
        owner: AccountId(stored.owner_id),
        published: stored.published,
        groups: stored.groups.into_iter().map(GroupId).collect(),
    }
}

/// Converts built ACL rows into stored records of `content_id`.
pub fn to_stored_records(content_id: u64, rows: Vec<AccessGrantRow>) -> Vec<StoredAccessRecord> {
    rows.into_iter()
        .map(|row| StoredAccessRecord {
            content_id,
            grant_id: row.grant_id,
            realm: row.realm,
            grant_view: row.grant_view,
            grant_update: row.grant_update,
            grant_delete: row.grant_delete,
            priority: row.priority,
        })
        .collect()
}

/// Adapter that implements `GroupDirectory` using a `GroupStore`.
pub struct StorageGroupDirectory<S: GroupStore> {
    storage: Arc<S>,
}

impl<S: GroupStore> StorageGroupDirectory<S> {
    pub fn new(storage: Arc<S>) -> Self {
        Self { storage }
    }

    fn membership(&self, stored: StoredMembership) -> DomainResult<Option<Membership>> {
        let Some(group) = self.get_group(GroupId(stored.group_id))? else {
            return Ok(None);
        };
        let roles = stored.roles.into_iter().map(RoleId::new).collect();
        Ok(Some(Membership::new(AccountId(stored.account_id), group, roles)))
    }
}

impl<S: GroupStore> GroupDirectory for StorageGroupDirectory<S> {
    fn get_group(&self, group_id: GroupId) -> DomainResult<Option<Group>> {
        Ok(self
            .storage
            .get_group(group_id.0)
            .map_err(map_storage_error)?
            .map(to_group))
    }

    fn list_groups(&self) -> DomainResult<Vec<Group>> {
        Ok(self
            .storage
            .list_groups()
            .map_err(map_storage_error)?
            .into_iter()
            .map(to_group)
            .collect())
    }

    /// Assembles the type from its stored record and roles. Synchronized
    /// roles are left out of `member_roles`.
    fn get_group_type(&self, group_type: &str) -> DomainResult<Option<GroupType>> {
        let Some(stored) = self
            .storage
            .get_group_type(group_type)
            .map_err(map_storage_error)?
        else {
            return Ok(None);
        };

        let mut anonymous_role = None;
        let mut outsider_role = None;
        let mut member_roles = Vec::new();
        for role in self
            .storage
            .roles_for_type(group_type)
            .map_err(map_storage_error)?
        {
            let role = to_role(role)?;
            if role.id.as_str() == stored.anonymous_role {
                anonymous_role = Some(role);
            } else if role.id.as_str() == stored.outsider_role {
                outsider_role = Some(role);
            } else if role.scope == RoleScope::Member {
                member_roles.push(role);
            }
        }

        let missing = |role_id: &str| DomainError::StorageError {
            message: format!("group type '{group_type}' references missing role '{role_id}'"),
        };
        Ok(Some(GroupType {
            id: stored.id.clone(),
            anonymous_role: anonymous_role.ok_or_else(|| missing(&stored.anonymous_role))?,
            outsider_role: outsider_role.ok_or_else(|| missing(&stored.outsider_role))?,
            member_roles,
        }))
    }

    fn get_role(&self, role_id: &RoleId) -> DomainResult<Option<GroupRole>> {
        self.storage
            .get_role(role_id.as_str())
            .map_err(map_storage_error)?
            .map(to_role)
            .transpose()
    }

    fn get_membership(
        &self,
        account: AccountId,
        group_id: GroupId,
    ) -> DomainResult<Option<Membership>> {
        match self
            .storage
            .get_membership(account.0, group_id.0)
            .map_err(map_storage_error)?
        {
            Some(stored) => self.membership(stored),
            None => Ok(None),
        }
    }

    fn memberships_for(&self, account: AccountId) -> DomainResult<Vec<Membership>> {
        let mut memberships = Vec::new();
        for stored in self
            .storage
            .memberships_for(account.0)
            .map_err(map_storage_error)?
        {
            memberships.extend(self.membership(stored)?);
        }
        Ok(memberships)
    }

    fn synchronized_roles(&self, group_type: &str) -> DomainResult<Vec<GroupRole>> {
        self.storage
            .roles_for_type(group_type)
            .map_err(map_storage_error)?
            .into_iter()
            .filter(|role| role.global_role.is_some())
            .map(to_role)
            .collect()
    }
}

/// Adapter that implements `OverrideReader` using an `OverrideStorage`.
pub struct StorageOverrideReader<S: OverrideStorage> {
    storage: Arc<S>,
}

impl<S: OverrideStorage> StorageOverrideReader<S> {
    pub fn new(storage: Arc<S>) -> Self {
        Self { storage }
    }
}

impl<S: OverrideStorage> OverrideReader for StorageOverrideReader<S> {
    fn load_by_group(&self, group_id: GroupId) -> DomainResult<Option<PermissionOverride>> {
        Ok(self
            .storage
            .load_override_by_group(group_id.0)
            .map_err(map_storage_error)?
            .map(to_override))
    }

    fn load_all(&self) -> DomainResult<Vec<PermissionOverride>> {
        Ok(self
            .storage
            .load_overrides()
            .map_err(map_storage_error)?
            .into_iter()
            .map(to_override)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gperm_storage::{MemoryStore, StoredGroupType};

    fn role(id: &str, scope: &str, permissions: &[&str]) -> StoredRole {
        StoredRole {
            id: id.to_string(),
            group_type: "club".to_string(),
            scope: scope.to_string(),
            permissions: permissions.iter().map(|p| p.to_string()).collect(),
            weight: 0,
            global_role: None,
        }
    }

    fn seeded_store() -> Arc<MemoryStore> {
        let store = MemoryStore::new_shared();
        store
            .put_group_type(StoredGroupType {
                id: "club".to_string(),
                anonymous_role: "club-anonymous".to_string(),
                outsider_role: "club-outsider".to_string(),
            })
            .unwrap();
        store.put_role(role("club-anonymous", "anonymous", &["view"])).unwrap();
        store.put_role(role("club-outsider", "outsider", &["view"])).unwrap();
        store.put_role(role("club-member", "member", &["view", "leave group"])).unwrap();
        store
            .put_role(StoredRole {
                global_role: Some("staff".to_string()),
                ..role("club-staff", "outsider", &["moderate"])
            })
            .unwrap();
        store
            .put_group(StoredGroup {
                id: 1,
                group_type: "club".to_string(),
                label: "Chess".to_string(),
            })
            .unwrap();
        store
    }

    #[test]
    fn test_group_type_is_assembled_from_roles() {
        let directory = StorageGroupDirectory::new(seeded_store());

        let group_type = directory.get_group_type("club").unwrap().unwrap();

        assert_eq!(group_type.anonymous_role.id.as_str(), "club-anonymous");
        assert_eq!(group_type.outsider_role.id.as_str(), "club-outsider");
        let members: Vec<&str> = group_type.member_roles.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(members, vec!["club-member"]);
    }

    #[test]
    fn test_synchronized_roles_are_listed_separately() {
        let directory = StorageGroupDirectory::new(seeded_store());

        let synchronized = directory.synchronized_roles("club").unwrap();

        assert_eq!(synchronized.len(), 1);
        assert_eq!(synchronized[0].global_role.as_deref(), Some("staff"));
    }

    #[test]
    fn test_membership_carries_its_group() {
        let store = seeded_store();
        store
            .put_membership(StoredMembership {
                account_id: 4,
                group_id: 1,
                roles: vec!["club-member".to_string()],
            })
            .unwrap();
        let directory = StorageGroupDirectory::new(store);

        let membership = directory
            .get_membership(AccountId(4), GroupId(1))
            .unwrap()
            .unwrap();

        assert_eq!(membership.group.label, "Chess");
        assert_eq!(membership.roles, vec![RoleId::new("club-member")]);
        assert!(directory
            .get_membership(AccountId(5), GroupId(1))
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_override_round_trips_through_storage_shape() {
        let store = seeded_store();
        let table = OverrideTable::new().with_role("club-member", ["view", "edit"]);
        store
            .create_override(1, to_stored_permissions(&table))
            .unwrap();
        let reader = StorageOverrideReader::new(store);

        let loaded = reader.load_by_group(GroupId(1)).unwrap().unwrap();

        assert!(loaded.id.is_some());
        assert_eq!(loaded.permissions, table);
        assert_eq!(reader.load_all().unwrap().len(), 1);
    }

    #[test]
    fn test_duplicate_maps_to_domain_duplicate() {
        let err = map_storage_error(StorageError::DuplicateOverride { group_id: 2 });

        assert!(matches!(
            err,
            DomainError::DuplicateOverride { group_id: GroupId(2) }
        ));
    }
}

// Allow dead_code because each test file is compiled as a separate crate,
// so not all helper functions are used in every test file.
#![allow(dead_code)]

use std::sync::Arc;

use anyhow::Result;
use gperm_domain::model::{Account, AccountId, GroupId};
use gperm_service::{GroupPermissionsService, ServiceConfig};
use gperm_storage::{
    GroupStore, MemoryStore, StoredGroup, StoredGroupType, StoredMembership, StoredRole,
};

// ============================================================================
// Fixture Constants
// ============================================================================

pub const ARTICLE: &str = "group_node:article";

/// Group with an override in most scenarios.
pub const G1: GroupId = GroupId(1);
/// Group that keeps its defaults.
pub const G2: GroupId = GroupId(2);

pub const EDITOR: AccountId = AccountId(10);
pub const MEMBER: AccountId = AccountId(11);
pub const OUTSIDER: AccountId = AccountId(12);

// ============================================================================
// Fixture
// ============================================================================

pub type Service = GroupPermissionsService<MemoryStore>;

fn role(id: &str, scope: &str, permissions: &[&str], weight: i32) -> StoredRole {
    StoredRole {
        id: id.to_string(),
        group_type: "club".to_string(),
        scope: scope.to_string(),
        permissions: permissions.iter().map(|p| p.to_string()).collect(),
        weight,
        global_role: None,
    }
}

/// Seeds the `club` group type and groups G1 and G2.
///
/// | role           | scope     | defaults                  |
/// |----------------|-----------|---------------------------|
/// | club-anonymous | anonymous | view group                |
/// | club-outsider  | outsider  | view group, join group    |
/// | club-member    | member    | view group, leave group   |
/// | club-editor    | member    | view                      |
/// | club-staff     | outsider  | moderate (synced: staff)  |
///
/// EDITOR holds club-editor in G1, MEMBER holds club-member in G1 and G2.
pub fn seed_store() -> Result<Arc<MemoryStore>> {
    let store = MemoryStore::new_shared();
    store.put_group_type(StoredGroupType {
        id: "club".to_string(),
        anonymous_role: "club-anonymous".to_string(),
        outsider_role: "club-outsider".to_string(),
    })?;
    store.put_role(role("club-anonymous", "anonymous", &["view group"], 0))?;
    store.put_role(role("club-outsider", "outsider", &["view group", "join group"], 0))?;
    store.put_role(role("club-member", "member", &["view group", "leave group"], 1))?;
    store.put_role(role("club-editor", "member", &["view"], 2))?;
    store.put_role(StoredRole {
        global_role: Some("staff".to_string()),
        ..role("club-staff", "outsider", &["moderate"], 0)
    })?;

    for (id, label) in [(G1, "Chess"), (G2, "Go")] {
        store.put_group(StoredGroup {
            id: id.0,
            group_type: "club".to_string(),
            label: label.to_string(),
        })?;
    }

    store.put_membership(StoredMembership {
        account_id: EDITOR.0,
        group_id: G1.0,
        roles: vec!["club-editor".to_string()],
    })?;
    for group_id in [G1, G2] {
        store.put_membership(StoredMembership {
            account_id: MEMBER.0,
            group_id: group_id.0,
            roles: vec!["club-member".to_string()],
        })?;
    }
    Ok(store)
}

pub fn create_service() -> Result<Service> {
    create_service_with(ServiceConfig::default())
}

pub fn create_service_with(config: ServiceConfig) -> Result<Service> {
    Ok(GroupPermissionsService::new(seed_store()?, &config))
}

/// An account allowed to create, edit and delete overrides.
pub fn admin() -> Account {
    Account::new(AccountId(1)).with_permissions([
        "add group permission entities",
        "edit group permission entities",
        "delete group permission entities",
    ])
}

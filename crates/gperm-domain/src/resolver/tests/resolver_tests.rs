//! Permission resolver test suite.

use std::sync::Arc;

use super::mocks::{club_type, MockDirectory, MockOverrideReader};
use crate::cache::{CacheConfig, TaggedCache};
use crate::error::DomainError;
use crate::model::{
    Account, AccountId, Group, GroupId, GroupRole, OverrideTable, PermissionOverride, RoleId,
    RoleScope,
};
use crate::overrides::PermissionOverrideStore;
use crate::request::RequestCache;
use crate::resolver::{DefaultRoleSynchronizer, PermissionResolver, ResolverConfig};

struct Fixture {
    directory: Arc<MockDirectory>,
    reader: Arc<MockOverrideReader>,
    resolver: PermissionResolver,
    group: Group,
}

fn fixture() -> Fixture {
    let directory = Arc::new(MockDirectory::new());
    directory.add_type(club_type());
    let group = Group::new(GroupId(1), "club");
    directory.add_group(group.clone());

    let reader = Arc::new(MockOverrideReader::new());
    let store = Arc::new(PermissionOverrideStore::new(
        reader.clone(),
        Arc::new(TaggedCache::new("override", CacheConfig::default())),
        Arc::new(TaggedCache::new("override_list", CacheConfig::default())),
    ));
    let resolver = PermissionResolver::new(directory.clone(), Arc::new(DefaultRoleSynchronizer), store);

    Fixture {
        directory,
        reader,
        resolver,
        group,
    }
}

fn set_override(f: &Fixture, table: OverrideTable) {
    f.reader.insert(PermissionOverride::new(f.group.id, table));
}

// ========== Section 1: Override Gate ==========

#[test]
fn test_group_without_override_denies_every_scope() {
    let f = fixture();
    let member = Account::new(AccountId(3));
    f.directory
        .add_membership(member.id, f.group.clone(), ["club-member"]);
    let outsider = Account::new(AccountId(4));
    let request = RequestCache::new();

    // "view" is in every default set, yet nothing is granted here.
    for account in [&Account::anonymous(), &member, &outsider] {
        assert!(!f
            .resolver
            .check_permission("view", &f.group, account, &request)
            .unwrap());
    }
    assert!(!f
        .resolver
        .check_anonymous_role("view", &f.group, &request)
        .unwrap());
    for role in club_type().roles() {
        assert!(!f
            .resolver
            .check_group_role("view", &f.group, &role.id, &request)
            .unwrap());
    }
}

#[test]
fn test_role_missing_from_override_gets_nothing() {
    let f = fixture();
    set_override(&f, OverrideTable::new().with_role("club-editor", ["edit"]));
    let member = Account::new(AccountId(3));
    f.directory
        .add_membership(member.id, f.group.clone(), ["club-member"]);

    let allowed = f
        .resolver
        .check_permission("view", &f.group, &member, &RequestCache::new())
        .unwrap();

    assert!(!allowed);
}

#[test]
fn test_explicit_empty_role_entry_gets_nothing() {
    let f = fixture();
    set_override(
        &f,
        OverrideTable::new().with_role("club-anonymous", Vec::<String>::new()),
    );

    let allowed = f
        .resolver
        .check_anonymous_role("view", &f.group, &RequestCache::new())
        .unwrap();

    assert!(!allowed);
}

// ========== Section 2: Scope Dispatch ==========

#[test]
fn test_editor_scenario() {
    let f = fixture();
    set_override(&f, OverrideTable::new().with_role("club-editor", ["view", "edit"]));
    let editor = Account::new(AccountId(3));
    f.directory
        .add_membership(editor.id, f.group.clone(), ["club-editor"]);
    let request = RequestCache::new();

    assert!(f
        .resolver
        .check_permission("edit", &f.group, &editor, &request)
        .unwrap());
    assert!(!f
        .resolver
        .check_permission("edit", &f.group, &Account::anonymous(), &request)
        .unwrap());
}

#[test]
fn test_member_is_not_checked_as_outsider() {
    let f = fixture();
    set_override(&f, OverrideTable::new().with_role("club-outsider", ["view"]));
    let member = Account::new(AccountId(3));
    f.directory
        .add_membership(member.id, f.group.clone(), ["club-member"]);

    let allowed = f
        .resolver
        .check_permission("view", &f.group, &member, &RequestCache::new())
        .unwrap();

    assert!(!allowed);
}

#[test]
fn test_outsider_uses_generic_outsider_role() {
    let f = fixture();
    set_override(&f, OverrideTable::new().with_role("club-outsider", ["view"]));

    let allowed = f
        .resolver
        .check_permission("view", &f.group, &Account::new(AccountId(8)), &RequestCache::new())
        .unwrap();

    assert!(allowed);
}

#[test]
fn test_bypass_permission_short_circuits() {
    let f = fixture();
    let admin = Account::new(AccountId(1)).with_permissions(["bypass group access"]);

    let allowed = f
        .resolver
        .check_permission("anything", &f.group, &admin, &RequestCache::new())
        .unwrap();

    assert!(allowed);
}

#[test]
fn test_configured_bypass_permission_is_used() {
    let f = fixture();
    let resolver = f
        .resolver
        .with_config(ResolverConfig::default().with_bypass_permission("administer groups"));
    let default_bypass = Account::new(AccountId(1)).with_permissions(["bypass group access"]);
    let custom_bypass = Account::new(AccountId(2)).with_permissions(["administer groups"]);
    let request = RequestCache::new();

    assert!(!resolver
        .check_permission("view", &f.group, &default_bypass, &request)
        .unwrap());
    assert!(resolver
        .check_permission("view", &f.group, &custom_bypass, &request)
        .unwrap());
}

#[test]
fn test_collaborator_failure_is_propagated() {
    let f = fixture();
    set_override(&f, OverrideTable::new().with_role("club-outsider", ["view"]));
    f.directory.fail_all();

    let result = f.resolver.check_permission(
        "view",
        &f.group,
        &Account::new(AccountId(8)),
        &RequestCache::new(),
    );

    assert!(matches!(result, Err(DomainError::StorageError { .. })));
}

// ========== Section 3: Outsider Roles ==========

#[test]
fn test_outsider_roles_include_synchronized_roles() {
    let f = fixture();
    f.directory.add_role(
        GroupRole::new("club-staff", "club", RoleScope::Outsider, ["moderate"])
            .synchronized_from("staff"),
    );
    let staff = Account::new(AccountId(5)).with_roles(["staff", "no_sync_role"]);

    let roles = f
        .resolver
        .get_outsider_roles(&f.group, &staff, &RequestCache::new())
        .unwrap();

    let ids: Vec<&str> = roles.iter().map(|role| role.id.as_str()).collect();
    assert_eq!(ids, vec!["club-staff", "club-outsider"]);
}

#[test]
fn test_synchronized_role_grants_outsider_permission() {
    let f = fixture();
    f.directory.add_role(
        GroupRole::new("club-staff", "club", RoleScope::Outsider, Vec::<String>::new())
            .synchronized_from("staff"),
    );
    set_override(&f, OverrideTable::new().with_role("club-staff", ["moderate"]));
    let staff = Account::new(AccountId(5)).with_roles(["staff"]);
    let plain = Account::new(AccountId(6));
    let request = RequestCache::new();

    assert!(f
        .resolver
        .check_outsider_roles("moderate", &f.group, &staff, &request)
        .unwrap());
    assert!(!f
        .resolver
        .check_outsider_roles("moderate", &f.group, &plain, &request)
        .unwrap());
}

#[test]
fn test_outsider_roles_memo_does_not_bleed_between_accounts() {
    let f = fixture();
    f.directory.add_role(
        GroupRole::new("club-staff", "club", RoleScope::Outsider, Vec::<String>::new())
            .synchronized_from("staff"),
    );
    let staff = Account::new(AccountId(5)).with_roles(["staff"]);
    let plain = Account::new(AccountId(6));
    let request = RequestCache::new();

    let first = f.resolver.get_outsider_roles(&f.group, &staff, &request).unwrap();
    let second = f.resolver.get_outsider_roles(&f.group, &plain, &request).unwrap();

    assert_eq!(first.len(), 2);
    assert_eq!(second.len(), 1);
}

// ========== Section 4: Per-role Checks ==========

#[test]
fn test_check_group_role_reads_only_that_role() {
    let f = fixture();
    set_override(
        &f,
        OverrideTable::new()
            .with_role("club-editor", ["edit"])
            .with_role("club-member", ["view"]),
    );
    let request = RequestCache::new();

    assert!(f
        .resolver
        .check_group_role("edit", &f.group, &RoleId::new("club-editor"), &request)
        .unwrap());
    assert!(!f
        .resolver
        .check_group_role("edit", &f.group, &RoleId::new("club-member"), &request)
        .unwrap());
}

#[test]
fn test_role_outside_group_type_resolves_to_no_permission() {
    let f = fixture();
    set_override(&f, OverrideTable::new().with_role("forum-admin", ["edit"]));

    let allowed = f
        .resolver
        .check_group_role("edit", &f.group, &RoleId::new("forum-admin"), &RequestCache::new())
        .unwrap();

    assert!(!allowed);
}

#[test]
fn test_member_roles_by_group_ordering() {
    let f = fixture();

    let roles = f.resolver.member_roles_by_group(&f.group).unwrap();

    let ids: Vec<&str> = roles.iter().map(|role| role.id.as_str()).collect();
    assert_eq!(
        ids,
        vec!["club-anonymous", "club-outsider", "club-member", "club-editor"]
    );
}

#[test]
fn test_unknown_group_type_yields_no_roles() {
    let f = fixture();
    let stray = Group::new(GroupId(9), "unknown");

    assert!(f.resolver.member_roles_by_group(&stray).unwrap().is_empty());
}

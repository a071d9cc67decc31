//! Permissions drawn from per-group override tables.

use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::debug;

use crate::cache::{tags, CacheContext};
use crate::error::DomainResult;
use crate::model::{Group, OverrideTable, RoleId};
use crate::overrides::PermissionOverrideStore;
use crate::request::RequestCache;
use crate::resolver::{outsider_roles, GroupDirectory, RoleSynchronizer};

use super::{Audience, CalculatedPermissionsItem, PermissionCalculator, RefinableCalculatedPermissions};

/// Emits override-table permissions for every group that has an override.
///
/// Authoritative: for a group with an override, roles missing from the table
/// contribute nothing, and an item is emitted even when it ends up empty so
/// that default permissions never leak through.
pub struct OverrideCalculator {
    directory: Arc<dyn GroupDirectory>,
    synchronizer: Arc<dyn RoleSynchronizer>,
    overrides: Arc<PermissionOverrideStore>,
}

impl OverrideCalculator {
    pub fn new(
        directory: Arc<dyn GroupDirectory>,
        synchronizer: Arc<dyn RoleSynchronizer>,
        overrides: Arc<PermissionOverrideStore>,
    ) -> Self {
        Self {
            directory,
            synchronizer,
            overrides,
        }
    }

    fn add_override_item<'r>(
        result: &mut RefinableCalculatedPermissions,
        audience: Audience<'_>,
        group: &Group,
        table: &OverrideTable,
        roles: impl IntoIterator<Item = &'r RoleId>,
    ) {
        let mut permissions = BTreeSet::new();
        for role_id in roles {
            if let Some(granted) = table.permissions_for(role_id) {
                permissions.extend(granted.iter().cloned());
            }
            result.add_cache_tags([tags::group_role(role_id)]);
        }
        result
            .add_dependency(group)
            .add_cache_tags([tags::permission_override(group.id)]);
        result.add_item(
            CalculatedPermissionsItem {
                scope: audience.scope(),
                group_id: group.id,
                permissions,
            },
            true,
        );
    }
}

impl PermissionCalculator for OverrideCalculator {
    fn name(&self) -> &'static str {
        "overrides"
    }

    fn is_authoritative(&self) -> bool {
        true
    }

    fn calculate(
        &self,
        audience: Audience<'_>,
        request: &RequestCache,
    ) -> DomainResult<RefinableCalculatedPermissions> {
        let mut result = RefinableCalculatedPermissions::new();

        match audience {
            Audience::Anonymous | Audience::Outsider(_) => {
                result.add_cache_tags([tags::OVERRIDE_LIST]);
                if matches!(audience, Audience::Outsider(_)) {
                    result.add_cache_contexts([CacheContext::UserRoles.as_str()]);
                }
                let all = self.overrides.get_all(request)?;
                for (group_id, table) in all.iter() {
                    let Some(group) = self.directory.get_group(*group_id)? else {
                        continue;
                    };
                    let Some(group_type) = self.directory.get_group_type(&group.group_type)? else {
                        continue;
                    };
                    let roles: Vec<RoleId> = match audience.account() {
                        None => vec![group_type.anonymous_role.id.clone()],
                        Some(account) => outsider_roles(
                            self.directory.as_ref(),
                            self.synchronizer.as_ref(),
                            &group_type,
                            account,
                            request,
                        )?
                        .iter()
                        .map(|role| role.id.clone())
                        .collect(),
                    };
                    Self::add_override_item(&mut result, audience, &group, table, &roles);
                }
            }
            Audience::Member(account) => {
                result
                    .add_dependency(account)
                    .add_cache_contexts([CacheContext::User.as_str()]);
                for membership in self.directory.memberships_for(account.id)? {
                    let group = &membership.group;
                    // Tagged even without an override so a later save invalidates.
                    result.add_cache_tags([tags::permission_override(group.id)]);
                    if let Some(table) = self.overrides.get_override(group.id, request)? {
                        Self::add_override_item(&mut result, audience, group, &table, &membership.roles);
                    }
                }
            }
        }

        debug!(%audience, items = result.items().count(), "calculated override permissions");
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{CacheConfig, TaggedCache};
    use crate::model::{Account, AccountId, GroupId, GroupRole, PermissionOverride, RoleScope};
    use crate::resolver::tests::mocks::{club_type, MockDirectory, MockOverrideReader};
    use crate::resolver::DefaultRoleSynchronizer;

    struct Fixture {
        directory: Arc<MockDirectory>,
        reader: Arc<MockOverrideReader>,
        calculator: OverrideCalculator,
    }

    fn fixture() -> Fixture {
        let directory = Arc::new(MockDirectory::new());
        directory.add_type(club_type());
        let reader = Arc::new(MockOverrideReader::new());
        let store = Arc::new(PermissionOverrideStore::new(
            reader.clone(),
            Arc::new(TaggedCache::new("override", CacheConfig::default())),
            Arc::new(TaggedCache::new("override_list", CacheConfig::default())),
        ));
        let calculator =
            OverrideCalculator::new(directory.clone(), Arc::new(DefaultRoleSynchronizer), store);
        Fixture {
            directory,
            reader,
            calculator,
        }
    }

    #[test]
    fn test_member_items_come_strictly_from_the_table() {
        let f = fixture();
        let group = Group::new(GroupId(1), "club");
        f.directory.add_group(group.clone());
        let account = Account::new(AccountId(3));
        f.directory.add_membership(account.id, group, ["club-editor"]);
        f.reader.insert(PermissionOverride::new(
            GroupId(1),
            OverrideTable::new().with_role("club-editor", ["edit"]),
        ));

        let result = f
            .calculator
            .calculate_member_permissions(&account, &RequestCache::new())
            .unwrap()
            .freeze();

        let item = result.get_item(RoleScope::Member, GroupId(1)).unwrap();
        assert_eq!(item.permissions, BTreeSet::from(["edit".to_string()]));
        assert!(result.metadata().has_tag("override:1"));
    }

    #[test]
    fn test_group_without_override_emits_no_member_item() {
        let f = fixture();
        let group = Group::new(GroupId(1), "club");
        f.directory.add_group(group.clone());
        let account = Account::new(AccountId(3));
        f.directory.add_membership(account.id, group, ["club-editor"]);

        let result = f
            .calculator
            .calculate_member_permissions(&account, &RequestCache::new())
            .unwrap()
            .freeze();

        assert!(result.is_empty());
        assert!(result.metadata().has_tag("override:1"));
    }

    #[test]
    fn test_role_missing_from_table_yields_empty_item() {
        let f = fixture();
        f.directory.add_group(Group::new(GroupId(4), "club"));
        f.reader.insert(PermissionOverride::new(
            GroupId(4),
            OverrideTable::new().with_role("club-editor", ["edit"]),
        ));

        let result = f
            .calculator
            .calculate_anonymous_permissions(&RequestCache::new())
            .unwrap()
            .freeze();

        let item = result.get_item(RoleScope::Anonymous, GroupId(4)).unwrap();
        assert!(item.permissions.is_empty());
        assert!(result.metadata().has_tag(tags::OVERRIDE_LIST));
    }

    #[test]
    fn test_outsider_items_union_generic_and_synchronized_roles() {
        let f = fixture();
        f.directory.add_group(Group::new(GroupId(1), "club"));
        f.directory.add_role(
            GroupRole::new("club-staff", "club", RoleScope::Outsider, Vec::<String>::new())
                .synchronized_from("staff"),
        );
        f.reader.insert(PermissionOverride::new(
            GroupId(1),
            OverrideTable::new()
                .with_role("club-outsider", ["view"])
                .with_role("club-staff", ["moderate"]),
        ));
        let staff = Account::new(AccountId(9)).with_roles(["staff"]);

        let result = f
            .calculator
            .calculate_outsider_permissions(&staff, &RequestCache::new())
            .unwrap()
            .freeze();

        let item = result.get_item(RoleScope::Outsider, GroupId(1)).unwrap();
        assert!(item.has_permission("view"));
        assert!(item.has_permission("moderate"));
        assert!(result.metadata().contexts().contains("user.roles"));
    }

    #[test]
    fn test_is_authoritative() {
        assert!(fixture().calculator.is_authoritative());
    }
}

//! Statically configured role permissions.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::cache::{tags, CacheContext};
use crate::error::DomainResult;
use crate::model::{Group, GroupRole, GroupType};
use crate::request::RequestCache;
use crate::resolver::{outsider_roles, GroupDirectory, RoleSynchronizer};

use super::{Audience, CalculatedPermissionsItem, PermissionCalculator, RefinableCalculatedPermissions};

/// Emits each role's default permission set, independent of overrides.
pub struct DefaultRoleCalculator {
    directory: Arc<dyn GroupDirectory>,
    synchronizer: Arc<dyn RoleSynchronizer>,
}

impl DefaultRoleCalculator {
    pub fn new(directory: Arc<dyn GroupDirectory>, synchronizer: Arc<dyn RoleSynchronizer>) -> Self {
        Self {
            directory,
            synchronizer,
        }
    }

    fn group_type(&self, group: &Group) -> DomainResult<Option<GroupType>> {
        let group_type = self.directory.get_group_type(&group.group_type)?;
        if group_type.is_none() {
            warn!(group_id = %group.id, group_type = %group.group_type, "group has unknown type");
        }
        Ok(group_type)
    }

    fn add_roles<'r>(
        result: &mut RefinableCalculatedPermissions,
        audience: Audience<'_>,
        group: &Group,
        roles: impl IntoIterator<Item = &'r GroupRole>,
    ) {
        let mut item = CalculatedPermissionsItem::new(audience.scope(), group.id, Vec::<String>::new());
        for role in roles {
            item.permissions.extend(role.permissions.iter().cloned());
            result.add_dependency(role);
        }
        result.add_dependency(group);
        result.add_item(item, false);
    }
}

impl PermissionCalculator for DefaultRoleCalculator {
    fn name(&self) -> &'static str {
        "default_roles"
    }

    fn calculate(
        &self,
        audience: Audience<'_>,
        request: &RequestCache,
    ) -> DomainResult<RefinableCalculatedPermissions> {
        let mut result = RefinableCalculatedPermissions::new();

        match audience {
            Audience::Anonymous => {
                result.add_cache_tags([tags::GROUP_LIST]);
                for group in self.directory.list_groups()? {
                    if let Some(group_type) = self.group_type(&group)? {
                        Self::add_roles(&mut result, audience, &group, [&group_type.anonymous_role]);
                    }
                }
            }
            Audience::Outsider(account) => {
                result
                    .add_cache_tags([tags::GROUP_LIST])
                    .add_cache_contexts([CacheContext::UserRoles.as_str()]);
                for group in self.directory.list_groups()? {
                    if let Some(group_type) = self.group_type(&group)? {
                        let roles = outsider_roles(
                            self.directory.as_ref(),
                            self.synchronizer.as_ref(),
                            &group_type,
                            account,
                            request,
                        )?;
                        Self::add_roles(&mut result, audience, &group, roles.iter());
                    }
                }
            }
            Audience::Member(account) => {
                result
                    .add_dependency(account)
                    .add_cache_contexts([CacheContext::User.as_str()]);
                for membership in self.directory.memberships_for(account.id)? {
                    let Some(group_type) = self.group_type(&membership.group)? else {
                        continue;
                    };
                    let roles: Vec<&GroupRole> = membership
                        .roles
                        .iter()
                        .filter_map(|role_id| {
                            let role = group_type.role(role_id);
                            if role.is_none() {
                                warn!(group_id = %membership.group.id, %role_id, "membership references unknown role");
                            }
                            role
                        })
                        .collect();
                    Self::add_roles(&mut result, audience, &membership.group, roles);
                }
            }
        }

        debug!(%audience, items = result.items().count(), "calculated default role permissions");
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Account, AccountId, GroupId, RoleId, RoleScope};
    use crate::resolver::tests::mocks::{club_type, MockDirectory};
    use crate::resolver::DefaultRoleSynchronizer;

    fn calculator(directory: Arc<MockDirectory>) -> DefaultRoleCalculator {
        DefaultRoleCalculator::new(directory, Arc::new(DefaultRoleSynchronizer))
    }

    #[test]
    fn test_anonymous_permissions_include_every_group_default() {
        let directory = Arc::new(MockDirectory::new());
        directory.add_type(club_type());
        directory.add_group(Group::new(GroupId(2), "club"));

        let result = calculator(directory)
            .calculate_anonymous_permissions(&RequestCache::new())
            .unwrap()
            .freeze();

        let item = result.get_item(RoleScope::Anonymous, GroupId(2)).unwrap();
        assert_eq!(item.permissions, club_type().anonymous_role.permissions);
        assert!(result.metadata().has_tag("group:2"));
        assert!(result.metadata().has_tag("group_role:club-anonymous"));
    }

    #[test]
    fn test_member_permissions_union_held_roles() {
        let directory = Arc::new(MockDirectory::new());
        directory.add_type(club_type());
        let group = Group::new(GroupId(1), "club");
        directory.add_group(group.clone());
        let account = Account::new(AccountId(5));
        directory.add_membership(account.id, group, ["club-editor", "club-member"]);

        let result = calculator(directory)
            .calculate_member_permissions(&account, &RequestCache::new())
            .unwrap()
            .freeze();

        let item = result.get_item(RoleScope::Member, GroupId(1)).unwrap();
        assert!(item.has_permission("view"));
        assert!(item.has_permission("leave group"));
        assert!(result.metadata().has_tag("user:5"));
        assert!(result.metadata().contexts().contains("user"));
    }

    #[test]
    fn test_member_with_unknown_role_gets_remaining_roles() {
        let directory = Arc::new(MockDirectory::new());
        directory.add_type(club_type());
        let group = Group::new(GroupId(1), "club");
        directory.add_group(group.clone());
        let account = Account::new(AccountId(5));
        directory.add_membership(account.id, group, ["club-ghost", "club-member"]);

        let result = calculator(directory)
            .calculate_member_permissions(&account, &RequestCache::new())
            .unwrap()
            .freeze();

        let item = result.get_item(RoleScope::Member, GroupId(1)).unwrap();
        assert!(item.has_permission("leave group"));
        assert!(!item.has_permission("edit"));
    }

    #[test]
    fn test_outsider_permissions_include_synchronized_roles() {
        let directory = Arc::new(MockDirectory::new());
        directory.add_type(club_type());
        directory.add_group(Group::new(GroupId(1), "club"));
        directory.add_role(
            GroupRole::new("club-editor_global", "club", RoleScope::Outsider, ["moderate"])
                .synchronized_from("editor_global"),
        );
        let account = Account::new(AccountId(7)).with_roles(["editor_global"]);

        let result = calculator(directory)
            .calculate_outsider_permissions(&account, &RequestCache::new())
            .unwrap()
            .freeze();

        let item = result.get_item(RoleScope::Outsider, GroupId(1)).unwrap();
        assert!(item.has_permission("moderate"));
        assert!(item.has_permission("join group"));
        assert!(result.metadata().contexts().contains("user.roles"));
        assert!(result
            .metadata()
            .has_tag(&tags::group_role(&RoleId::new("club-editor_global"))));
    }
}

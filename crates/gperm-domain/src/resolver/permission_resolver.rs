//! Override-gated permission checks against one group.

use std::sync::Arc;

use tracing::{debug, instrument, trace, warn};

use crate::error::DomainResult;
use crate::model::{Account, Group, GroupRole, GroupType, OverrideTable, RoleId};
use crate::overrides::PermissionOverrideStore;
use crate::request::RequestCache;

use super::{GroupDirectory, ResolverConfig, RoleSynchronizer};

/// Outsider roles of `account` for `group_type`: one synchronized role per
/// global role that has one, plus the type's generic outsider role.
///
/// Memoized in `request` per (global role set, group type), so two accounts
/// with the same global roles share one entry.
pub fn outsider_roles(
    directory: &dyn GroupDirectory,
    synchronizer: &dyn RoleSynchronizer,
    group_type: &GroupType,
    account: &Account,
    request: &RequestCache,
) -> DomainResult<Arc<Vec<GroupRole>>> {
    if let Some(roles) = request.outsider_roles(account, &group_type.id) {
        return Ok(roles);
    }

    let mut roles = Vec::with_capacity(account.roles.len() + 1);
    for global_role in &account.roles {
        let role_id = synchronizer.synchronized_outsider_role_id(&group_type.id, global_role);
        match directory.get_role(&role_id)? {
            Some(role) => roles.push(role),
            None => trace!(%role_id, "no synchronized outsider role"),
        }
    }
    roles.push(group_type.outsider_role.clone());

    let roles = Arc::new(roles);
    request.remember_outsider_roles(account, &group_type.id, Arc::clone(&roles));
    Ok(roles)
}

/// Answers "may this subject do X in this group" from override tables.
///
/// Override presence is a gate: for a group without an override every check
/// returns `false`. Default permissions for such groups come from the
/// [`DefaultRoleCalculator`](crate::calculator::DefaultRoleCalculator), not
/// from here.
pub struct PermissionResolver {
    directory: Arc<dyn GroupDirectory>,
    synchronizer: Arc<dyn RoleSynchronizer>,
    overrides: Arc<PermissionOverrideStore>,
    config: ResolverConfig,
}

impl std::fmt::Debug for PermissionResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PermissionResolver")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl PermissionResolver {
    pub fn new(
        directory: Arc<dyn GroupDirectory>,
        synchronizer: Arc<dyn RoleSynchronizer>,
        overrides: Arc<PermissionOverrideStore>,
    ) -> Self {
        Self {
            directory,
            synchronizer,
            overrides,
            config: ResolverConfig::default(),
        }
    }

    pub fn with_config(mut self, config: ResolverConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    fn group_type(&self, group: &Group) -> DomainResult<Option<GroupType>> {
        let group_type = self.directory.get_group_type(&group.group_type)?;
        if group_type.is_none() {
            warn!(group_id = %group.id, group_type = %group.group_type, "group has unknown type");
        }
        Ok(group_type)
    }

    fn override_table(&self, group: &Group, request: &RequestCache) -> DomainResult<Option<OverrideTable>> {
        self.overrides.get_override(group.id, request)
    }

    /// Whether `group` has an override with at least one role entry.
    pub fn has_custom_permissions(&self, group: &Group, request: &RequestCache) -> DomainResult<bool> {
        Ok(self
            .override_table(group, request)?
            .is_some_and(|table| !table.is_empty()))
    }

    /// Checks `permission` for `account`, classified as anonymous, member or
    /// outsider of `group`.
    #[instrument(skip(self, group, account, request), fields(group_id = %group.id, account_id = %account.id))]
    pub fn check_permission(
        &self,
        permission: &str,
        group: &Group,
        account: &Account,
        request: &RequestCache,
    ) -> DomainResult<bool> {
        if account.has_permission(&self.config.bypass_permission) {
            trace!("bypass permission held");
            return Ok(true);
        }

        let allowed = if account.is_anonymous() {
            self.check_anonymous_role(permission, group, request)?
        } else if self.directory.get_membership(account.id, group.id)?.is_some() {
            self.check_member_roles(permission, group, account, request)?
        } else {
            self.check_outsider_roles(permission, group, account, request)?
        };

        debug!(allowed, "checked group permission");
        Ok(allowed)
    }

    pub fn check_anonymous_role(
        &self,
        permission: &str,
        group: &Group,
        request: &RequestCache,
    ) -> DomainResult<bool> {
        let Some(table) = self.override_table(group, request)? else {
            return Ok(false);
        };
        let Some(group_type) = self.group_type(group)? else {
            return Ok(false);
        };
        Ok(table.role_has_permission(&group_type.anonymous_role.id, permission))
    }

    pub fn check_outsider_roles(
        &self,
        permission: &str,
        group: &Group,
        account: &Account,
        request: &RequestCache,
    ) -> DomainResult<bool> {
        let Some(table) = self.override_table(group, request)? else {
            return Ok(false);
        };
        let roles = self.get_outsider_roles(group, account, request)?;
        Ok(roles
            .iter()
            .any(|role| table.role_has_permission(&role.id, permission)))
    }

    /// The account's outsider roles for the type of `group`.
    pub fn get_outsider_roles(
        &self,
        group: &Group,
        account: &Account,
        request: &RequestCache,
    ) -> DomainResult<Arc<Vec<GroupRole>>> {
        let Some(group_type) = self.group_type(group)? else {
            return Ok(Arc::new(Vec::new()));
        };
        outsider_roles(
            self.directory.as_ref(),
            self.synchronizer.as_ref(),
            &group_type,
            account,
            request,
        )
    }

    pub fn check_member_roles(
        &self,
        permission: &str,
        group: &Group,
        account: &Account,
        request: &RequestCache,
    ) -> DomainResult<bool> {
        let Some(table) = self.override_table(group, request)? else {
            return Ok(false);
        };
        let Some(membership) = self.directory.get_membership(account.id, group.id)? else {
            return Ok(false);
        };
        Ok(membership
            .roles
            .iter()
            .any(|role_id| table.role_has_permission(role_id, permission)))
    }

    /// Checks a single role of `group` against the group's override.
    pub fn check_group_role(
        &self,
        permission: &str,
        group: &Group,
        role_id: &RoleId,
        request: &RequestCache,
    ) -> DomainResult<bool> {
        let Some(table) = self.override_table(group, request)? else {
            return Ok(false);
        };
        if table.permissions_for(role_id).is_some() && !self.role_belongs_to(group, role_id)? {
            warn!(group_id = %group.id, %role_id, "override references a role outside the group type");
            return Ok(false);
        }
        Ok(table.role_has_permission(role_id, permission))
    }

    fn role_belongs_to(&self, group: &Group, role_id: &RoleId) -> DomainResult<bool> {
        if let Some(group_type) = self.group_type(group)? {
            if group_type.has_role(role_id) {
                return Ok(true);
            }
        }
        Ok(self
            .directory
            .get_role(role_id)?
            .is_some_and(|role| role.group_type == group.group_type))
    }

    /// Roles shown for `group`: anonymous, outsider, then member roles by
    /// weight.
    pub fn member_roles_by_group(&self, group: &Group) -> DomainResult<Vec<GroupRole>> {
        let Some(group_type) = self.group_type(group)? else {
            return Ok(Vec::new());
        };
        let mut members = group_type.member_roles.clone();
        members.sort_by(|a, b| a.weight.cmp(&b.weight).then_with(|| a.id.cmp(&b.id)));

        let mut roles = Vec::with_capacity(members.len() + 2);
        roles.push(group_type.anonymous_role);
        roles.push(group_type.outsider_role);
        roles.extend(members);
        Ok(roles)
    }
}

//! Access record builder.

use std::sync::Arc;

use tracing::{debug, instrument, warn};

use crate::error::DomainResult;
use crate::model::{Account, ContentItem, Group, RoleScope};
use crate::request::RequestCache;
use crate::resolver::{GroupDirectory, PermissionResolver};

use super::{
    realm, AccessConfig, AccessGrantRow, GrantMap, GrantOperation, ANONYMOUS_REALM, AUTHOR_REALM,
    OUTSIDER_REALM,
};

/// Produces ACL rows for content and grant keys for subjects.
pub struct AccessGrantBuilder {
    directory: Arc<dyn GroupDirectory>,
    resolver: Arc<PermissionResolver>,
    config: AccessConfig,
}

impl std::fmt::Debug for AccessGrantBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessGrantBuilder")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl AccessGrantBuilder {
    pub fn new(directory: Arc<dyn GroupDirectory>, resolver: Arc<PermissionResolver>) -> Self {
        Self {
            directory,
            resolver,
            config: AccessConfig::default(),
        }
    }

    pub fn with_config(mut self, config: AccessConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &AccessConfig {
        &self.config
    }

    /// ACL rows for `item`; empty when none of its groups has an override.
    #[instrument(skip(self, item, request), fields(item_id = item.id))]
    pub fn build_access_records(
        &self,
        item: &ContentItem,
        request: &RequestCache,
    ) -> DomainResult<Vec<AccessGrantRow>> {
        let mut rows = Vec::new();
        for group_id in &item.groups {
            let Some(group) = self.directory.get_group(*group_id)? else {
                warn!(%group_id, "content references a missing group");
                continue;
            };
            if !self.resolver.has_custom_permissions(&group, request)? {
                continue;
            }
            self.build_group_records(item, &group, request, &mut rows)?;
        }
        debug!(rows = rows.len(), "built access records");
        Ok(rows)
    }

    fn build_group_records(
        &self,
        item: &ContentItem,
        group: &Group,
        request: &RequestCache,
        rows: &mut Vec<AccessGrantRow>,
    ) -> DomainResult<()> {
        let resolver = &self.resolver;
        let prefix = self.config.prefix(item.published);
        let permissions = item.permissions();
        let view = permissions.view();
        let update_any = permissions.update_any();
        let delete_any = permissions.delete_any();

        let roles = resolver.member_roles_by_group(group)?;
        for role in roles.iter().filter(|role| role.scope == RoleScope::Member) {
            rows.push(
                AccessGrantRow::new(group.id.0, realm(prefix, role.id.as_str()), 1).with_grants(
                    resolver.check_group_role(&view, group, &role.id, request)?,
                    resolver.check_group_role(&update_any, group, &role.id, request)?,
                    resolver.check_group_role(&delete_any, group, &role.id, request)?,
                ),
            );
        }

        if self.config.author_records {
            let owner = Account::new(item.owner);
            rows.push(
                AccessGrantRow::new(item.owner.0, realm(prefix, AUTHOR_REALM), 0).with_grants(
                    resolver.check_member_roles(&view, group, &owner, request)?,
                    resolver.check_member_roles(&permissions.update_own(), group, &owner, request)?,
                    resolver.check_member_roles(&permissions.delete_own(), group, &owner, request)?,
                ),
            );
        }

        let shared = self.config.shared_grant_id;
        if let Some(outsider) = roles.iter().find(|role| role.scope == RoleScope::Outsider) {
            rows.push(
                AccessGrantRow::new(shared, realm(prefix, OUTSIDER_REALM), 0).with_grants(
                    resolver.check_group_role(&view, group, &outsider.id, request)?,
                    resolver.check_group_role(&update_any, group, &outsider.id, request)?,
                    resolver.check_group_role(&delete_any, group, &outsider.id, request)?,
                ),
            );
        }

        let mut can_view = resolver.check_anonymous_role(&view, group, request)?;
        let mut can_update = resolver.check_anonymous_role(&update_any, group, request)?;
        let mut can_delete = resolver.check_anonymous_role(&delete_any, group, request)?;
        // Content owned by nobody: the anonymous role's "own" grants apply.
        if item.owner.is_anonymous() {
            can_view = can_view || resolver.check_anonymous_role(&permissions.view_own(), group, request)?;
            can_update =
                can_update || resolver.check_anonymous_role(&permissions.update_own(), group, request)?;
            can_delete =
                can_delete || resolver.check_anonymous_role(&permissions.delete_own(), group, request)?;
        }
        rows.push(
            AccessGrantRow::new(shared, realm(prefix, ANONYMOUS_REALM), 0)
                .with_grants(can_view, can_update, can_delete),
        );

        Ok(())
    }

    /// Realm -> grant ids `account` holds for `operation`.
    ///
    /// Unknown operations yield an empty map. Memoized in `request` per
    /// (account, global roles, operation).
    #[instrument(skip(self, account, request), fields(account_id = %account.id))]
    pub fn grant_access(
        &self,
        account: &Account,
        operation: &str,
        request: &RequestCache,
    ) -> DomainResult<Arc<GrantMap>> {
        if operation.parse::<GrantOperation>().is_err() {
            debug!("unknown grant operation");
            return Ok(Arc::new(GrantMap::new()));
        }
        if let Some(grants) = request.grants(account, operation) {
            return Ok(grants);
        }

        let shared = self.config.shared_grant_id;
        let mut grants = GrantMap::new();
        let mut grant = |suffix: &str, grant_id: u64| {
            for prefix in self.config.prefixes() {
                grants
                    .entry(realm(prefix, suffix))
                    .or_default()
                    .insert(grant_id);
            }
        };

        if account.is_anonymous() {
            grant(ANONYMOUS_REALM, shared);
        } else {
            grant(OUTSIDER_REALM, shared);
            if self.config.author_records {
                grant(AUTHOR_REALM, account.id.0);
            }
            for membership in self.directory.memberships_for(account.id)? {
                let group = &membership.group;
                for role_id in &membership.roles {
                    grant(role_id.as_str(), group.id.0);
                }
                for role in self.resolver.get_outsider_roles(group, account, request)?.iter() {
                    grant(role.id.as_str(), group.id.0);
                }
            }
        }

        let grants = Arc::new(grants);
        request.remember_grants(account, operation, Arc::clone(&grants));
        Ok(grants)
    }
}

//! Composition root for group permissions.
//!
//! [`GroupPermissionsService`] owns the cache bins, the override store, the
//! resolver, the calculation chain and the access grant builder, all wired to
//! one storage backend. Writes go through here so that every override change
//! invalidates the right tags and rewrites the affected ACL rows.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{debug, info, instrument, warn};

use gperm_domain::access::{AccessGrantBuilder, AccessGrantRow, GrantMap};
use gperm_domain::cache::{tags, CacheTagsInvalidator, TagInvalidation, TaggedCache};
use gperm_domain::calculator::{
    CalculatedPermissions, ChainCalculator, DefaultRoleCalculator, OverrideCalculator,
};
use gperm_domain::error::{DomainError, DomainResult};
use gperm_domain::model::{
    Account, AccountId, ContentItem, Group, GroupId, GroupRole, OverrideTable, PermissionOverride,
    RoleId, RoleScope,
};
use gperm_domain::overrides::{OverrideAccessPolicy, OverrideOperation, PermissionOverrideStore};
use gperm_domain::request::RequestCache;
use gperm_domain::resolver::{
    DefaultRoleSynchronizer, GroupDirectory, OverrideReader, PermissionResolver, RoleSynchronizer,
};
use gperm_domain::validation;
use gperm_domain::{AccessConfig, CacheConfig, ResolverConfig};
use gperm_storage::{AccessRecordStore, GroupStore, OverrideStorage};

use crate::adapters::{
    map_storage_error, to_content_item, to_stored_content, to_stored_permissions,
    to_stored_records, StorageGroupDirectory, StorageOverrideReader,
};
use crate::config::ServiceConfig;

/// Everything the service needs from storage.
pub trait PermissionStorage: OverrideStorage + GroupStore + AccessRecordStore {}

impl<T: OverrideStorage + GroupStore + AccessRecordStore> PermissionStorage for T {}

/// Registers service metric descriptions.
pub fn register_service_metrics() {
    metrics::describe_counter!(
        "gperm_override_writes_total",
        "Total number of override saves and reverts"
    );
    metrics::describe_counter!(
        "gperm_acl_rebuilds_total",
        "Total number of content items whose ACL rows were rewritten"
    );
}

/// Group permissions engine wired to a storage backend.
pub struct GroupPermissionsService<S: PermissionStorage> {
    storage: Arc<S>,
    directory: Arc<dyn GroupDirectory>,
    reader: Arc<dyn OverrideReader>,
    resolver: Arc<PermissionResolver>,
    chain: ChainCalculator,
    builder: AccessGrantBuilder,
    /// Every persistent cache bin.
    invalidator: CacheTagsInvalidator,
    policy: OverrideAccessPolicy,
}

impl<S: PermissionStorage> std::fmt::Debug for GroupPermissionsService<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GroupPermissionsService")
            .field("chain", &self.chain)
            .field("builder", &self.builder)
            .field("invalidator", &self.invalidator)
            .finish_non_exhaustive()
    }
}

impl<S: PermissionStorage> GroupPermissionsService<S> {
    /// Wires the engine with the default role synchronizer.
    pub fn new(storage: Arc<S>, config: &ServiceConfig) -> Self {
        Self::with_synchronizer(storage, config, Arc::new(DefaultRoleSynchronizer))
    }

    pub fn with_synchronizer(
        storage: Arc<S>,
        config: &ServiceConfig,
        synchronizer: Arc<dyn RoleSynchronizer>,
    ) -> Self {
        let cache_config = CacheConfig::from(&config.cache);
        let directory: Arc<dyn GroupDirectory> =
            Arc::new(StorageGroupDirectory::new(Arc::clone(&storage)));
        let reader: Arc<dyn OverrideReader> =
            Arc::new(StorageOverrideReader::new(Arc::clone(&storage)));

        let override_cache: Arc<TaggedCache<Option<OverrideTable>>> =
            Arc::new(TaggedCache::new("override", cache_config.clone()));
        let override_list_cache: Arc<TaggedCache<Arc<BTreeMap<GroupId, OverrideTable>>>> =
            Arc::new(TaggedCache::new("override_list", cache_config.clone()));
        let permission_cache: Arc<TaggedCache<Arc<CalculatedPermissions>>> =
            Arc::new(TaggedCache::new("group_permissions", cache_config));

        let invalidator = CacheTagsInvalidator::new()
            .with_backend(override_cache.clone())
            .with_backend(override_list_cache.clone())
            .with_backend(permission_cache.clone());

        let overrides = Arc::new(PermissionOverrideStore::new(
            Arc::clone(&reader),
            override_cache,
            override_list_cache,
        ));
        let resolver = Arc::new(
            PermissionResolver::new(
                Arc::clone(&directory),
                Arc::clone(&synchronizer),
                Arc::clone(&overrides),
            )
            .with_config(ResolverConfig::from(&config.permissions)),
        );
        let chain = ChainCalculator::new(permission_cache)
            .with_calculator(Arc::new(OverrideCalculator::new(
                Arc::clone(&directory),
                Arc::clone(&synchronizer),
                overrides,
            )))
            .with_calculator(Arc::new(DefaultRoleCalculator::new(
                Arc::clone(&directory),
                synchronizer,
            )));
        let builder = AccessGrantBuilder::new(Arc::clone(&directory), Arc::clone(&resolver))
            .with_config(AccessConfig::from(&config.access));

        Self {
            storage,
            directory,
            reader,
            resolver,
            chain,
            builder,
            invalidator,
            policy: OverrideAccessPolicy,
        }
    }

    pub fn storage(&self) -> &Arc<S> {
        &self.storage
    }

    pub fn resolver(&self) -> &PermissionResolver {
        &self.resolver
    }

    pub fn chain(&self) -> &ChainCalculator {
        &self.chain
    }

    pub fn access_builder(&self) -> &AccessGrantBuilder {
        &self.builder
    }

    fn load_group(&self, group_id: GroupId) -> DomainResult<Group> {
        self.directory
            .get_group(group_id)?
            .ok_or(DomainError::GroupNotFound { group_id })
    }

    // ========== Calculators ==========

    pub fn calculate_member_permissions(
        &self,
        account: &Account,
        request: &RequestCache,
    ) -> DomainResult<Arc<CalculatedPermissions>> {
        self.chain.calculate_member_permissions(account, request)
    }

    pub fn calculate_anonymous_permissions(
        &self,
        request: &RequestCache,
    ) -> DomainResult<Arc<CalculatedPermissions>> {
        self.chain.calculate_anonymous_permissions(request)
    }

    pub fn calculate_outsider_permissions(
        &self,
        account: &Account,
        request: &RequestCache,
    ) -> DomainResult<Arc<CalculatedPermissions>> {
        self.chain.calculate_outsider_permissions(account, request)
    }

    /// Effective permission check through the calculation chain, so groups
    /// without an override fall back to role defaults.
    #[instrument(skip(self, account, request), fields(account_id = %account.id))]
    pub fn has_group_permission(
        &self,
        permission: &str,
        group_id: GroupId,
        account: &Account,
        request: &RequestCache,
    ) -> DomainResult<bool> {
        if account.has_permission(&self.resolver.config().bypass_permission) {
            return Ok(true);
        }
        let (scope, calculated) = if account.is_anonymous() {
            (RoleScope::Anonymous, self.calculate_anonymous_permissions(request)?)
        } else if self.directory.get_membership(account.id, group_id)?.is_some() {
            (RoleScope::Member, self.calculate_member_permissions(account, request)?)
        } else {
            (RoleScope::Outsider, self.calculate_outsider_permissions(account, request)?)
        };
        Ok(calculated.has_permission(scope, group_id, permission))
    }

    // ========== Override-gated checks ==========

    pub fn check_permission(
        &self,
        permission: &str,
        group_id: GroupId,
        account: &Account,
        request: &RequestCache,
    ) -> DomainResult<bool> {
        let Some(group) = self.directory.get_group(group_id)? else {
            return Ok(false);
        };
        self.resolver.check_permission(permission, &group, account, request)
    }

    pub fn check_group_role(
        &self,
        permission: &str,
        group_id: GroupId,
        role_id: &RoleId,
        request: &RequestCache,
    ) -> DomainResult<bool> {
        let Some(group) = self.directory.get_group(group_id)? else {
            return Ok(false);
        };
        self.resolver.check_group_role(permission, &group, role_id, request)
    }

    /// Roles to show when editing the override of `group_id`.
    pub fn member_roles_by_group(&self, group_id: GroupId) -> DomainResult<Vec<GroupRole>> {
        let group = self.load_group(group_id)?;
        self.resolver.member_roles_by_group(&group)
    }

    // ========== Access records ==========

    pub fn build_access_records(
        &self,
        item: &ContentItem,
        request: &RequestCache,
    ) -> DomainResult<Vec<AccessGrantRow>> {
        self.builder.build_access_records(item, request)
    }

    pub fn grant_access(
        &self,
        account: &Account,
        operation: &str,
        request: &RequestCache,
    ) -> DomainResult<Arc<GrantMap>> {
        self.builder.grant_access(account, operation, request)
    }

    /// Stores `item` and writes its ACL rows.
    #[instrument(skip(self, item, request), fields(item_id = item.id))]
    pub fn save_content(&self, item: &ContentItem, request: &RequestCache) -> DomainResult<()> {
        self.storage
            .put_content(to_stored_content(item))
            .map_err(map_storage_error)?;
        self.write_access_records(item, request)
    }

    fn write_access_records(&self, item: &ContentItem, request: &RequestCache) -> DomainResult<()> {
        let rows = self.builder.build_access_records(item, request)?;
        self.storage
            .write_records(item.id, to_stored_records(item.id, rows))
            .map_err(map_storage_error)?;
        metrics::counter!("gperm_acl_rebuilds_total").increment(1);
        Ok(())
    }

    /// Ids of content `account` may perform `operation` on, according to the
    /// stored ACL rows.
    pub fn accessible_content(
        &self,
        account: &Account,
        operation: &str,
        request: &RequestCache,
    ) -> DomainResult<Vec<u64>> {
        let grants = self.builder.grant_access(account, operation, request)?;
        if grants.is_empty() {
            return Ok(Vec::new());
        }
        self.storage
            .accessible_content(&grants, operation)
            .map_err(map_storage_error)
    }

    /// Rewrites the ACL rows of every content item in `group_id`.
    pub fn rebuild_group_records(&self, group_id: GroupId, request: &RequestCache) -> DomainResult<usize> {
        let content = self
            .storage
            .content_in_group(group_id.0)
            .map_err(map_storage_error)?;
        let count = content.len();
        for stored in content {
            self.write_access_records(&to_content_item(stored), request)?;
        }
        debug!(%group_id, count, "rebuilt access records");
        Ok(count)
    }

    // ========== Override editing ==========

    fn authorize(&self, operation: OverrideOperation, actor: &Account) -> DomainResult<()> {
        if self.policy.check(operation, actor).is_allowed() {
            return Ok(());
        }
        warn!(account_id = %actor.id, %operation, "override operation denied");
        Err(DomainError::AccessDenied {
            operation: operation.to_string(),
        })
    }

    /// Creates or replaces the override of `group_id`.
    #[instrument(skip(self, actor, table, request), fields(account_id = %actor.id))]
    pub fn save_override(
        &self,
        actor: &Account,
        group_id: GroupId,
        table: OverrideTable,
        request: &RequestCache,
    ) -> DomainResult<PermissionOverride> {
        let group = self.load_group(group_id)?;
        let existing = self.reader.load_by_group(group_id)?;
        let operation = if existing.is_some() {
            OverrideOperation::Update
        } else {
            OverrideOperation::Create
        };
        self.authorize(operation, actor)?;

        let group_type = self
            .directory
            .get_group_type(&group.group_type)?
            .ok_or_else(|| DomainError::GroupTypeNotFound {
                group_type: group.group_type.clone(),
            })?;
        let synchronized = self.directory.synchronized_roles(&group_type.id)?;
        let entity = PermissionOverride {
            id: existing.as_ref().and_then(|existing| existing.id),
            group_id,
            permissions: table,
        };
        validation::validate(&group_type, &synchronized, &entity, existing.as_ref())
            .map_err(validation::into_domain_error)?;

        let permissions = to_stored_permissions(&entity.permissions);
        let stored = match entity.id {
            Some(id) => self.storage.update_override(id, permissions),
            None => self.storage.create_override(group_id.0, permissions),
        }
        .map_err(map_storage_error)?;

        self.invalidate(&tags::for_override_write(group_id), request)?;
        self.rebuild_group_records(group_id, request)?;

        metrics::counter!("gperm_override_writes_total", "operation" => operation.as_str())
            .increment(1);
        info!(%group_id, %operation, roles = entity.permissions.len(), "saved permission override");
        Ok(PermissionOverride {
            id: Some(stored.id),
            ..entity
        })
    }

    /// Deletes the override of `group_id` so its roles fall back to their
    /// defaults. Returns `false` when there was nothing to delete.
    #[instrument(skip(self, actor, request), fields(account_id = %actor.id))]
    pub fn revert_to_defaults(
        &self,
        actor: &Account,
        group_id: GroupId,
        request: &RequestCache,
    ) -> DomainResult<bool> {
        let Some(existing) = self.reader.load_by_group(group_id)? else {
            debug!(%group_id, "no override to revert");
            return Ok(false);
        };
        self.authorize(OverrideOperation::Delete, actor)?;

        if let Some(id) = existing.id {
            self.storage.delete_override(id).map_err(map_storage_error)?;
        }
        self.invalidate(&tags::for_override_write(group_id), request)?;
        self.rebuild_group_records(group_id, request)?;

        metrics::counter!("gperm_override_writes_total", "operation" => OverrideOperation::Delete.as_str())
            .increment(1);
        info!(%group_id, "reverted group permissions to defaults");
        Ok(true)
    }

    // ========== Group writes ==========

    /// Call after a group's own fields changed.
    pub fn group_updated(&self, group_id: GroupId, request: &RequestCache) -> DomainResult<()> {
        self.invalidate(&[tags::group(group_id)], request)
    }

    /// Call after a group was created.
    pub fn group_created(&self, request: &RequestCache) -> DomainResult<()> {
        self.invalidate(&[tags::GROUP_LIST.to_string()], request)
    }

    /// Call after `account_id` joined or left `group_id`, or had its roles
    /// there changed. Drops the account's cached results and rewrites the
    /// group's ACL rows.
    #[instrument(skip(self, request))]
    pub fn membership_changed(
        &self,
        account_id: AccountId,
        group_id: GroupId,
        request: &RequestCache,
    ) -> DomainResult<()> {
        self.invalidate(&[tags::account(account_id)], request)?;
        let rebuilt = self.rebuild_group_records(group_id, request)?;
        debug!(rebuilt, "membership change applied");
        Ok(())
    }

    /// Invalidates `tags` in every persistent bin and in `request`.
    pub fn invalidate(&self, tags: &[String], request: &RequestCache) -> DomainResult<()> {
        self.invalidator.invalidate_tags(tags)?;
        request.invalidate_tags(tags)
    }
}

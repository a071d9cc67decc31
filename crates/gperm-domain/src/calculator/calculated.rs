//! Calculated permission sets and their merge rules.

use std::collections::{BTreeMap, BTreeSet};

use crate::cache::{CacheableDependency, CacheableMetadata};
use crate::model::{GroupId, RoleScope};

/// Permissions granted to one audience scope in one group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalculatedPermissionsItem {
    pub scope: RoleScope,
    pub group_id: GroupId,
    pub permissions: BTreeSet<String>,
}

impl CalculatedPermissionsItem {
    pub fn new(
        scope: RoleScope,
        group_id: GroupId,
        permissions: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            scope,
            group_id,
            permissions: permissions.into_iter().map(Into::into).collect(),
        }
    }

    pub fn key(&self) -> (RoleScope, GroupId) {
        (self.scope, self.group_id)
    }

    pub fn has_permission(&self, permission: &str) -> bool {
        self.permissions.contains(permission)
    }
}

type ItemMap = BTreeMap<(RoleScope, GroupId), CalculatedPermissionsItem>;

/// Mutable accumulator that calculators fill and the chain merges.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RefinableCalculatedPermissions {
    items: ItemMap,
    metadata: CacheableMetadata,
}

impl RefinableCalculatedPermissions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an item.
    ///
    /// With `overwrite` the item replaces any existing item for the same
    /// (scope, group); otherwise the permission sets are unioned.
    pub fn add_item(&mut self, item: CalculatedPermissionsItem, overwrite: bool) -> &mut Self {
        match self.items.get_mut(&item.key()) {
            Some(existing) if !overwrite => {
                existing.permissions.extend(item.permissions);
            }
            _ => {
                self.items.insert(item.key(), item);
            }
        }
        self
    }

    /// Merges every item and all cache metadata of `other` into this set.
    pub fn merge(&mut self, other: RefinableCalculatedPermissions, overwrite: bool) -> &mut Self {
        self.metadata.merge(&other.metadata);
        for item in other.items.into_values() {
            self.add_item(item, overwrite);
        }
        self
    }

    pub fn add_dependency(&mut self, dependency: &impl CacheableDependency) -> &mut Self {
        self.metadata.add_dependency(dependency);
        self
    }

    pub fn add_cache_tags<I, S>(&mut self, tags: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.metadata.add_tags(tags);
        self
    }

    pub fn add_cache_contexts<I, S>(&mut self, contexts: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.metadata.add_contexts(contexts);
        self
    }

    pub fn metadata(&self) -> &CacheableMetadata {
        &self.metadata
    }

    pub fn items(&self) -> impl Iterator<Item = &CalculatedPermissionsItem> {
        self.items.values()
    }

    pub fn freeze(self) -> CalculatedPermissions {
        CalculatedPermissions {
            items: self.items,
            metadata: self.metadata,
        }
    }
}

/// Immutable calculation result, shared through the cache tiers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CalculatedPermissions {
    items: ItemMap,
    metadata: CacheableMetadata,
}

impl CalculatedPermissions {
    pub fn get_item(&self, scope: RoleScope, group_id: GroupId) -> Option<&CalculatedPermissionsItem> {
        self.items.get(&(scope, group_id))
    }

    pub fn items(&self) -> impl Iterator<Item = &CalculatedPermissionsItem> {
        self.items.values()
    }

    pub fn items_by_scope(
        &self,
        scope: RoleScope,
    ) -> impl Iterator<Item = &CalculatedPermissionsItem> {
        self.items.values().filter(move |item| item.scope == scope)
    }

    pub fn has_permission(&self, scope: RoleScope, group_id: GroupId, permission: &str) -> bool {
        self.get_item(scope, group_id)
            .is_some_and(|item| item.has_permission(permission))
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Tags and contexts this result depends on.
    pub fn metadata(&self) -> &CacheableMetadata {
        &self.metadata
    }
}

impl CacheableDependency for CalculatedPermissions {
    fn cache_tags(&self) -> Vec<String> {
        self.metadata.cache_tags()
    }

    fn cache_contexts(&self) -> Vec<String> {
        self.metadata.cache_contexts()
    }
}

//! Per-group permission overrides.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use super::types::{GroupId, RoleId};
use crate::cache::{tags, CacheableDependency};

/// Role id -> explicit permission list for one group.
///
/// A role present with an empty set grants nothing; a role missing from the
/// table also grants nothing while the table exists.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OverrideTable(BTreeMap<RoleId, BTreeSet<String>>);

impl OverrideTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the permission list of a role, replacing any previous entry.
    pub fn set_role(
        &mut self,
        role_id: impl Into<RoleId>,
        permissions: impl IntoIterator<Item = impl Into<String>>,
    ) {
        self.0.insert(
            role_id.into(),
            permissions.into_iter().map(Into::into).collect(),
        );
    }

    pub fn with_role(
        mut self,
        role_id: impl Into<RoleId>,
        permissions: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        self.set_role(role_id, permissions);
        self
    }

    pub fn permissions_for(&self, role_id: &RoleId) -> Option<&BTreeSet<String>> {
        self.0.get(role_id)
    }

    /// Whether `role_id` has an entry that contains `permission`.
    pub fn role_has_permission(&self, role_id: &RoleId, permission: &str) -> bool {
        self.0
            .get(role_id)
            .is_some_and(|permissions| permissions.contains(permission))
    }

    pub fn roles(&self) -> impl Iterator<Item = &RoleId> {
        self.0.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&RoleId, &BTreeSet<String>)> {
        self.0.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

impl FromIterator<(RoleId, BTreeSet<String>)> for OverrideTable {
    fn from_iter<I: IntoIterator<Item = (RoleId, BTreeSet<String>)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// The override entity: at most one per group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionOverride {
    /// Storage id; `None` until first persisted.
    pub id: Option<u64>,
    pub group_id: GroupId,
    pub permissions: OverrideTable,
}

impl PermissionOverride {
    pub fn new(group_id: GroupId, permissions: OverrideTable) -> Self {
        Self {
            id: None,
            group_id,
            permissions,
        }
    }

    pub fn is_new(&self) -> bool {
        self.id.is_none()
    }
}

impl CacheableDependency for PermissionOverride {
    fn cache_tags(&self) -> Vec<String> {
        vec![tags::permission_override(self.group_id)]
    }
}

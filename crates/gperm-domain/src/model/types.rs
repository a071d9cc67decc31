//! Core model types: groups, group types, roles, accounts and memberships.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::cache::{tags, CacheableDependency};

/// Identifier of a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GroupId(pub u64);

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of an account. Account `0` is the anonymous subject.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(pub u64);

impl AccountId {
    /// The anonymous subject.
    pub const ANONYMOUS: AccountId = AccountId(0);

    pub fn is_anonymous(&self) -> bool {
        *self == Self::ANONYMOUS
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a group role (e.g. "club-editor").
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoleId(String);

impl RoleId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RoleId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for RoleId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// The three audiences a group role can apply to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoleScope {
    /// No account.
    Anonymous,
    /// An account without a membership in the group.
    Outsider,
    /// An account with an active membership in the group.
    Member,
}

impl RoleScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            RoleScope::Anonymous => "anonymous",
            RoleScope::Outsider => "outsider",
            RoleScope::Member => "member",
        }
    }
}

impl fmt::Display for RoleScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A role defined by a group type, carrying its default permission set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupRole {
    pub id: RoleId,
    pub group_type: String,
    pub scope: RoleScope,
    /// Statically configured permissions, used whenever no override applies.
    pub permissions: BTreeSet<String>,
    /// Ordering weight in the permissions UI.
    #[serde(default)]
    pub weight: i32,
    /// Global role this outsider role is synchronized from, if any.
    #[serde(default)]
    pub global_role: Option<String>,
}

impl GroupRole {
    pub fn new(
        id: impl Into<RoleId>,
        group_type: impl Into<String>,
        scope: RoleScope,
        permissions: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            id: id.into(),
            group_type: group_type.into(),
            scope,
            permissions: permissions.into_iter().map(Into::into).collect(),
            weight: 0,
            global_role: None,
        }
    }

    pub fn with_weight(mut self, weight: i32) -> Self {
        self.weight = weight;
        self
    }

    /// Marks the role as the synchronized outsider role for `global_role`.
    pub fn synchronized_from(mut self, global_role: impl Into<String>) -> Self {
        self.global_role = Some(global_role.into());
        self
    }

    pub fn is_synchronized(&self) -> bool {
        self.global_role.is_some()
    }

    pub fn has_permission(&self, permission: &str) -> bool {
        self.permissions.contains(permission)
    }
}

impl CacheableDependency for GroupRole {
    fn cache_tags(&self) -> Vec<String> {
        vec![tags::group_role(&self.id)]
    }
}

/// A group type and its special roles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupType {
    pub id: String,
    pub anonymous_role: GroupRole,
    pub outsider_role: GroupRole,
    pub member_roles: Vec<GroupRole>,
}

impl GroupType {
    /// Looks up one of the type's own (non-synchronized) roles.
    pub fn role(&self, role_id: &RoleId) -> Option<&GroupRole> {
        self.roles().find(|role| &role.id == role_id)
    }

    /// All non-synchronized roles: anonymous, outsider, then member roles.
    pub fn roles(&self) -> impl Iterator<Item = &GroupRole> {
        std::iter::once(&self.anonymous_role)
            .chain(std::iter::once(&self.outsider_role))
            .chain(self.member_roles.iter())
    }

    pub fn has_role(&self, role_id: &RoleId) -> bool {
        self.role(role_id).is_some()
    }
}

/// An identified group container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub id: GroupId,
    pub group_type: String,
    #[serde(default)]
    pub label: String,
}

impl Group {
    pub fn new(id: GroupId, group_type: impl Into<String>) -> Self {
        Self {
            id,
            group_type: group_type.into(),
            label: String::new(),
        }
    }
}

impl CacheableDependency for Group {
    fn cache_tags(&self) -> Vec<String> {
        vec![tags::group(self.id)]
    }
}

/// The acting subject.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    /// Global (site-wide) roles, excluding the implicit authenticated role.
    #[serde(default)]
    pub roles: BTreeSet<String>,
    /// Global permissions granted through the account's roles.
    #[serde(default)]
    pub permissions: BTreeSet<String>,
}

impl Account {
    pub fn new(id: AccountId) -> Self {
        Self {
            id,
            roles: BTreeSet::new(),
            permissions: BTreeSet::new(),
        }
    }

    pub fn anonymous() -> Self {
        Self::new(AccountId::ANONYMOUS)
    }

    pub fn with_roles(mut self, roles: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.roles.extend(roles.into_iter().map(Into::into));
        self
    }

    pub fn with_permissions(
        mut self,
        permissions: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        self.permissions
            .extend(permissions.into_iter().map(Into::into));
        self
    }

    pub fn is_anonymous(&self) -> bool {
        self.id.is_anonymous()
    }

    pub fn has_permission(&self, permission: &str) -> bool {
        self.permissions.contains(permission)
    }
}

impl CacheableDependency for Account {
    fn cache_tags(&self) -> Vec<String> {
        vec![tags::account(self.id)]
    }
}

/// An account's membership in one group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Membership {
    pub account: AccountId,
    pub group: Group,
    /// Member-scope roles held in the group.
    pub roles: Vec<RoleId>,
}

impl Membership {
    pub fn new(account: AccountId, group: Group, roles: Vec<RoleId>) -> Self {
        Self {
            account,
            group,
            roles,
        }
    }
}

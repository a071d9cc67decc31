//! Collaborator contracts consumed by the resolver, calculators and builder.

use crate::error::DomainResult;
use crate::model::{AccountId, Group, GroupId, GroupRole, GroupType, Membership, PermissionOverride, RoleId};

/// Read access to groups, group types, roles and memberships.
pub trait GroupDirectory: Send + Sync {
    fn get_group(&self, group_id: GroupId) -> DomainResult<Option<Group>>;

    /// All groups, used by audience-wide calculations.
    fn list_groups(&self) -> DomainResult<Vec<Group>>;

    fn get_group_type(&self, group_type: &str) -> DomainResult<Option<GroupType>>;

    /// Loads any role by id, including synchronized outsider roles.
    fn get_role(&self, role_id: &RoleId) -> DomainResult<Option<GroupRole>>;

    fn get_membership(
        &self,
        account: AccountId,
        group_id: GroupId,
    ) -> DomainResult<Option<Membership>>;

    fn memberships_for(&self, account: AccountId) -> DomainResult<Vec<Membership>>;

    /// Synchronized outsider roles defined for a group type.
    ///
    /// Default implementation returns none.
    fn synchronized_roles(&self, _group_type: &str) -> DomainResult<Vec<GroupRole>> {
        Ok(Vec::new())
    }
}

/// Maps global roles onto group-type specific outsider roles.
pub trait RoleSynchronizer: Send + Sync {
    fn synchronized_outsider_role_id(&self, group_type: &str, global_role: &str) -> RoleId;
}

/// Names synchronized roles `<group_type>-<global_role>`.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultRoleSynchronizer;

impl RoleSynchronizer for DefaultRoleSynchronizer {
    fn synchronized_outsider_role_id(&self, group_type: &str, global_role: &str) -> RoleId {
        RoleId::new(format!("{group_type}-{global_role}"))
    }
}

/// Read access to override storage.
pub trait OverrideReader: Send + Sync {
    fn load_by_group(&self, group_id: GroupId) -> DomainResult<Option<PermissionOverride>>;

    fn load_all(&self) -> DomainResult<Vec<PermissionOverride>>;
}

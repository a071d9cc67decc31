//! Group permission model.
//!
//! Groups, their types and roles, accounts and memberships, per-group
//! permission overrides, and the content items access grants are built for.

mod content;
mod overrides;
mod types;

pub use content::{ContentItem, ContentPermissions};
pub use overrides::{OverrideTable, PermissionOverride};
pub use types::{
    Account, AccountId, Group, GroupId, GroupRole, GroupType, Membership, RoleId, RoleScope,
};

//! Permission resolution against a single group.
//!
//! The resolver answers boolean checks for a subject classified into one of
//! three scopes:
//!
//! - anonymous: no account, checked against the group type's anonymous role
//! - member: an account with a membership, checked against its member roles
//! - outsider: any other account, checked against the generic outsider role
//!   plus the synchronized outsider roles derived from its global roles
//!
//! All checks read the group's override table. A group without one answers
//! `false` everywhere; its defaults are served by the calculation chain.

mod config;
mod permission_resolver;
mod traits;

#[cfg(test)]
pub(crate) mod tests;

pub use config::{ResolverConfig, DEFAULT_BYPASS_PERMISSION};
pub use permission_resolver::{outsider_roles, PermissionResolver};
pub use traits::{DefaultRoleSynchronizer, GroupDirectory, OverrideReader, RoleSynchronizer};

//! The calculator capability shared by every chain entry.

use std::fmt;

use crate::error::DomainResult;
use crate::model::{Account, RoleScope};
use crate::request::RequestCache;

use super::RefinableCalculatedPermissions;

/// Who a calculation is for.
#[derive(Debug, Clone, Copy)]
pub enum Audience<'a> {
    /// Subjects without an account.
    Anonymous,
    /// An account, evaluated against groups it does not belong to.
    Outsider(&'a Account),
    /// An account, evaluated against its memberships.
    Member(&'a Account),
}

impl<'a> Audience<'a> {
    pub fn scope(&self) -> RoleScope {
        match self {
            Audience::Anonymous => RoleScope::Anonymous,
            Audience::Outsider(_) => RoleScope::Outsider,
            Audience::Member(_) => RoleScope::Member,
        }
    }

    pub fn account(&self) -> Option<&'a Account> {
        match self {
            Audience::Anonymous => None,
            Audience::Outsider(account) | Audience::Member(account) => Some(account),
        }
    }
}

impl fmt::Display for Audience<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.scope().as_str())
    }
}

/// Computes permissions for an audience.
///
/// Implementations are entries of a [`ChainCalculator`](super::ChainCalculator).
/// An authoritative calculator's items replace those of earlier entries for
/// the same (scope, group); all others are unioned.
pub trait PermissionCalculator: Send + Sync {
    /// Short label for logs.
    fn name(&self) -> &'static str;

    fn is_authoritative(&self) -> bool {
        false
    }

    fn calculate(
        &self,
        audience: Audience<'_>,
        request: &RequestCache,
    ) -> DomainResult<RefinableCalculatedPermissions>;

    fn calculate_member_permissions(
        &self,
        account: &Account,
        request: &RequestCache,
    ) -> DomainResult<RefinableCalculatedPermissions> {
        self.calculate(Audience::Member(account), request)
    }

    fn calculate_anonymous_permissions(
        &self,
        request: &RequestCache,
    ) -> DomainResult<RefinableCalculatedPermissions> {
        self.calculate(Audience::Anonymous, request)
    }

    fn calculate_outsider_permissions(
        &self,
        account: &Account,
        request: &RequestCache,
    ) -> DomainResult<RefinableCalculatedPermissions> {
        self.calculate(Audience::Outsider(account), request)
    }
}

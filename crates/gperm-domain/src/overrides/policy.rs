//! Who may create, edit or delete override entities.

use std::fmt;
use std::str::FromStr;

use crate::model::Account;

pub const ADD_PERMISSION: &str = "add group permission entities";
pub const EDIT_PERMISSION: &str = "edit group permission entities";
pub const DELETE_PERMISSION: &str = "delete group permission entities";

/// Operations on an override entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverrideOperation {
    Create,
    Update,
    Delete,
}

impl OverrideOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            OverrideOperation::Create => "create",
            OverrideOperation::Update => "update",
            OverrideOperation::Delete => "delete",
        }
    }
}

impl fmt::Display for OverrideOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OverrideOperation {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "create" => Ok(OverrideOperation::Create),
            "update" => Ok(OverrideOperation::Update),
            "delete" => Ok(OverrideOperation::Delete),
            _ => Err(()),
        }
    }
}

/// Outcome of an access check. Neutral means "no opinion"; callers deny
/// unless something else allows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessDecision {
    Allowed,
    Neutral,
}

impl AccessDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, AccessDecision::Allowed)
    }

    fn allowed_if(condition: bool) -> Self {
        if condition {
            AccessDecision::Allowed
        } else {
            AccessDecision::Neutral
        }
    }
}

/// Global-permission policy for override entities.
///
/// The group bypass permission does not apply here.
#[derive(Debug, Clone, Copy, Default)]
pub struct OverrideAccessPolicy;

impl OverrideAccessPolicy {
    pub fn check(&self, operation: OverrideOperation, account: &Account) -> AccessDecision {
        let required = match operation {
            OverrideOperation::Create => ADD_PERMISSION,
            OverrideOperation::Update => EDIT_PERMISSION,
            OverrideOperation::Delete => DELETE_PERMISSION,
        };
        AccessDecision::allowed_if(account.has_permission(required))
    }

    /// Checks an operation given by name; unknown operations are neutral.
    pub fn check_named(&self, operation: &str, account: &Account) -> AccessDecision {
        match operation.parse::<OverrideOperation>() {
            Ok(operation) => self.check(operation, account),
            Err(()) => AccessDecision::Neutral,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::AccountId;

    #[test]
    fn test_each_operation_requires_its_own_permission() {
        let editor = Account::new(AccountId(1)).with_permissions([EDIT_PERMISSION]);
        let policy = OverrideAccessPolicy;

        assert!(policy.check(OverrideOperation::Update, &editor).is_allowed());
        assert!(!policy.check(OverrideOperation::Create, &editor).is_allowed());
        assert!(!policy.check(OverrideOperation::Delete, &editor).is_allowed());
    }

    #[test]
    fn test_unknown_operation_is_neutral() {
        let admin = Account::new(AccountId(1)).with_permissions([
            ADD_PERMISSION,
            EDIT_PERMISSION,
            DELETE_PERMISSION,
        ]);

        assert_eq!(
            OverrideAccessPolicy.check_named("archive", &admin),
            AccessDecision::Neutral
        );
        assert!(OverrideAccessPolicy.check_named("delete", &admin).is_allowed());
    }

    #[test]
    fn test_bypass_does_not_grant_override_editing() {
        let bypass = Account::new(AccountId(1)).with_permissions(["bypass group access"]);

        assert_eq!(
            OverrideAccessPolicy.check(OverrideOperation::Create, &bypass),
            AccessDecision::Neutral
        );
    }
}

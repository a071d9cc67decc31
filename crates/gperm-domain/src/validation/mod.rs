//! Override validation.
//!
//! Validates an override entity before it is persisted:
//! - Every role key belongs to the group's type (its own roles or one of its
//!   synchronized outsider roles)
//! - Permission strings are non-empty
//! - A group never gets a second override

use std::collections::HashSet;

use crate::error::DomainError;
use crate::model::{GroupId, GroupRole, GroupType, PermissionOverride, RoleId};

/// Validation error types
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    /// A role key is not a role of the group's type
    RoleNotInGroupType { group_type: String, role_id: RoleId },
    /// A permission string is empty or whitespace
    EmptyPermission { role_id: RoleId },
    /// The group already has a different override
    DuplicateOverride { group_id: GroupId },
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::RoleNotInGroupType {
                group_type,
                role_id,
            } => write!(f, "role '{role_id}' is not a role of group type '{group_type}'"),
            ValidationError::EmptyPermission { role_id } => {
                write!(f, "role '{role_id}' lists an empty permission")
            }
            ValidationError::DuplicateOverride { group_id } => {
                write!(f, "group {group_id} already has a permission override")
            }
        }
    }
}

impl std::error::Error for ValidationError {}

/// Result type for validation operations
pub type ValidationResult<T> = Result<T, Vec<ValidationError>>;

/// Validator for the overrides of one group type.
pub struct OverrideValidator {
    group_type: String,
    allowed_roles: HashSet<RoleId>,
}

impl OverrideValidator {
    /// `synchronized` are the type's synchronized outsider roles.
    pub fn new(group_type: &GroupType, synchronized: &[GroupRole]) -> Self {
        let allowed_roles = group_type
            .roles()
            .chain(synchronized.iter().filter(|role| role.group_type == group_type.id))
            .map(|role| role.id.clone())
            .collect();
        Self {
            group_type: group_type.id.clone(),
            allowed_roles,
        }
    }

    /// Validates `entity`; `existing` is the group's stored override, if any.
    pub fn validate(
        &self,
        entity: &PermissionOverride,
        existing: Option<&PermissionOverride>,
    ) -> ValidationResult<()> {
        let mut errors = Vec::new();

        if let Some(existing) = existing {
            if entity.is_new() || existing.id != entity.id {
                errors.push(ValidationError::DuplicateOverride {
                    group_id: entity.group_id,
                });
            }
        }

        for (role_id, permissions) in entity.permissions.iter() {
            if !self.allowed_roles.contains(role_id) {
                errors.push(ValidationError::RoleNotInGroupType {
                    group_type: self.group_type.clone(),
                    role_id: role_id.clone(),
                });
            }
            if permissions.iter().any(|p| p.trim().is_empty()) {
                errors.push(ValidationError::EmptyPermission {
                    role_id: role_id.clone(),
                });
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Validate an override against its group type
pub fn validate(
    group_type: &GroupType,
    synchronized: &[GroupRole],
    entity: &PermissionOverride,
    existing: Option<&PermissionOverride>,
) -> ValidationResult<()> {
    OverrideValidator::new(group_type, synchronized).validate(entity, existing)
}

/// Collapses validation errors into one domain error.
///
/// A duplicate is reported as [`DomainError::DuplicateOverride`]; anything
/// else as [`DomainError::InvalidOverride`] listing every problem.
pub fn into_domain_error(errors: Vec<ValidationError>) -> DomainError {
    if let Some(group_id) = errors.iter().find_map(|e| match e {
        ValidationError::DuplicateOverride { group_id } => Some(*group_id),
        _ => None,
    }) {
        return DomainError::DuplicateOverride { group_id };
    }
    let message = errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ");
    DomainError::InvalidOverride { message }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{OverrideTable, RoleScope};
    use crate::resolver::tests::mocks::club_type;

    fn synchronized() -> Vec<GroupRole> {
        vec![
            GroupRole::new("club-staff", "club", RoleScope::Outsider, Vec::<String>::new())
                .synchronized_from("staff"),
            GroupRole::new("forum-staff", "forum", RoleScope::Outsider, Vec::<String>::new())
                .synchronized_from("staff"),
        ]
    }

    fn entity(table: OverrideTable) -> PermissionOverride {
        PermissionOverride::new(GroupId(1), table)
    }

    #[test]
    fn test_validator_accepts_own_and_synchronized_roles() {
        let table = OverrideTable::new()
            .with_role("club-anonymous", ["view"])
            .with_role("club-editor", ["view", "edit"])
            .with_role("club-staff", ["moderate"]);

        assert_eq!(validate(&club_type(), &synchronized(), &entity(table), None), Ok(()));
    }

    #[test]
    fn test_validator_rejects_foreign_roles() {
        let table = OverrideTable::new().with_role("forum-staff", ["moderate"]);

        let errors = validate(&club_type(), &synchronized(), &entity(table), None).unwrap_err();

        assert_eq!(
            errors,
            vec![ValidationError::RoleNotInGroupType {
                group_type: "club".to_string(),
                role_id: RoleId::new("forum-staff"),
            }]
        );
    }

    #[test]
    fn test_validator_rejects_empty_permission_strings() {
        let table = OverrideTable::new().with_role("club-editor", ["view", " "]);

        let errors = validate(&club_type(), &[], &entity(table), None).unwrap_err();

        assert!(matches!(errors[0], ValidationError::EmptyPermission { .. }));
    }

    #[test]
    fn test_validator_rejects_second_override_for_group() {
        let mut stored = entity(OverrideTable::new());
        stored.id = Some(1);
        let fresh = entity(OverrideTable::new().with_role("club-editor", ["view"]));

        let errors = validate(&club_type(), &[], &fresh, Some(&stored)).unwrap_err();

        assert!(matches!(
            into_domain_error(errors),
            DomainError::DuplicateOverride { group_id: GroupId(1) }
        ));
    }

    #[test]
    fn test_validator_accepts_update_of_existing_override() {
        let mut stored = entity(OverrideTable::new());
        stored.id = Some(1);
        let mut updated = entity(OverrideTable::new().with_role("club-editor", ["view"]));
        updated.id = Some(1);

        assert_eq!(validate(&club_type(), &[], &updated, Some(&stored)), Ok(()));
    }

    #[test]
    fn test_errors_are_joined_into_invalid_override() {
        let table = OverrideTable::new()
            .with_role("nope", ["view"])
            .with_role("club-editor", [""]);

        let errors = validate(&club_type(), &[], &entity(table), None).unwrap_err();
        let error = into_domain_error(errors);

        match error {
            DomainError::InvalidOverride { message } => {
                assert!(message.contains("'nope'"));
                assert!(message.contains("empty permission"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}

//! Request-scoped state.
//!
//! A [`RequestCache`] is created by the caller at the start of a request and
//! passed explicitly to every operation. It holds the static permission tier,
//! single-flight override slots, the outsider-role memo of the current
//! resolution pass, and the grant memo. Dropping it ends the request; nothing
//! here is process-global.

use std::collections::BTreeMap;
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;

use crate::access::GrantMap;
use crate::cache::{tags, CacheContext, StaticCache, TagInvalidation};
use crate::calculator::CalculatedPermissions;
use crate::error::DomainResult;
use crate::model::{Account, AccountId, GroupId, GroupRole, OverrideTable};

/// A value loaded at most once per request, even under concurrent callers.
///
/// The first caller runs the loader while holding the slot; later callers
/// block until it finishes and then share the result. A failed load leaves
/// the slot empty so the next caller retries.
#[derive(Debug)]
pub(crate) struct SingleflightSlot<T> {
    value: Mutex<Option<T>>,
}

impl<T> Default for SingleflightSlot<T> {
    fn default() -> Self {
        Self {
            value: Mutex::new(None),
        }
    }
}

impl<T: Clone> SingleflightSlot<T> {
    pub(crate) fn get_or_try_init<E>(
        &self,
        init: impl FnOnce() -> Result<T, E>,
    ) -> Result<T, E> {
        let mut guard = self.value.lock();
        if let Some(value) = guard.as_ref() {
            return Ok(value.clone());
        }
        let value = init()?;
        *guard = Some(value.clone());
        Ok(value)
    }

    pub(crate) fn is_loaded(&self) -> bool {
        self.value.lock().is_some()
    }
}

pub(crate) type OverrideSlot = Arc<SingleflightSlot<Option<OverrideTable>>>;
pub(crate) type AllOverridesSlot = Arc<SingleflightSlot<Arc<BTreeMap<GroupId, OverrideTable>>>>;

/// Per-request caches.
#[derive(Debug, Default)]
pub struct RequestCache {
    permissions: StaticCache<Arc<CalculatedPermissions>>,
    overrides: DashMap<GroupId, OverrideSlot>,
    all_overrides: Mutex<AllOverridesSlot>,
    /// Keyed by resolved `user.roles` context and group type.
    outsider_roles: DashMap<(String, String), Arc<Vec<GroupRole>>>,
    /// Keyed by account id, resolved `user.roles` context and operation.
    grants: DashMap<(AccountId, String, String), Arc<GrantMap>>,
}

impl RequestCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Static tier of the calculation chain.
    pub fn permissions(&self) -> &StaticCache<Arc<CalculatedPermissions>> {
        &self.permissions
    }

    pub(crate) fn override_slot(&self, group_id: GroupId) -> OverrideSlot {
        self.overrides.entry(group_id).or_default().clone()
    }

    pub(crate) fn all_overrides_slot(&self) -> AllOverridesSlot {
        self.all_overrides.lock().clone()
    }

    /// Whether the override of `group_id` was already loaded in this request.
    pub fn has_loaded_override(&self, group_id: GroupId) -> bool {
        self.overrides
            .get(&group_id)
            .is_some_and(|slot| slot.is_loaded())
    }

    /// Outsider roles depend on the global roles only, never on the id.
    fn outsider_roles_key(account: &Account, group_type: &str) -> (String, String) {
        (
            CacheContext::UserRoles.resolve(account),
            group_type.to_string(),
        )
    }

    pub(crate) fn outsider_roles(
        &self,
        account: &Account,
        group_type: &str,
    ) -> Option<Arc<Vec<GroupRole>>> {
        self.outsider_roles
            .get(&Self::outsider_roles_key(account, group_type))
            .map(|roles| Arc::clone(&roles))
    }

    pub(crate) fn remember_outsider_roles(
        &self,
        account: &Account,
        group_type: &str,
        roles: Arc<Vec<GroupRole>>,
    ) {
        self.outsider_roles
            .insert(Self::outsider_roles_key(account, group_type), roles);
    }

    fn grants_key(account: &Account, operation: &str) -> (AccountId, String, String) {
        (
            account.id,
            CacheContext::UserRoles.resolve(account),
            operation.to_string(),
        )
    }

    pub(crate) fn grants(&self, account: &Account, operation: &str) -> Option<Arc<GrantMap>> {
        self.grants
            .get(&Self::grants_key(account, operation))
            .map(|grants| Arc::clone(&grants))
    }

    pub(crate) fn remember_grants(&self, account: &Account, operation: &str, grants: Arc<GrantMap>) {
        self.grants
            .insert(Self::grants_key(account, operation), grants);
    }
}

impl TagInvalidation for RequestCache {
    fn invalidate_tags(&self, invalidated: &[String]) -> DomainResult<()> {
        self.permissions.invalidate_tags(invalidated)?;
        self.overrides.retain(|group_id, _| {
            !invalidated.contains(&tags::group(*group_id))
                && !invalidated.contains(&tags::permission_override(*group_id))
        });
        *self.all_overrides.lock() = AllOverridesSlot::default();
        self.outsider_roles.clear();
        self.grants.clear();
        Ok(())
    }
}

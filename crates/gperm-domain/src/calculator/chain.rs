//! Ordered calculator chain with two-tier caching.

use std::sync::Arc;

use tracing::{debug, instrument, trace};

use crate::cache::{tags, CacheBackend, CacheContext, CacheId};
use crate::error::DomainResult;
use crate::model::Account;
use crate::request::RequestCache;

use super::{Audience, CalculatedPermissions, PermissionCalculator, RefinableCalculatedPermissions};

/// Persistent tier type for calculated permissions.
pub type PermissionCache = dyn CacheBackend<Arc<CalculatedPermissions>>;

const MEMBER_CONTEXTS: &[CacheContext] = &[CacheContext::User];
const OUTSIDER_CONTEXTS: &[CacheContext] = &[CacheContext::UserRoles];

/// Runs every registered calculator and caches the merged result.
///
/// Lookup goes static tier (the request's [`RequestCache`]), then persistent
/// tier, then a full calculation. Authoritative calculators always run after
/// the additive ones, whatever order they were added in.
pub struct ChainCalculator {
    calculators: Vec<Arc<dyn PermissionCalculator>>,
    persistent: Arc<PermissionCache>,
}

impl std::fmt::Debug for ChainCalculator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.calculators.iter().map(|c| c.name()).collect();
        f.debug_struct("ChainCalculator")
            .field("calculators", &names)
            .finish_non_exhaustive()
    }
}

impl ChainCalculator {
    pub fn new(persistent: Arc<PermissionCache>) -> Self {
        Self {
            calculators: Vec::new(),
            persistent,
        }
    }

    pub fn add_calculator(&mut self, calculator: Arc<dyn PermissionCalculator>) {
        self.calculators.push(calculator);
        // Stable: keeps registration order within each group.
        self.calculators.sort_by_key(|c| c.is_authoritative());
    }

    pub fn with_calculator(mut self, calculator: Arc<dyn PermissionCalculator>) -> Self {
        self.add_calculator(calculator);
        self
    }

    pub fn calculators(&self) -> impl Iterator<Item = &Arc<dyn PermissionCalculator>> {
        self.calculators.iter()
    }

    pub fn calculate_member_permissions(
        &self,
        account: &Account,
        request: &RequestCache,
    ) -> DomainResult<Arc<CalculatedPermissions>> {
        self.calculate_cached(Audience::Member(account), request)
    }

    pub fn calculate_anonymous_permissions(
        &self,
        request: &RequestCache,
    ) -> DomainResult<Arc<CalculatedPermissions>> {
        self.calculate_cached(Audience::Anonymous, request)
    }

    pub fn calculate_outsider_permissions(
        &self,
        account: &Account,
        request: &RequestCache,
    ) -> DomainResult<Arc<CalculatedPermissions>> {
        self.calculate_cached(Audience::Outsider(account), request)
    }

    /// Cache id and storage-only contexts for `audience`.
    ///
    /// Derived from the target account directly; no ambient subject is
    /// consulted.
    fn cache_id(audience: Audience<'_>) -> (CacheId, &'static [CacheContext]) {
        match audience {
            Audience::Anonymous => (CacheId::from_keys(&["anonymous"]), &[]),
            Audience::Outsider(account) => (
                CacheId::for_account(&["outsider"], OUTSIDER_CONTEXTS, account),
                OUTSIDER_CONTEXTS,
            ),
            Audience::Member(account) => {
                let keys = ["member".to_string(), account.id.to_string()];
                (
                    CacheId::for_account(&keys, MEMBER_CONTEXTS, account),
                    MEMBER_CONTEXTS,
                )
            }
        }
    }

    #[instrument(skip_all, fields(audience = %audience))]
    fn calculate_cached(
        &self,
        audience: Audience<'_>,
        request: &RequestCache,
    ) -> DomainResult<Arc<CalculatedPermissions>> {
        let (id, persistent_contexts) = Self::cache_id(audience);

        if let Some(hit) = request.permissions().get(&id)? {
            trace!(cache_id = %id, "static cache hit");
            metrics::counter!("gperm_permission_cache_hits_total", "tier" => "static").increment(1);
            return Ok(hit);
        }

        if let Some(hit) = self.persistent.get(&id)? {
            trace!(cache_id = %id, "persistent cache hit");
            metrics::counter!("gperm_permission_cache_hits_total", "tier" => "persistent")
                .increment(1);
            request.permissions().set(id, Arc::clone(&hit), hit.metadata())?;
            return Ok(hit);
        }

        metrics::counter!("gperm_permission_cache_misses_total").increment(1);
        metrics::counter!("gperm_calculations_total", "audience" => audience.scope().as_str())
            .increment(1);

        let mut accumulated = RefinableCalculatedPermissions::new();
        for calculator in &self.calculators {
            let partial = calculator.calculate(audience, request)?;
            accumulated.merge(partial, calculator.is_authoritative());
        }
        accumulated.add_cache_tags([tags::PERMISSIONS]);
        let result = Arc::new(accumulated.freeze());
        debug!(cache_id = %id, items = result.len(), "calculated permissions");

        // Storage contexts vary the key only; the result keeps its own metadata.
        let mut storage_metadata = result.metadata().clone();
        storage_metadata.add_contexts(persistent_contexts.iter().map(|c| c.as_str()));
        self.persistent
            .set(id.clone(), Arc::clone(&result), &storage_metadata)?;
        request
            .permissions()
            .set(id, Arc::clone(&result), &storage_metadata)?;

        Ok(result)
    }
}

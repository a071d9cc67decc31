//! Cache backend contracts shared by the static and persistent tiers.

use std::sync::Arc;

use super::metadata::{CacheId, CacheableMetadata};
use crate::error::DomainResult;

/// A cached value together with the metadata it was stored with.
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    pub value: V,
    /// Result metadata plus any storage-only contexts.
    pub metadata: CacheableMetadata,
}

/// Tag-based invalidation, independent of the cached value type.
pub trait TagInvalidation: Send + Sync {
    /// Drops every entry carrying at least one of `tags`.
    fn invalidate_tags(&self, tags: &[String]) -> DomainResult<()>;
}

/// A keyed cache tier.
pub trait CacheBackend<V>: TagInvalidation {
    fn get(&self, id: &CacheId) -> DomainResult<Option<V>>;

    /// Stores `value` under `id`. `metadata` decides which tags invalidate it.
    fn set(&self, id: CacheId, value: V, metadata: &CacheableMetadata) -> DomainResult<()>;
}

/// Fans a tag invalidation out to every registered tier.
#[derive(Default, Clone)]
pub struct CacheTagsInvalidator {
    backends: Vec<Arc<dyn TagInvalidation>>,
}

impl std::fmt::Debug for CacheTagsInvalidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheTagsInvalidator")
            .field("backends", &self.backends.len())
            .finish()
    }
}

impl CacheTagsInvalidator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, backend: Arc<dyn TagInvalidation>) {
        self.backends.push(backend);
    }

    pub fn with_backend(mut self, backend: Arc<dyn TagInvalidation>) -> Self {
        self.register(backend);
        self
    }
}

impl TagInvalidation for CacheTagsInvalidator {
    fn invalidate_tags(&self, tags: &[String]) -> DomainResult<()> {
        if tags.is_empty() {
            return Ok(());
        }
        metrics::counter!("gperm_cache_invalidations_total").increment(1);
        tracing::debug!(?tags, backends = self.backends.len(), "invalidating cache tags");
        for backend in &self.backends {
            backend.invalidate_tags(tags)?;
        }
        Ok(())
    }
}

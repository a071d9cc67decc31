//! Two-tier caching with tag-based invalidation.
//!
//! - [`StaticCache`]: plain in-process map owned by one request.
//! - [`TaggedCache`]: persistent tier shared across requests, backed by Moka
//!   with TTL and capacity bounds plus a secondary tag index.
//!
//! Both tiers implement [`CacheBackend`]. Writers never enumerate keys: they
//! invalidate by tag through [`CacheTagsInvalidator`], so an override edit
//! drops every derived entry that referenced it, whichever account's key
//! variant stored it.
//!
//! The cache is an optimization only. Every miss falls back to a full
//! recomputation.

mod backend;
mod metadata;
mod persistent;
mod static_cache;

use std::time::Duration;

pub use backend::{CacheBackend, CacheEntry, CacheTagsInvalidator, TagInvalidation};
pub use metadata::{tags, CacheContext, CacheId, CacheableDependency, CacheableMetadata};
pub use persistent::TaggedCache;
pub use static_cache::StaticCache;

/// Configuration for the persistent cache tier.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Whether the persistent tier stores anything.
    pub enabled: bool,
    /// Maximum number of entries.
    pub max_capacity: u64,
    /// Upper bound on entry lifetime; tag invalidation normally comes first.
    pub default_ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_capacity: 100_000,
            default_ttl: Duration::from_secs(3600),
        }
    }
}

impl CacheConfig {
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn with_max_capacity(mut self, max_capacity: u64) -> Self {
        self.max_capacity = max_capacity;
        self
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }
}

/// Registers cache metric descriptions.
///
/// Call once during startup. Optional, but gives the exporter help texts.
pub fn register_cache_metrics() {
    metrics::describe_counter!(
        "gperm_permission_cache_hits_total",
        "Calculated permission cache hits, labelled by tier"
    );
    metrics::describe_counter!(
        "gperm_permission_cache_misses_total",
        "Calculated permission cache misses (full recalculation)"
    );
    metrics::describe_counter!(
        "gperm_override_cache_hits_total",
        "Override table lookups served from the persistent cache"
    );
    metrics::describe_counter!(
        "gperm_override_cache_misses_total",
        "Override table lookups that reached storage"
    );
    metrics::describe_counter!(
        "gperm_calculations_total",
        "Permission calculations run, labelled by audience"
    );
    metrics::describe_counter!(
        "gperm_cache_invalidations_total",
        "Tag invalidation requests"
    );
}

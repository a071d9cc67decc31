//! Persistent, tag-invalidated cache tier.
//!
//! Shared across requests. Values live in a Moka cache with TTL and capacity
//! bounds; a secondary `tag -> ids` index makes invalidation O(K) in the
//! number of entries carrying the tag instead of a scan over all entries.
//!
//! The index only holds ids that are still cached: evictions and
//! replacements are unindexed by a Moka eviction listener, tag invalidations
//! inline.

use std::collections::HashSet;
use std::sync::Arc;

use dashmap::DashMap;
use moka::notification::RemovalCause;
use moka::sync::Cache;

use super::backend::{CacheBackend, CacheEntry, TagInvalidation};
use super::metadata::{CacheId, CacheableMetadata};
use super::CacheConfig;
use crate::error::DomainResult;

/// Tag-invalidated key/value cache shared across requests.
pub struct TaggedCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    /// Label used in metrics and logs.
    name: &'static str,
    cache: Cache<CacheId, CacheEntry<V>>,
    config: CacheConfig,
    /// Secondary index: tag -> ids stored with that tag.
    by_tag: Arc<TagIndex>,
}

type TagIndex = DashMap<String, HashSet<CacheId>>;

/// Removes `id` from each of `tags`, dropping tags left without ids.
fn unindex<'t>(index: &TagIndex, id: &CacheId, tags: impl IntoIterator<Item = &'t String>) {
    for tag in tags {
        index.remove_if_mut(tag, |_, ids| {
            ids.remove(id);
            ids.is_empty()
        });
    }
}

impl<V> std::fmt::Debug for TaggedCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaggedCache")
            .field("name", &self.name)
            .field("config", &self.config)
            .field("entry_count", &self.cache.entry_count())
            .field("tag_index_size", &self.by_tag.len())
            .finish()
    }
}

impl<V> TaggedCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    pub fn new(name: &'static str, config: CacheConfig) -> Self {
        let by_tag: Arc<TagIndex> = Arc::new(DashMap::new());
        let index = Arc::clone(&by_tag);
        let cache = Cache::builder()
            .max_capacity(config.max_capacity)
            .time_to_live(config.default_ttl)
            .eviction_listener(move |id: Arc<CacheId>, entry: CacheEntry<V>, cause| {
                // Explicit removals are unindexed by `invalidate_tags`.
                if cause != RemovalCause::Explicit {
                    unindex(&index, &id, entry.metadata.tags());
                }
            })
            .build();

        Self {
            name,
            cache,
            config,
            by_tag,
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    /// Returns the stored entry including its storage metadata.
    pub fn get_entry(&self, id: &CacheId) -> Option<CacheEntry<V>> {
        if !self.config.enabled {
            return None;
        }
        self.cache.get(id)
    }

    /// Approximate number of entries.
    pub fn entry_count(&self) -> u64 {
        self.cache.entry_count()
    }

    /// Number of tags with at least one indexed id.
    pub fn tag_index_size(&self) -> usize {
        self.by_tag.len()
    }

    /// Runs pending maintenance tasks (evictions).
    pub fn run_pending_tasks(&self) {
        self.cache.run_pending_tasks();
    }

    pub fn invalidate_all(&self) {
        self.cache.invalidate_all();
        self.by_tag.clear();
    }
}

impl<V> TagInvalidation for TaggedCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    fn invalidate_tags(&self, tags: &[String]) -> DomainResult<()> {
        for tag in tags {
            // Atomic remove so a concurrent set cannot slip ids in between
            // reading and clearing the index entry.
            if let Some((_, ids)) = self.by_tag.remove(tag) {
                tracing::debug!(cache = self.name, %tag, entries = ids.len(), "tag invalidated");
                for id in &ids {
                    if let Some(entry) = self.cache.remove(id) {
                        unindex(&self.by_tag, id, entry.metadata.tags());
                    }
                }
            }
        }
        Ok(())
    }
}

impl<V> CacheBackend<V> for TaggedCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    fn get(&self, id: &CacheId) -> DomainResult<Option<V>> {
        Ok(self.get_entry(id).map(|entry| entry.value))
    }

    fn set(&self, id: CacheId, value: V, metadata: &CacheableMetadata) -> DomainResult<()> {
        if !self.config.enabled {
            return Ok(());
        }
        // Insert first: replacing an entry unindexes its old tags through the
        // listener, which must not undo the tags indexed below.
        self.cache.insert(
            id.clone(),
            CacheEntry {
                value,
                metadata: metadata.clone(),
            },
        );
        for tag in metadata.tags() {
            self.by_tag.entry(tag.clone()).or_default().insert(id.clone());
        }
        Ok(())
    }
}

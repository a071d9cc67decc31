//! In-process cache tier scoped to one request.

use dashmap::DashMap;

use super::backend::{CacheBackend, CacheEntry, TagInvalidation};
use super::metadata::{CacheId, CacheableMetadata};
use crate::error::DomainResult;

/// Plain map of cached values; dropped together with its request.
#[derive(Debug)]
pub struct StaticCache<V> {
    entries: DashMap<CacheId, CacheEntry<V>>,
}

impl<V> Default for StaticCache<V> {
    fn default() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }
}

impl<V: Clone> StaticCache<V> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&self) {
        self.entries.clear();
    }
}

impl<V: Clone + Send + Sync> TagInvalidation for StaticCache<V> {
    fn invalidate_tags(&self, tags: &[String]) -> DomainResult<()> {
        self.entries
            .retain(|_, entry| !entry.metadata.matches_any(tags));
        Ok(())
    }
}

impl<V: Clone + Send + Sync> CacheBackend<V> for StaticCache<V> {
    fn get(&self, id: &CacheId) -> DomainResult<Option<V>> {
        Ok(self.entries.get(id).map(|entry| entry.value.clone()))
    }

    fn set(&self, id: CacheId, value: V, metadata: &CacheableMetadata) -> DomainResult<()> {
        self.entries.insert(
            id,
            CacheEntry {
                value,
                metadata: metadata.clone(),
            },
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_cache_invalidates_by_tag() {
        let cache: StaticCache<&'static str> = StaticCache::new();
        let mut tagged = CacheableMetadata::new();
        tagged.add_tags(["group:1"]);
        cache
            .set(CacheId::from_keys(&["a"]), "a", &tagged)
            .unwrap();
        cache
            .set(CacheId::from_keys(&["b"]), "b", &CacheableMetadata::new())
            .unwrap();

        cache.invalidate_tags(&["group:1".to_string()]).unwrap();

        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get(&CacheId::from_keys(&["b"])).unwrap(), Some("b"));
    }
}

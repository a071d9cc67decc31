//! Cached retrieval of per-group override tables.
//!
//! Lookup order: the request's single-flight slot, then the persistent tier
//! (tagged `group:<id>` and `override:<id>`), then override storage.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{debug, trace};

use crate::cache::{tags, CacheBackend, CacheId, CacheableMetadata};
use crate::error::DomainResult;
use crate::model::{GroupId, OverrideTable};
use crate::request::RequestCache;
use crate::resolver::OverrideReader;

/// Persistent tier type for single override tables.
pub type OverrideCache = dyn CacheBackend<Option<OverrideTable>>;
/// Persistent tier type for the full override mapping.
pub type OverrideListCache = dyn CacheBackend<Arc<BTreeMap<GroupId, OverrideTable>>>;

/// Caches and retrieves override tables.
pub struct PermissionOverrideStore {
    reader: Arc<dyn OverrideReader>,
    cache: Arc<OverrideCache>,
    list_cache: Arc<OverrideListCache>,
}

impl std::fmt::Debug for PermissionOverrideStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PermissionOverrideStore").finish_non_exhaustive()
    }
}

impl PermissionOverrideStore {
    pub fn new(
        reader: Arc<dyn OverrideReader>,
        cache: Arc<OverrideCache>,
        list_cache: Arc<OverrideListCache>,
    ) -> Self {
        Self {
            reader,
            cache,
            list_cache,
        }
    }

    /// The override table of `group_id`, or `None` when the group uses defaults.
    pub fn get_override(
        &self,
        group_id: GroupId,
        request: &RequestCache,
    ) -> DomainResult<Option<OverrideTable>> {
        request
            .override_slot(group_id)
            .get_or_try_init(|| self.load_override(group_id))
    }

    /// Every group's override table.
    pub fn get_all(
        &self,
        request: &RequestCache,
    ) -> DomainResult<Arc<BTreeMap<GroupId, OverrideTable>>> {
        request
            .all_overrides_slot()
            .get_or_try_init(|| self.load_all())
    }

    fn load_override(&self, group_id: GroupId) -> DomainResult<Option<OverrideTable>> {
        let id = CacheId::from_keys(&["override".to_string(), group_id.to_string()]);
        if let Some(table) = self.cache.get(&id)? {
            trace!(%group_id, "override cache hit");
            metrics::counter!("gperm_override_cache_hits_total").increment(1);
            return Ok(table);
        }

        metrics::counter!("gperm_override_cache_misses_total").increment(1);
        let table = self
            .reader
            .load_by_group(group_id)?
            .map(|entity| entity.permissions);
        debug!(%group_id, found = table.is_some(), "loaded override from storage");

        let mut metadata = CacheableMetadata::new();
        metadata.add_tags([tags::group(group_id), tags::permission_override(group_id)]);
        self.cache.set(id, table.clone(), &metadata)?;
        Ok(table)
    }

    fn load_all(&self) -> DomainResult<Arc<BTreeMap<GroupId, OverrideTable>>> {
        let id = CacheId::from_keys(&["override", "all"]);
        if let Some(all) = self.list_cache.get(&id)? {
            metrics::counter!("gperm_override_cache_hits_total").increment(1);
            return Ok(all);
        }

        metrics::counter!("gperm_override_cache_misses_total").increment(1);
        let mut metadata = CacheableMetadata::new();
        metadata.add_tags([tags::OVERRIDE_LIST]);
        let mut all = BTreeMap::new();
        for entity in self.reader.load_all()? {
            metadata.add_dependency(&entity);
            metadata.add_tags([tags::group(entity.group_id)]);
            all.insert(entity.group_id, entity.permissions);
        }
        debug!(overrides = all.len(), "loaded all overrides from storage");

        let all = Arc::new(all);
        self.list_cache.set(id, Arc::clone(&all), &metadata)?;
        Ok(all)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{CacheConfig, TagInvalidation, TaggedCache};
    use crate::model::PermissionOverride;
    use crate::resolver::tests::mocks::MockOverrideReader;

    struct Fixture {
        reader: Arc<MockOverrideReader>,
        cache: Arc<TaggedCache<Option<OverrideTable>>>,
        list_cache: Arc<TaggedCache<Arc<BTreeMap<GroupId, OverrideTable>>>>,
        store: PermissionOverrideStore,
    }

    fn fixture() -> Fixture {
        let reader = Arc::new(MockOverrideReader::new());
        let cache = Arc::new(TaggedCache::new("override", CacheConfig::default()));
        let list_cache = Arc::new(TaggedCache::new("override_list", CacheConfig::default()));
        let store = PermissionOverrideStore::new(
            reader.clone(),
            cache.clone(),
            list_cache.clone(),
        );
        Fixture {
            reader,
            cache,
            list_cache,
            store,
        }
    }

    fn editor_table() -> OverrideTable {
        OverrideTable::new().with_role("club-editor", ["view", "edit"])
    }

    #[test]
    fn test_missing_override_is_absent_not_empty() {
        let f = fixture();

        let table = f.store.get_override(GroupId(1), &RequestCache::new()).unwrap();

        assert_eq!(table, None);
    }

    #[test]
    fn test_override_is_loaded_once_per_request() {
        let f = fixture();
        f.reader
            .insert(PermissionOverride::new(GroupId(1), editor_table()));
        let request = RequestCache::new();

        let first = f.store.get_override(GroupId(1), &request).unwrap();
        let second = f.store.get_override(GroupId(1), &request).unwrap();

        assert_eq!(first, Some(editor_table()));
        assert_eq!(first, second);
        assert_eq!(f.reader.load_calls(), 1);
    }

    #[test]
    fn test_persistent_tier_serves_later_requests() {
        let f = fixture();
        f.reader
            .insert(PermissionOverride::new(GroupId(1), editor_table()));

        f.store.get_override(GroupId(1), &RequestCache::new()).unwrap();
        f.store.get_override(GroupId(1), &RequestCache::new()).unwrap();

        assert_eq!(f.reader.load_calls(), 1);
    }

    #[test]
    fn test_group_tag_invalidation_reloads_from_storage() {
        let f = fixture();
        f.reader
            .insert(PermissionOverride::new(GroupId(1), editor_table()));
        f.store.get_override(GroupId(1), &RequestCache::new()).unwrap();

        f.reader.remove(GroupId(1));
        f.cache.invalidate_tags(&[tags::group(GroupId(1))]).unwrap();
        let table = f.store.get_override(GroupId(1), &RequestCache::new()).unwrap();

        assert_eq!(table, None);
        assert_eq!(f.reader.load_calls(), 2);
    }

    #[test]
    fn test_absent_result_is_cached_until_override_tag_invalidated() {
        let f = fixture();
        f.store.get_override(GroupId(4), &RequestCache::new()).unwrap();

        f.reader
            .insert(PermissionOverride::new(GroupId(4), editor_table()));
        let stale = f.store.get_override(GroupId(4), &RequestCache::new()).unwrap();
        f.cache
            .invalidate_tags(&[tags::permission_override(GroupId(4))])
            .unwrap();
        let fresh = f.store.get_override(GroupId(4), &RequestCache::new()).unwrap();

        assert_eq!(stale, None);
        assert_eq!(fresh, Some(editor_table()));
    }

    #[test]
    fn test_get_all_maps_group_to_table() {
        let f = fixture();
        f.reader
            .insert(PermissionOverride::new(GroupId(1), editor_table()));
        f.reader
            .insert(PermissionOverride::new(GroupId(2), OverrideTable::new()));

        let all = f.store.get_all(&RequestCache::new()).unwrap();

        assert_eq!(all.len(), 2);
        assert_eq!(all.get(&GroupId(1)), Some(&editor_table()));
        assert_eq!(all.get(&GroupId(2)), Some(&OverrideTable::new()));
    }

    #[test]
    fn test_get_all_invalidated_by_override_list_tag() {
        let f = fixture();
        f.store.get_all(&RequestCache::new()).unwrap();

        f.reader
            .insert(PermissionOverride::new(GroupId(3), editor_table()));
        f.list_cache
            .invalidate_tags(&[tags::OVERRIDE_LIST.to_string()])
            .unwrap();
        let all = f.store.get_all(&RequestCache::new()).unwrap();

        assert!(all.contains_key(&GroupId(3)));
    }
}

//! Reverse index from provided tags to cache keys

use dashmap::DashMap;
use std::collections::{BTreeSet, HashSet};

use storefront_cache_core::{CacheKey, Tag};

/// Tag -> keys index
///
/// Kept in step with each entry's provided tags by the store, always while
/// the entry itself is locked. Lookups may therefore return keys whose
/// entry changed since; callers re-check the match under the entry lock.
#[derive(Debug, Default)]
pub(crate) struct TagIndex {
    by_tag: DashMap<Tag, HashSet<CacheKey>>,
    by_kind: DashMap<String, HashSet<CacheKey>>,
}

impl TagIndex {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Replace the tags recorded for `key`
    pub(crate) fn update(&self, key: &CacheKey, old: &[Tag], new: &[Tag]) {
        self.unregister(key, old);
        self.register(key, new);
    }

    pub(crate) fn register(&self, key: &CacheKey, tags: &[Tag]) {
        for tag in tags {
            self.by_tag
                .entry(tag.clone())
                .or_insert_with(HashSet::new)
                .insert(key.clone());
            self.by_kind
                .entry(tag.kind().to_string())
                .or_insert_with(HashSet::new)
                .insert(key.clone());
        }
    }

    pub(crate) fn unregister(&self, key: &CacheKey, tags: &[Tag]) {
        for tag in tags {
            self.by_tag.remove_if_mut(tag, |_, keys| {
                keys.remove(key);
                keys.is_empty()
            });
        }
        let kinds: HashSet<&str> = tags.iter().map(Tag::kind).collect();
        for kind in kinds {
            self.by_kind.remove_if_mut(kind, |_, keys| {
                keys.remove(key);
                keys.is_empty()
            });
        }
    }

    /// Keys whose provided tags match any of `invalidated`
    ///
    /// Sorted so invalidation visits entries in a stable order.
    pub(crate) fn matching(&self, invalidated: &[Tag]) -> BTreeSet<CacheKey> {
        let mut keys = BTreeSet::new();
        for tag in invalidated {
            match tag {
                Tag::Type(_) => {
                    if let Some(hit) = self.by_kind.get(tag.kind()) {
                        keys.extend(hit.iter().cloned());
                    }
                }
                Tag::Id { .. } => {
                    if let Some(hit) = self.by_tag.get(tag) {
                        keys.extend(hit.iter().cloned());
                    }
                }
            }
        }
        keys
    }

    #[cfg(test)]
    pub(crate) fn tag_count(&self) -> usize {
        self.by_tag.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(endpoint: &str, id: u64) -> CacheKey {
        CacheKey::new(endpoint, &id).unwrap()
    }

    #[test]
    fn test_instance_and_list_lookup() {
        let index = TagIndex::new();
        let list = key("getAllBrands", 0);
        let one = key("getBrand", 3);
        index.register(&list, &[Tag::id("Brand", 3), Tag::list("Brand")]);
        index.register(&one, &[Tag::id("Brand", 3)]);

        let hit = index.matching(&[Tag::id("Brand", 3)]);
        assert_eq!(hit.len(), 2);

        let hit = index.matching(&[Tag::list("Brand")]);
        assert_eq!(hit.into_iter().collect::<Vec<_>>(), vec![list]);
    }

    #[test]
    fn test_type_tag_hits_whole_kind() {
        let index = TagIndex::new();
        index.register(&key("getBrand", 1), &[Tag::id("Brand", 1)]);
        index.register(&key("getBrand", 2), &[Tag::id("Brand", 2)]);
        index.register(&key("getColor", 1), &[Tag::id("Color", 1)]);

        assert_eq!(index.matching(&[Tag::ty("Brand")]).len(), 2);
        assert_eq!(index.matching(&[Tag::ty("Size")]).len(), 0);
    }

    #[test]
    fn test_update_drops_old_tags() {
        let index = TagIndex::new();
        let k = key("getBrand", 1);
        index.register(&k, &[Tag::id("Brand", 1), Tag::list("Brand")]);
        index.update(&k, &[Tag::id("Brand", 1), Tag::list("Brand")], &[Tag::id("Brand", 1)]);

        assert!(index.matching(&[Tag::list("Brand")]).is_empty());
        assert_eq!(index.tag_count(), 1);

        index.unregister(&k, &[Tag::id("Brand", 1)]);
        assert_eq!(index.tag_count(), 0);
        assert!(index.matching(&[Tag::ty("Brand")]).is_empty());
    }
}

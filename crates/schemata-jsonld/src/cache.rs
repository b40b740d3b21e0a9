//! Rendered document cache.
//!
//! Entries are keyed by record, revision, language and depth, so an edit to
//! the root record misses naturally. Each entry also remembers the revision
//! of every record embedded in it; [`DocumentCache::get_fresh`] re-checks
//! those and drops the entry when one has changed.
//! [`DocumentCache::invalidate_record`] drops entries eagerly, and any
//! mapping change clears the whole cache.

use crate::document::StructuredDocument;
use schemata_core::{Record, RecordId, Result};
use schemata_mapping::{MappingEvent, MappingSubscriber};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

/// Cache key of a rendered document.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CacheKey {
    /// Root record.
    pub record: RecordId,
    /// Root record revision.
    pub revision: u64,
    /// Root record language.
    pub language: String,
    /// Embedding depth the document was built with.
    pub max_depth: usize,
}

impl CacheKey {
    /// Key of a record rendered at a depth.
    pub fn for_record(record: &Record, max_depth: usize) -> Self {
        Self {
            record: record.id.clone(),
            revision: record.revision,
            language: record.language.clone(),
            max_depth,
        }
    }
}

#[derive(Clone, Debug)]
struct CacheEntry {
    json: Arc<str>,
    dependencies: BTreeMap<RecordId, Option<u64>>,
}

/// Cache counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    /// Entries held.
    pub entries: usize,
    /// Lookups answered from the cache.
    pub hits: u64,
    /// Lookups that missed.
    pub misses: u64,
}

/// Thread-safe cache of rendered JSON-LD.
#[derive(Debug, Default)]
pub struct DocumentCache {
    entries: RwLock<HashMap<CacheKey, CacheEntry>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl DocumentCache {
    /// Capability key the cache is registered under.
    pub const KEY: &'static str = "document_cache";

    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a rendered document by key alone, without checking the
    /// records embedded in it.
    pub fn get(&self, key: &CacheKey) -> Option<Arc<str>> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        match entries.get(key) {
            Some(entry) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(Arc::clone(&entry.json))
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Look up a rendered document whose embedded records are unchanged.
    ///
    /// `revision_of` reports the current revision of a record (`None` when
    /// it does not exist). An entry whose recorded revisions no longer match
    /// is dropped and counted as a miss.
    pub fn get_fresh<F>(&self, key: &CacheKey, mut revision_of: F) -> Result<Option<Arc<str>>>
    where
        F: FnMut(&RecordId) -> Result<Option<u64>>,
    {
        let entry = self
            .entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned();
        let Some(entry) = entry else {
            self.misses.fetch_add(1, Ordering::Relaxed);
            return Ok(None);
        };

        for (id, revision) in &entry.dependencies {
            if id == &key.record {
                continue;
            }
            if revision_of(id)? != *revision {
                log::debug!("cached document for {} is stale: {id} changed", key.record);
                self.entries
                    .write()
                    .unwrap_or_else(PoisonError::into_inner)
                    .remove(key);
                self.misses.fetch_add(1, Ordering::Relaxed);
                return Ok(None);
            }
        }

        self.hits.fetch_add(1, Ordering::Relaxed);
        Ok(Some(entry.json))
    }

    /// Store a rendered document.
    pub fn insert(&self, key: CacheKey, document: &StructuredDocument, json: Arc<str>) {
        let entry = CacheEntry {
            json,
            dependencies: document.dependencies.clone(),
        };
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, entry);
    }

    /// Drop every entry rooted at or embedding a record.
    ///
    /// Returns the number of entries dropped.
    pub fn invalidate_record(&self, record: &RecordId) -> usize {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let before = entries.len();
        entries.retain(|key, entry| {
            &key.record != record && !entry.dependencies.contains_key(record)
        });
        let dropped = before - entries.len();
        if dropped > 0 {
            log::debug!("invalidated {dropped} cached documents for {record}");
        }
        dropped
    }

    /// Drop everything.
    pub fn clear(&self) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Current counters.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.len(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}

impl MappingSubscriber for DocumentCache {
    fn on_mapping_changed(&self, event: &MappingEvent) -> Result<()> {
        log::debug!("mapping of {} changed, clearing document cache", event.bundle());
        self.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Node;
    use schemata_core::BundleKey;
    use schemata_mapping::Mapping;

    fn document(deps: &[RecordId]) -> StructuredDocument {
        StructuredDocument {
            context: "https://schema.org".to_string(),
            root: Node::new("Event", "https://example.com/node/1"),
            dependencies: deps.iter().map(|id| (id.clone(), Some(1))).collect(),
        }
    }

    fn key(id: &str, revision: u64) -> CacheKey {
        CacheKey {
            record: RecordId::new("node", id),
            revision,
            language: "en".to_string(),
            max_depth: 1,
        }
    }

    #[test]
    fn test_get_and_stats() {
        let cache = DocumentCache::new();
        assert!(cache.get(&key("1", 1)).is_none());
        cache.insert(key("1", 1), &document(&[]), Arc::from("{}"));
        assert_eq!(cache.get(&key("1", 1)).as_deref(), Some("{}"));
        assert!(cache.get(&key("1", 2)).is_none());
        assert_eq!(
            cache.stats(),
            CacheStats {
                entries: 1,
                hits: 1,
                misses: 2
            }
        );
    }

    #[test]
    fn test_invalidate_dependents() {
        let cache = DocumentCache::new();
        let place = RecordId::new("node", "2");
        cache.insert(
            key("1", 1),
            &document(&[RecordId::new("node", "1"), place.clone()]),
            Arc::from("a"),
        );
        cache.insert(key("3", 1), &document(&[RecordId::new("node", "3")]), Arc::from("b"));
        cache.insert(key("2", 1), &document(&[place.clone()]), Arc::from("c"));

        assert_eq!(cache.invalidate_record(&place), 2);
        assert_eq!(cache.len(), 1);
        assert!(cache.get(&key("3", 1)).is_some());
    }

    #[test]
    fn test_get_fresh_checks_embedded_revisions() {
        let cache = DocumentCache::new();
        let root = RecordId::new("node", "1");
        let place = RecordId::new("node", "2");
        cache.insert(
            key("1", 1),
            &document(&[root.clone(), place.clone()]),
            Arc::from("a"),
        );

        // root revision is part of the key and not re-checked
        let hit = cache
            .get_fresh(&key("1", 1), |id| Ok((id == &place).then_some(1)))
            .unwrap();
        assert_eq!(hit.as_deref(), Some("a"));

        let stale = cache
            .get_fresh(&key("1", 1), |id| Ok(Some(if id == &place { 2 } else { 1 })))
            .unwrap();
        assert!(stale.is_none());
        assert!(cache.is_empty());
        assert_eq!(cache.stats().hits, 1);
        assert_eq!(cache.stats().misses, 1);
    }

    #[test]
    fn test_get_fresh_sees_created_reference_target() {
        let cache = DocumentCache::new();
        let mut doc = document(&[RecordId::new("node", "1")]);
        doc.dependencies.insert(RecordId::new("node", "7"), None);
        cache.insert(key("1", 1), &doc, Arc::from("a"));

        assert!(cache.get_fresh(&key("1", 1), |_| Ok(None)).unwrap().is_some());
        assert!(cache.get_fresh(&key("1", 1), |_| Ok(Some(1))).unwrap().is_none());
    }

    #[test]
    fn test_get_fresh_propagates_lookup_errors() {
        let cache = DocumentCache::new();
        cache.insert(
            key("1", 1),
            &document(&[RecordId::new("node", "2")]),
            Arc::from("a"),
        );
        let result =
            cache.get_fresh(&key("1", 1), |_| Err(schemata_core::Error::operation("down")));
        assert!(result.is_err());
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_mapping_change_clears() {
        let cache = DocumentCache::new();
        cache.insert(key("1", 1), &document(&[]), Arc::from("a"));
        let mapping = Mapping::new(&BundleKey::new("node", "event"), "Event");
        cache
            .on_mapping_changed(&MappingEvent::Removed(mapping))
            .unwrap();
        assert!(cache.is_empty());
    }
}

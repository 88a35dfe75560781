use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use super::loader::load;
use super::model::Table;
use super::schema::SchemaMapping;
use super::source::DataSource;
use crate::error::LoadError;

type CacheKey = (String, SchemaMapping);

// ---------------------------------------------------------------------------
// TableCache – memoized loads keyed by (locator, mapping)
// ---------------------------------------------------------------------------

/// Write-once memo of normalized tables.
///
/// The lock is only held for lookups and inserts, never during a load, so two
/// callers racing on the same key both load and the first insert is kept.
/// Failures are not cached.
#[derive(Debug, Default)]
pub struct TableCache {
    entries: RwLock<HashMap<CacheKey, Arc<Table>>>,
}

impl TableCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, locator: &str, mapping: &SchemaMapping) -> Option<Arc<Table>> {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        entries
            .get(&(locator.to_string(), mapping.clone()))
            .cloned()
    }

    pub fn load(
        &self,
        source: &dyn DataSource,
        locator: &str,
        mapping: &SchemaMapping,
    ) -> Result<Arc<Table>, LoadError> {
        if let Some(hit) = self.get(locator, mapping) {
            log::debug!("cache hit for {locator}");
            return Ok(hit);
        }
        log::debug!("cache miss for {locator}");
        let table = Arc::new(load(source, locator, mapping)?);

        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        let kept = entries
            .entry((locator.to_string(), mapping.clone()))
            .or_insert(table);
        Ok(Arc::clone(kept))
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;
    use crate::data::source::MemorySource;

    struct Counting {
        inner: MemorySource,
        calls: Cell<usize>,
    }

    impl DataSource for Counting {
        fn fetch(&self, locator: &str) -> Result<Vec<u8>, LoadError> {
            self.calls.set(self.calls.get() + 1);
            self.inner.fetch(locator)
        }
    }

    #[test]
    fn second_load_is_served_from_cache() {
        let source = Counting {
            inner: MemorySource::new().with("t.csv", "a\n1\n"),
            calls: Cell::new(0),
        };
        let cache = TableCache::new();
        let mapping = SchemaMapping::default();
        let first = cache.load(&source, "t.csv", &mapping).unwrap();
        let second = cache.load(&source, "t.csv", &mapping).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(source.calls.get(), 1);
    }

    #[test]
    fn mapping_is_part_of_the_key() {
        let source = MemorySource::new().with("t.csv", "a\n1\n");
        let cache = TableCache::new();
        cache.load(&source, "t.csv", &SchemaMapping::default()).unwrap();
        let renamed = SchemaMapping::default().rename("a", "b");
        let table = cache.load(&source, "t.csv", &renamed).unwrap();
        assert_eq!(table.columns, vec!["b"]);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn failures_are_not_cached() {
        let cache = TableCache::new();
        let mapping = SchemaMapping::default();
        assert!(cache.load(&MemorySource::new(), "t.csv", &mapping).is_err());
        assert!(cache.is_empty());
        let source = MemorySource::new().with("t.csv", "a\n1\n");
        assert!(cache.load(&source, "t.csv", &mapping).is_ok());
    }

    #[test]
    fn concurrent_readers_share_one_entry() {
        let source = MemorySource::new().with("t.csv", "a\n1\n2\n");
        let cache = Arc::new(TableCache::new());
        let mapping = SchemaMapping::default();
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let cache = Arc::clone(&cache);
                let source = source.clone();
                let mapping = mapping.clone();
                std::thread::spawn(move || cache.load(&source, "t.csv", &mapping).map(|t| t.len()))
            })
            .collect();
        for h in handles {
            assert_eq!(h.join().unwrap().unwrap(), 2);
        }
        assert_eq!(cache.len(), 1);
    }
}

// src/cache.rs

use std::sync::{Arc, RwLock};
use tracing::debug;

use crate::table::SheetTable;

/// Single slot holding the last full table. Once stored it stays valid
/// until `invalidate` is called or the cache is dropped.
#[derive(Debug, Default)]
pub struct TableCache {
    slot: RwLock<Option<Arc<SheetTable>>>,
}

impl TableCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> Option<Arc<SheetTable>> {
        self.slot.read().ok().and_then(|slot| slot.clone())
    }

    pub fn store(&self, table: SheetTable) -> Arc<SheetTable> {
        let table = Arc::new(table);
        if let Ok(mut slot) = self.slot.write() {
            debug!(rows = table.rows.len(), "caching full table");
            *slot = Some(Arc::clone(&table));
        }
        table
    }

    pub fn invalidate(&self) {
        if let Ok(mut slot) = self.slot.write() {
            *slot = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_get_invalidate() {
        let cache = TableCache::new();
        assert!(cache.get().is_none());

        let stored = cache.store(SheetTable::new(vec!["Cliente".into()], vec![]));
        let got = cache.get().unwrap();
        assert!(Arc::ptr_eq(&stored, &got));

        cache.invalidate();
        assert!(cache.get().is_none());
    }

    #[test]
    fn test_fresh_instances_are_independent() {
        let a = TableCache::new();
        let b = TableCache::new();
        a.store(SheetTable::default());
        assert!(a.get().is_some());
        assert!(b.get().is_none());
    }
}

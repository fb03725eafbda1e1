#![allow(dead_code)]
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use geoproxy_cache::{CacheConfig, DocumentTable, ManualClock, StoreSelection, TableRow, TieredCache};
use geoproxy_core::BackendError;

/// Helper to create an in-process cache on a manual clock.
pub fn local_cache(namespace: &str) -> (TieredCache, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new());
    let cache = TieredCache::new(
        namespace,
        StoreSelection::local("test"),
        CacheConfig::default(),
        clock.clone(),
    );
    (cache, clock)
}

/// A document table whose every call fails, counting the attempts.
#[derive(Debug, Default)]
pub struct BrokenTable {
    pub calls: AtomicUsize,
}

impl BrokenTable {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DocumentTable for BrokenTable {
    async fn get_item(&self, _table: &str, _key: &str) -> Result<Option<TableRow>, BackendError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(BackendError::io("connection reset by peer"))
    }

    async fn put_item(&self, _table: &str, _row: TableRow) -> Result<(), BackendError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(BackendError::io("connection reset by peer"))
    }
}

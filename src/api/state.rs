use std::sync::Arc;

use crate::config::Config;
use crate::core::performance::{PerformanceSource, RecordStore};
use crate::core::sync::SyncService;

/// Shared handler state. Generic over the source and store ports so the
/// router can be built against mocks in tests.
pub struct AppState<P: PerformanceSource, R: RecordStore> {
    pub sync: Arc<SyncService<P, R>>,
    pub source: Arc<P>,
    pub store: Arc<R>,
    pub config: Arc<Config>,
}

impl<P: PerformanceSource, R: RecordStore> AppState<P, R> {
    pub fn new(source: Arc<P>, store: Arc<R>, config: Arc<Config>) -> Self {
        Self {
            sync: Arc::new(SyncService::new(source.clone(), store.clone())),
            source,
            store,
            config,
        }
    }
}

// Derived Clone would require P: Clone and R: Clone; only the Arcs clone.
impl<P: PerformanceSource, R: RecordStore> Clone for AppState<P, R> {
    fn clone(&self) -> Self {
        Self {
            sync: self.sync.clone(),
            source: self.source.clone(),
            store: self.store.clone(),
            config: self.config.clone(),
        }
    }
}

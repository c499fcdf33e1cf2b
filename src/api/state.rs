use std::sync::Arc;
use std::time::Duration;

use crate::analytics::AnalyticsEngine;
use crate::config::AnalyticsConfig;
use crate::storage::IncidentStore;

#[derive(Clone)]
pub struct AppState {
    pub engine: AnalyticsEngine,
    pub store: IncidentStore,
    /// Limit on one blocking fetch-and-compute unit.
    pub compute_timeout: Duration,
}

impl AppState {
    pub fn new(engine: AnalyticsEngine, store: IncidentStore) -> Self {
        let compute_timeout = engine.config().compute_timeout();
        Self {
            engine,
            store,
            compute_timeout,
        }
    }

    /// Analytics read from the same store the incident endpoints write to.
    pub fn from_store(store: IncidentStore, analytics: AnalyticsConfig) -> Self {
        let engine = AnalyticsEngine::new(Arc::new(store.clone()), analytics);
        Self::new(engine, store)
    }
}

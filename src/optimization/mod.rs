//! Optimization Layer (C10): a composed façade over LRU/query/model caches,
//! the entity bloom filter, heat tracking, adaptive indexing, the batch
//! writer, and performance/cost telemetry.

pub mod adaptive_index;
pub mod batch_writer;
pub mod bloom;
pub mod cost;
pub mod heat;
pub mod ledger;
pub mod lru;
pub mod model_cache;
pub mod perf_tracker;
pub mod query_cache;

use adaptive_index::AdaptiveIndex;
use bloom::{BloomConfig, EntityFilter};
use cost::CostTracker;
use heat::{HeatConfig, HeatTracker};
use model_cache::ModelCache;
use perf_tracker::{PerfTracker, PerfTrackerConfig};
use query_cache::QueryCache;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::store::QueryResult;

#[derive(Debug, Clone, Copy)]
pub struct OptimizationConfig {
    pub query_cache_capacity: usize,
    pub model_cache_capacity: usize,
    pub bloom: BloomConfig,
    pub heat: HeatConfig,
    pub perf: PerfTrackerConfig,
}

impl Default for OptimizationConfig {
    fn default() -> Self {
        Self {
            query_cache_capacity: 1_000,
            model_cache_capacity: 500,
            bloom: BloomConfig::default(),
            heat: HeatConfig::default(),
            perf: PerfTrackerConfig::default(),
        }
    }
}

/// Single entry point bundling every optimization primitive the indexer and
/// hybrid search pipeline share. Caches are behind a `tokio::sync::Mutex`
/// since `LruCache::get` needs `&mut self`; the tracker/filter types use
/// interior locking of their own.
pub struct Optimizer {
    pub query_cache: Mutex<QueryCache<QueryResult>>,
    pub model_cache: Mutex<ModelCache>,
    pub entity_filter: Mutex<EntityFilter>,
    pub heat: Mutex<HeatTracker>,
    pub adaptive_index: Mutex<AdaptiveIndex>,
    pub perf: PerfTracker,
    pub cost: CostTracker,
}

impl Optimizer {
    pub fn new(config: OptimizationConfig) -> Self {
        Self {
            query_cache: Mutex::new(QueryCache::new(config.query_cache_capacity)),
            model_cache: Mutex::new(ModelCache::new(config.model_cache_capacity)),
            entity_filter: Mutex::new(EntityFilter::new(config.bloom)),
            heat: Mutex::new(HeatTracker::new(config.heat)),
            adaptive_index: Mutex::new(AdaptiveIndex::new()),
            perf: PerfTracker::new(config.perf),
            cost: CostTracker::new(),
        }
    }
}

pub fn create_optimizer() -> Arc<Optimizer> {
    Arc::new(Optimizer::new(OptimizationConfig::default()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn optimizer_bundles_independently_usable_caches() {
        let optimizer = Optimizer::new(OptimizationConfig::default());
        assert_eq!(optimizer.query_cache.lock().await.len(), 0);
        assert_eq!(optimizer.model_cache.lock().await.len(), 0);
    }
}

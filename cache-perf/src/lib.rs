pub mod benchmarks;
pub mod cache;
pub mod client;
pub mod config;
pub mod error;
pub mod logging;

pub use config::*;
pub use error::*;

use std::sync::Arc;

use tracing::info;

use crate::benchmarks::{PerfStats, TestParameters, WorkloadDriver};
use crate::cache::{InMemoryStore, KeyValueStore, StoreCacheAccessor, StoreConfig};

/// Run one benchmark against a fresh in-memory store
pub async fn run_benchmark(config: &AppConfig) -> Result<PerfStats, HarnessError> {
    let store = Arc::new(InMemoryStore::new(StoreConfig::from(&config.store)));
    let accessor = Arc::new(StoreCacheAccessor::new(store.clone()));
    let driver = WorkloadDriver::from_config(&config.benchmark, accessor.clone());

    info!(
        tenants = config.benchmark.tenant_count,
        tokens = config.benchmark.token_count,
        serialization = ?config.benchmark.serialization,
        "Starting token cache benchmark"
    );

    let stats = driver.run(&TestParameters::from(&config.benchmark)).await?;

    let metrics = accessor.metrics();
    let store_stats = store.stats().await;
    info!(
        exports = metrics.exports,
        export_failures = metrics.export_failures,
        replace_hits = metrics.replace_hits,
        replace_misses = metrics.replace_misses,
        conversion_failures = metrics.conversion_failures,
        unmarshal_failures = metrics.unmarshal_failures,
        partitions = store_stats.entries,
        "Accessor activity"
    );

    Ok(stats)
}

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use tracing::{debug, error, warn};

use super::{AccessorError, Expiration, KeyValueStore, Marshaler, StoreValue, Unmarshaler};

/// Lifecycle hooks a token client calls around its own cache mutations
///
/// `replace` runs before the client reads its cache, `export` after it writes.
/// Each call performs one store round trip, so its latency is the latency of
/// the backing store plus (de)serialization.
#[async_trait]
pub trait CacheAccessor: Send + Sync {
    /// Load partition `key` from the store into `cache`
    ///
    /// A missing partition is a cache miss and leaves `cache` untouched.
    async fn replace(&self, cache: &mut dyn Unmarshaler, key: &str) -> Result<(), AccessorError>;

    /// Serialize `cache` and store it under partition `key`
    async fn export(&self, cache: &dyn Marshaler, key: &str) -> Result<(), AccessorError>;
}

/// Point-in-time copy of [`AccessorMetrics`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccessorSnapshot {
    pub exports: u64,
    pub export_failures: u64,
    pub replace_hits: u64,
    pub replace_misses: u64,
    pub conversion_failures: u64,
    pub unmarshal_failures: u64,
}

/// Outcome counters for accessor calls
#[derive(Debug, Default)]
pub struct AccessorMetrics {
    exports: AtomicU64,
    export_failures: AtomicU64,
    replace_hits: AtomicU64,
    replace_misses: AtomicU64,
    conversion_failures: AtomicU64,
    unmarshal_failures: AtomicU64,
}

impl AccessorMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> AccessorSnapshot {
        AccessorSnapshot {
            exports: self.exports.load(Ordering::Relaxed),
            export_failures: self.export_failures.load(Ordering::Relaxed),
            replace_hits: self.replace_hits.load(Ordering::Relaxed),
            replace_misses: self.replace_misses.load(Ordering::Relaxed),
            conversion_failures: self.conversion_failures.load(Ordering::Relaxed),
            unmarshal_failures: self.unmarshal_failures.load(Ordering::Relaxed),
        }
    }

    fn increment(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// Accessor that keeps one serialized partition per key in a [`KeyValueStore`]
///
/// Never caches in-process; the store is the only copy. Partitions are written
/// with [`Expiration::Default`], so the store's retention decides how long they
/// live; a retention shorter than a benchmark run shows up as replace misses.
pub struct StoreCacheAccessor {
    store: Arc<dyn KeyValueStore>,
    metrics: AccessorMetrics,
}

impl StoreCacheAccessor {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            store,
            metrics: AccessorMetrics::new(),
        }
    }

    pub fn store(&self) -> &Arc<dyn KeyValueStore> {
        &self.store
    }

    pub fn metrics(&self) -> AccessorSnapshot {
        self.metrics.snapshot()
    }
}

#[async_trait]
impl CacheAccessor for StoreCacheAccessor {
    async fn replace(&self, cache: &mut dyn Unmarshaler, key: &str) -> Result<(), AccessorError> {
        let Some(value) = self.store.get(key).await else {
            AccessorMetrics::increment(&self.metrics.replace_misses);
            debug!(key = %key, "Partition not in store, keeping current cache");
            return Ok(());
        };

        let data = value.into_bytes().map_err(|other| {
            AccessorMetrics::increment(&self.metrics.conversion_failures);
            error!(
                key = %key,
                found = other.kind(),
                "Stored partition is not a byte blob"
            );
            AccessorError::Conversion {
                key: key.to_string(),
                found: other.kind(),
            }
        })?;

        if let Err(source) = cache.unmarshal(&data) {
            AccessorMetrics::increment(&self.metrics.unmarshal_failures);
            warn!(key = %key, error = %source, "Failed to restore partition");
            return Err(AccessorError::Unmarshal {
                key: key.to_string(),
                source,
            });
        }

        AccessorMetrics::increment(&self.metrics.replace_hits);
        debug!(key = %key, bytes = data.len(), "Partition restored");
        Ok(())
    }

    async fn export(&self, cache: &dyn Marshaler, key: &str) -> Result<(), AccessorError> {
        let data = match cache.marshal() {
            Ok(data) => data,
            Err(source) => {
                AccessorMetrics::increment(&self.metrics.export_failures);
                warn!(key = %key, error = %source, "Failed to marshal partition, not stored");
                return Err(AccessorError::Marshal {
                    key: key.to_string(),
                    source,
                });
            }
        };

        let bytes = data.len();
        if let Err(source) = self
            .store
            .set(key.to_string(), StoreValue::Bytes(data), Expiration::Default)
            .await
        {
            AccessorMetrics::increment(&self.metrics.export_failures);
            error!(key = %key, error = %source, "Store rejected partition");
            return Err(AccessorError::StoreWrite {
                key: key.to_string(),
                source,
            });
        }

        AccessorMetrics::increment(&self.metrics.exports);
        debug!(key = %key, bytes = bytes, "Partition exported");
        Ok(())
    }
}

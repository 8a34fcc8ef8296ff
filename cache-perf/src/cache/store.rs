//! Expiring key-value store used as the accessor's backing collaborator
//!
//! Values live under string keys with a time to live. An expired entry is
//! never returned: `get` treats it as a miss and drops it, and a background
//! janitor purges the rest on a fixed interval.
//!
//! The store is shared between every client in a benchmark run and must be
//! safe for concurrent access even though the driver itself is sequential.

use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::debug;

/// Failures reported by a store backend
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// A value held by the store
///
/// Stores are shared with other consumers, so a partition key can end up
/// holding something other than a serialized cache partition.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreValue {
    Bytes(Vec<u8>),
    Text(String),
    Integer(i64),
}

impl StoreValue {
    /// Name of the variant, for diagnostics
    pub fn kind(&self) -> &'static str {
        match self {
            StoreValue::Bytes(_) => "bytes",
            StoreValue::Text(_) => "text",
            StoreValue::Integer(_) => "integer",
        }
    }

    /// Unwrap the byte payload, handing the value back if it holds anything else
    pub fn into_bytes(self) -> Result<Vec<u8>, StoreValue> {
        match self {
            StoreValue::Bytes(bytes) => Ok(bytes),
            other => Err(other),
        }
    }
}

impl From<Vec<u8>> for StoreValue {
    fn from(bytes: Vec<u8>) -> Self {
        StoreValue::Bytes(bytes)
    }
}

/// Lifetime requested for a stored value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Expiration {
    /// Use the store's configured default retention
    #[default]
    Default,
    /// Keep until overwritten or deleted
    Never,
    /// Expire after the given duration
    After(Duration),
}

/// Store statistics for monitoring and debugging
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StoreStats {
    /// Lookups that returned a live value
    pub hits: u64,
    /// Lookups that found nothing or an expired value
    pub misses: u64,
    /// Current number of stored entries
    pub entries: u64,
    /// Hit rate as percentage (0.0 - 100.0)
    pub hit_rate: f64,
    /// Entries dropped because their TTL elapsed
    pub expired: u64,
}

impl StoreStats {
    /// Calculate hit rate from hits and misses
    pub fn calculate_hit_rate(hits: u64, misses: u64) -> f64 {
        let total = hits + misses;
        if total == 0 {
            0.0
        } else {
            (hits as f64 / total as f64) * 100.0
        }
    }
}

/// Key-value store contract the accessor relies on
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Look up a live value; expired entries report `None`
    async fn get(&self, key: &str) -> Option<StoreValue>;

    /// Store a value, overwriting any existing entry under `key`
    async fn set(&self, key: String, value: StoreValue, expiration: Expiration) -> Result<(), StoreError>;

    /// Remove an entry if present
    async fn delete(&self, key: &str);

    /// Number of entries currently held, including expired ones not yet purged
    async fn len(&self) -> usize;

    async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    async fn stats(&self) -> StoreStats {
        StoreStats::default()
    }
}

/// Configuration for [`InMemoryStore`]
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Retention applied for [`Expiration::Default`]; `None` keeps entries forever
    pub default_ttl: Option<Duration>,
    /// Interval between janitor passes
    pub cleanup_interval: Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            default_ttl: Some(Duration::from_secs(300)),  // 5 minutes
            cleanup_interval: Duration::from_secs(600),   // 10 minutes
        }
    }
}

#[derive(Debug, Clone)]
struct StoreEntry {
    value: StoreValue,
    expires_at: Option<Instant>,
}

impl StoreEntry {
    fn is_expired_at(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| now >= at)
    }
}

type Entries = Arc<RwLock<HashMap<String, StoreEntry>>>;
type SharedStats = Arc<RwLock<StoreStats>>;

/// In-memory expiring store
///
/// When constructed inside a tokio runtime a janitor task purges expired
/// entries every `cleanup_interval`. The janitor only holds weak references
/// and exits once the store is dropped.
pub struct InMemoryStore {
    config: StoreConfig,
    entries: Entries,
    stats: SharedStats,
}

impl InMemoryStore {
    pub fn new(config: StoreConfig) -> Self {
        let store = Self {
            config,
            entries: Arc::new(RwLock::new(HashMap::new())),
            stats: Arc::new(RwLock::new(StoreStats::default())),
        };

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(run_janitor(
                    Arc::downgrade(&store.entries),
                    Arc::downgrade(&store.stats),
                    store.config.cleanup_interval,
                ));
            }
            Err(_) => debug!("No tokio runtime; expired entries are purged on access only"),
        }

        store
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Remove every expired entry now, returning how many were dropped
    pub async fn delete_expired(&self) -> usize {
        purge_expired(&self.entries, &self.stats).await
    }

    /// Drop all entries
    pub async fn flush(&self) {
        self.entries.write().await.clear();
    }

    /// Deadline for an entry written at `now`; a TTL past the clock's range never expires
    fn expires_at(&self, expiration: Expiration, now: Instant) -> Option<Instant> {
        let ttl = match expiration {
            Expiration::Default => self.config.default_ttl?,
            Expiration::Never => return None,
            Expiration::After(ttl) => ttl,
        };
        now.checked_add(ttl)
    }
}

async fn run_janitor(entries: Weak<RwLock<HashMap<String, StoreEntry>>>, stats: Weak<RwLock<StoreStats>>, every: Duration) {
    if every.is_zero() {
        debug!("Store janitor disabled (zero cleanup interval)");
        return;
    }

    let mut interval = tokio::time::interval(every);
    // The first tick completes immediately
    interval.tick().await;

    loop {
        interval.tick().await;

        let (Some(entries), Some(stats)) = (entries.upgrade(), stats.upgrade()) else {
            debug!("Store dropped, janitor exiting");
            return;
        };
        let purged = purge_expired(&entries, &stats).await;
        if purged > 0 {
            debug!(purged = purged, "Janitor purged expired entries");
        }
    }
}

async fn purge_expired(entries: &Entries, stats: &SharedStats) -> usize {
    let now = Instant::now();
    let mut entries = entries.write().await;
    let mut stats = stats.write().await;

    let before = entries.len();
    entries.retain(|_, entry| !entry.is_expired_at(now));
    let purged = before - entries.len();

    stats.expired += purged as u64;
    stats.entries = entries.len() as u64;
    purged
}

#[async_trait]
impl KeyValueStore for InMemoryStore {
    async fn get(&self, key: &str) -> Option<StoreValue> {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        let mut stats = self.stats.write().await;

        if let Some(entry) = entries.get(key) {
            if !entry.is_expired_at(now) {
                stats.hits += 1;
                Some(entry.value.clone())
            } else {
                // Expired but not yet purged
                entries.remove(key);
                stats.expired += 1;
                stats.misses += 1;
                debug!(key = %key, "Store entry expired");
                None
            }
        } else {
            stats.misses += 1;
            None
        }
    }

    async fn set(&self, key: String, value: StoreValue, expiration: Expiration) -> Result<(), StoreError> {
        let expires_at = self.expires_at(expiration, Instant::now());
        debug!(
            key = %key,
            kind = value.kind(),
            expiration = ?expiration,
            "Store set"
        );

        self.entries
            .write()
            .await
            .insert(key, StoreEntry { value, expires_at });
        Ok(())
    }

    async fn delete(&self, key: &str) {
        self.entries.write().await.remove(key);
    }

    async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    async fn stats(&self) -> StoreStats {
        let mut result = self.stats.read().await.clone();
        result.entries = self.entries.read().await.len() as u64;
        result.hit_rate = StoreStats::calculate_hit_rate(result.hits, result.misses);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bytes(data: &str) -> StoreValue {
        StoreValue::Bytes(data.as_bytes().to_vec())
    }

    #[tokio::test]
    async fn test_store_get_set() {
        let store = InMemoryStore::new(StoreConfig::default());

        store.set("partition".to_string(), bytes("blob"), Expiration::Default).await.unwrap();

        assert_eq!(store.get("partition").await, Some(bytes("blob")));
        assert_eq!(store.get("other").await, None);
    }

    #[tokio::test]
    async fn test_store_set_overwrites() {
        let store = InMemoryStore::new(StoreConfig::default());

        store.set("k".to_string(), bytes("first"), Expiration::Default).await.unwrap();
        store.set("k".to_string(), bytes("second"), Expiration::Default).await.unwrap();

        assert_eq!(store.get("k").await, Some(bytes("second")));
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_store_ttl_expiration() {
        let store = InMemoryStore::new(StoreConfig::default());

        store
            .set("short".to_string(), bytes("v"), Expiration::After(Duration::from_millis(100)))
            .await
            .unwrap();
        assert_eq!(store.get("short").await, Some(bytes("v")));

        tokio::time::advance(Duration::from_millis(150)).await;

        assert_eq!(store.get("short").await, None);
        let stats = store.stats().await;
        assert_eq!(stats.expired, 1);
        assert_eq!(stats.entries, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_store_default_expiration_uses_config() {
        let store = InMemoryStore::new(StoreConfig {
            default_ttl: Some(Duration::from_secs(5)),
            cleanup_interval: Duration::from_secs(3600),
        });

        store.set("default".to_string(), bytes("a"), Expiration::Default).await.unwrap();
        store.set("never".to_string(), bytes("b"), Expiration::Never).await.unwrap();

        tokio::time::advance(Duration::from_secs(6)).await;

        assert_eq!(store.get("default").await, None);
        assert_eq!(store.get("never").await, Some(bytes("b")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_store_without_default_ttl_keeps_entries() {
        let store = InMemoryStore::new(StoreConfig {
            default_ttl: None,
            cleanup_interval: Duration::from_secs(60),
        });

        store.set("k".to_string(), bytes("v"), Expiration::Default).await.unwrap();
        tokio::time::advance(Duration::from_secs(24 * 3600)).await;

        assert_eq!(store.get("k").await, Some(bytes("v")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_store_huge_ttl_never_expires() {
        let store = InMemoryStore::new(StoreConfig {
            default_ttl: Some(Duration::from_secs(u64::MAX)),
            cleanup_interval: Duration::from_secs(60),
        });

        store.set("default".to_string(), bytes("a"), Expiration::Default).await.unwrap();
        store.set("explicit".to_string(), bytes("b"), Expiration::After(Duration::MAX)).await.unwrap();
        tokio::time::advance(Duration::from_secs(24 * 3600)).await;

        assert_eq!(store.get("default").await, Some(bytes("a")));
        assert_eq!(store.get("explicit").await, Some(bytes("b")));
        assert_eq!(store.delete_expired().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_store_janitor_purges_expired() {
        let store = InMemoryStore::new(StoreConfig {
            default_ttl: Some(Duration::from_millis(100)),
            cleanup_interval: Duration::from_secs(1),
        });

        for i in 0..5 {
            store.set(format!("cleanup_{}", i), bytes("v"), Expiration::Default).await.unwrap();
        }
        store.set("kept".to_string(), bytes("v"), Expiration::Never).await.unwrap();
        assert_eq!(store.len().await, 6);

        // Auto-advances paused time past the first janitor pass
        tokio::time::sleep(Duration::from_millis(1100)).await;

        assert_eq!(store.len().await, 1);
        assert_eq!(store.stats().await.expired, 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_store_delete_expired() {
        let store = InMemoryStore::new(StoreConfig {
            default_ttl: Some(Duration::from_millis(10)),
            cleanup_interval: Duration::from_secs(3600),
        });

        store.set("a".to_string(), bytes("v"), Expiration::Default).await.unwrap();
        store.set("b".to_string(), bytes("v"), Expiration::Default).await.unwrap();
        store.set("c".to_string(), bytes("v"), Expiration::Never).await.unwrap();

        tokio::time::advance(Duration::from_millis(20)).await;

        assert_eq!(store.delete_expired().await, 2);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_store_delete_and_flush() {
        let store = InMemoryStore::new(StoreConfig::default());

        store.set("a".to_string(), bytes("v"), Expiration::Default).await.unwrap();
        store.set("b".to_string(), bytes("v"), Expiration::Default).await.unwrap();

        store.delete("a").await;
        assert_eq!(store.get("a").await, None);
        assert_eq!(store.len().await, 1);

        store.flush().await;
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_store_stats_tracking() {
        let store = InMemoryStore::new(StoreConfig::default());

        store.set("test1".to_string(), bytes("v"), Expiration::Default).await.unwrap();
        store.set("test2".to_string(), StoreValue::Integer(7), Expiration::Default).await.unwrap();

        let _ = store.get("test1").await;
        let _ = store.get("nonexistent").await;

        let stats = store.stats().await;
        assert_eq!(stats.entries, 2);
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.hit_rate, 50.0);
    }

    #[tokio::test]
    async fn test_store_concurrent_access() {
        let store = Arc::new(InMemoryStore::new(StoreConfig::default()));
        let mut handles = vec![];

        for i in 0..20 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                let key = format!("concurrent_{}", i);
                store.set(key.clone(), StoreValue::Integer(i), Expiration::Default).await.unwrap();
                store.get(&key).await
            }));
        }

        for (i, handle) in handles.into_iter().enumerate() {
            assert_eq!(handle.await.unwrap(), Some(StoreValue::Integer(i as i64)));
        }
        assert_eq!(store.len().await, 20);
    }

    #[test]
    fn test_store_without_runtime() {
        // No janitor without a runtime, construction must still succeed
        let store = InMemoryStore::new(StoreConfig::default());
        assert_eq!(store.config().cleanup_interval, Duration::from_secs(600));
    }

    #[test]
    fn test_store_value_into_bytes() {
        assert_eq!(StoreValue::from(vec![1, 2, 3]).into_bytes(), Ok(vec![1, 2, 3]));

        let err = StoreValue::Text("not bytes".to_string()).into_bytes().unwrap_err();
        assert_eq!(err.kind(), "text");
        assert_eq!(StoreValue::Integer(1).kind(), "integer");
    }

    #[test]
    fn test_stats_calculate_hit_rate() {
        assert_eq!(StoreStats::calculate_hit_rate(0, 0), 0.0);
        assert_eq!(StoreStats::calculate_hit_rate(80, 20), 80.0);
        assert_eq!(StoreStats::calculate_hit_rate(1, 0), 100.0);
    }
}

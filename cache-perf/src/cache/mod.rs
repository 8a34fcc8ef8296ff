//! Cache accessor boundary between the token client and an external store
//!
//! The client owns an in-memory representation of one cache partition. Before
//! reading it, the client asks the accessor to `replace` that representation
//! with whatever the store holds; after mutating it, the client asks the
//! accessor to `export` it back. The accessor only moves opaque bytes:
//!
//! - [`Marshaler`] / [`Unmarshaler`] are the capabilities the client hands in
//! - [`KeyValueStore`] is the expiring key-value collaborator
//! - [`StoreCacheAccessor`] performs exactly one store operation per call
//!
//! # Example Usage
//!
//! ```rust
//! use std::sync::Arc;
//! use token_cache_perf::cache::{CacheAccessor, InMemoryStore, StoreCacheAccessor, StoreConfig};
//! use token_cache_perf::client::TokenCache;
//!
//! # #[tokio::main]
//! # async fn main() {
//! let store = Arc::new(InMemoryStore::new(StoreConfig::default()));
//! let accessor = StoreCacheAccessor::new(store);
//!
//! let mut cache = TokenCache::default();
//! // Unknown partitions are a miss, not an error
//! accessor.replace(&mut cache, "client_tenant_AppTokenCache").await.unwrap();
//! accessor.export(&cache, "client_tenant_AppTokenCache").await.unwrap();
//! # }
//! ```

use thiserror::Error;

pub mod accessor;
pub mod capability;
pub mod store;

pub use accessor::*;
pub use capability::*;
pub use store::*;

/// Failures raised by a [`Marshaler`] or [`Unmarshaler`]
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Marshal failed: {0}")]
    Marshal(String),

    #[error("Unmarshal failed: {0}")]
    Unmarshal(String),
}

/// Failures surfaced by a [`CacheAccessor`]
///
/// None of these are fatal to a benchmark run, but each one means cache state
/// was lost or could not be restored for the partition named by `key`.
#[derive(Error, Debug)]
pub enum AccessorError {
    #[error("Export of partition '{key}' failed: {source}")]
    Marshal {
        key: String,
        #[source]
        source: CacheError,
    },

    #[error("Store rejected partition '{key}': {source}")]
    StoreWrite {
        key: String,
        #[source]
        source: StoreError,
    },

    #[error("Stored value for partition '{key}' is {found}, expected bytes")]
    Conversion { key: String, found: &'static str },

    #[error("Replace of partition '{key}' failed: {source}")]
    Unmarshal {
        key: String,
        #[source]
        source: CacheError,
    },
}

impl AccessorError {
    /// Partition key the failed operation was working on
    pub fn key(&self) -> &str {
        match self {
            AccessorError::Marshal { key, .. }
            | AccessorError::StoreWrite { key, .. }
            | AccessorError::Conversion { key, .. }
            | AccessorError::Unmarshal { key, .. } => key,
        }
    }
}

//! # Geoproxy Cache
//!
//! Tiered cache for upstream geo/traffic data.
//!
//! A [`TieredCache`] serves one namespace from exactly one store, chosen at
//! construction:
//!
//! - [`BoundedTtlStore`]: in-process map with per-entry TTL and LRU eviction
//! - a [`DistributedStore`]: [`RedisStore`] (native millisecond TTL) or
//!   [`TableStore`] (document table with an epoch-seconds TTL attribute)
//!
//! If no distributed store is configured, or it cannot be reached, the cache
//! uses the in-process store for its whole lifetime. Backend failures after
//! construction are logged and read as misses; they never reach callers.
//!
//! On top of the store each cache keeps an invalidation set (keys forced to
//! miss until their next `set`) and hit/miss/set/invalidation counters.
//!
//! ## Example
//!
//! ```
//! use geoproxy_cache::CacheRegistry;
//! use geoproxy_core::Settings;
//! use serde_json::json;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let settings = Settings::from_vars(Vec::<(String, String)>::new()).unwrap();
//! let registry = CacheRegistry::builder(settings).build();
//! let cache = registry.cache("traffic").await;
//!
//! cache.set("40.0:-73.0", json!({"congestion": 25}), None).await;
//! assert!(cache.get("40.0:-73.0").await.is_some());
//! # }
//! ```

pub mod clock;
pub mod distributed;
pub mod local;
pub mod metrics;
pub mod registry;
pub mod tiered;

// Re-exports
pub use clock::{Clock, ManualClock, SystemClock};
#[cfg(feature = "redis-store")]
pub use distributed::RedisStore;
pub use distributed::{
    DistributedStore, DocumentTable, MemoryTable, StoreSelection, TableRow, TableStore,
};
pub use local::{BoundedTtlStore, CacheEntry};
pub use metrics::{CacheMetrics, MetricsSnapshot, register_cache_metrics};
pub use registry::{CacheRegistry, CacheRegistryBuilder};
pub use tiered::{CacheConfig, TieredCache};

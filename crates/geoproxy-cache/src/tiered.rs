//! The public cache facade.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::clock::{Clock, SystemClock};
use crate::distributed::{DistributedStore, StoreSelection};
use crate::local::BoundedTtlStore;
use crate::metrics::{CacheMetrics, MetricsSnapshot};

/// Configuracion del cache.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// TTL usado cuando `set` no recibe uno (default: 60 segundos)
    pub default_ttl: Duration,
    /// Maximo numero de entries del store local (default: 10000, `None` = sin limite)
    pub max_entries: Option<usize>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            default_ttl: Duration::from_millis(60_000),
            max_entries: Some(10_000),
        }
    }
}

impl CacheConfig {
    /// Builds the cache configuration from process settings.
    pub fn from_settings(settings: &geoproxy_core::Settings) -> Self {
        Self {
            default_ttl: settings.default_ttl(),
            max_entries: settings.max_entries(),
        }
    }
}

/// The store a [`TieredCache`] reads and writes. Fixed at construction.
enum Backend {
    Local(BoundedTtlStore<Value>),
    Distributed(Arc<dyn DistributedStore>),
}

/// Cache de un namespace: store local o distribuido, mas invalidaciones y
/// metricas.
///
/// The backend is chosen once, from a [`StoreSelection`], and never changes.
/// Keys in the invalidation set read as misses until the next `set` for
/// that key, whatever the backend still holds.
///
/// # Examples
///
/// ```
/// use geoproxy_cache::{CacheConfig, TieredCache};
/// use serde_json::json;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let cache = TieredCache::local("traffic", CacheConfig::default());
///
/// cache.set("k", json!({"congestion": 30}), None).await;
/// assert_eq!(cache.get("k").await, Some(json!({"congestion": 30})));
///
/// cache.invalidate("k");
/// assert_eq!(cache.get("k").await, None);
///
/// let metrics = cache.metrics();
/// assert_eq!((metrics.hits, metrics.misses), (1, 1));
/// # }
/// ```
pub struct TieredCache {
    namespace: String,
    backend: Backend,
    invalidated: Mutex<HashSet<String>>,
    metrics: CacheMetrics,
    default_ttl: Duration,
}

impl TieredCache {
    /// Builds a cache over an already-resolved backend selection.
    pub fn new(
        namespace: impl Into<String>,
        selection: StoreSelection,
        config: CacheConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let namespace = namespace.into();
        let metrics = CacheMetrics::new(namespace.as_str());

        let backend = match selection {
            StoreSelection::Distributed(store) => {
                info!(namespace = %namespace, backend = store.name(), "Cache using distributed store");
                Backend::Distributed(store)
            },
            StoreSelection::Local { reason } => {
                info!(namespace = %namespace, reason = %reason, "Cache using in-process store");
                Backend::Local(
                    BoundedTtlStore::with_clock(config.max_entries, clock)
                        .with_metrics(metrics.clone()),
                )
            },
        };

        Self {
            namespace,
            backend,
            invalidated: Mutex::new(HashSet::new()),
            metrics,
            default_ttl: config.default_ttl,
        }
    }

    /// Builds a cache on the in-process store and the system clock.
    pub fn local(namespace: impl Into<String>, config: CacheConfig) -> Self {
        Self::new(
            namespace,
            StoreSelection::local("explicitly local"),
            config,
            Arc::new(SystemClock),
        )
    }

    /// Obtiene un valor del cache si existe.
    ///
    /// Invalidated keys miss without touching the store.
    pub async fn get(&self, key: &str) -> Option<Value> {
        let start = Instant::now();

        if self.invalidated.lock().contains(key) {
            debug!(namespace = %self.namespace, key = %key, "Cache miss (invalidated)");
            self.metrics.record_miss();
            return None;
        }

        let result = match &self.backend {
            Backend::Local(store) => store.get(key),
            Backend::Distributed(store) => store.get(key).await,
        };

        if result.is_some() {
            debug!(namespace = %self.namespace, key = %key, "Cache hit");
            self.metrics.record_hit();
        } else {
            debug!(namespace = %self.namespace, key = %key, "Cache miss");
            self.metrics.record_miss();
        }

        self.metrics.record_operation_duration("get", start.elapsed());
        result
    }

    /// Inserta un valor. `ttl = None` usa el TTL por defecto.
    ///
    /// A zero TTL stores nothing: the next `get` misses.
    pub async fn set(&self, key: &str, value: Value, ttl: Option<Duration>) {
        let start = Instant::now();
        let ttl = ttl.unwrap_or(self.default_ttl);

        self.invalidated.lock().remove(key);
        self.metrics.record_set();

        match &self.backend {
            Backend::Local(store) => store.set(key, value, ttl),
            Backend::Distributed(store) => store.set(key, &value, ttl).await,
        }

        self.metrics.record_operation_duration("set", start.elapsed());
    }

    /// Marca una key como stale. Efecto inmediato para los `get` siguientes.
    ///
    /// The in-process entry is dropped as well; a distributed entry stays
    /// in the backend, masked until the next `set` of the key.
    pub fn invalidate(&self, key: &str) {
        self.invalidated.lock().insert(key.to_string());
        if let Backend::Local(store) = &self.backend {
            store.delete(key);
        }
        self.metrics.record_invalidation();
        debug!(namespace = %self.namespace, key = %key, "Cache key invalidated");
    }

    /// Invalida todas las entradas y limpia el store.
    ///
    /// Counts as a single invalidation. For the table backend the store
    /// clear is a no-op and old rows stay until their TTL.
    pub async fn clear(&self) {
        self.invalidated.lock().clear();

        match &self.backend {
            Backend::Local(store) => store.clear(),
            Backend::Distributed(store) => store.clear().await,
        }

        self.metrics.record_invalidation();
        info!(namespace = %self.namespace, "Cache cleared");
    }

    /// Reads `key` and decodes it as `T`.
    ///
    /// A payload that does not decode is logged and reported as absent; the
    /// read still counts as a hit.
    pub async fn get_json<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let value = self.get(key).await?;
        match serde_json::from_value(value) {
            Ok(decoded) => Some(decoded),
            Err(e) => {
                warn!(namespace = %self.namespace, key = %key, error = %e, "Cached payload has unexpected shape");
                None
            },
        }
    }

    /// Encodes `value` as JSON and stores it under `key`.
    ///
    /// Values that cannot be encoded are logged and not stored.
    pub async fn set_json<T: Serialize + ?Sized>(
        &self,
        key: &str,
        value: &T,
        ttl: Option<Duration>,
    ) {
        match serde_json::to_value(value) {
            Ok(encoded) => self.set(key, encoded, ttl).await,
            Err(e) => {
                warn!(namespace = %self.namespace, key = %key, error = %e, "Value not cacheable");
            },
        }
    }

    /// Snapshot de las metricas, sin efectos secundarios.
    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Returns the live metrics recorder.
    pub fn metrics_recorder(&self) -> &CacheMetrics {
        &self.metrics
    }

    /// Returns the namespace of this cache.
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Returns the name of the active backend (`"memory"`, `"redis"`, `"table"`).
    pub fn backend_name(&self) -> &str {
        match &self.backend {
            Backend::Local(_) => "memory",
            Backend::Distributed(store) => store.name(),
        }
    }

    /// Returns true if a distributed store backs this cache.
    pub fn is_distributed(&self) -> bool {
        matches!(self.backend, Backend::Distributed(_))
    }

    /// Retorna el numero de entries del store local. `None` con backend
    /// distribuido.
    pub fn entry_count(&self) -> Option<usize> {
        match &self.backend {
            Backend::Local(store) => Some(store.len()),
            Backend::Distributed(_) => None,
        }
    }

    /// Returns the TTL applied when `set` gets none.
    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }
}

impl std::fmt::Debug for TieredCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TieredCache")
            .field("namespace", &self.namespace)
            .field("backend", &self.backend_name())
            .field("default_ttl", &self.default_ttl)
            .finish()
    }
}

//! Distributed cache backends.
//!
//! A [`DistributedStore`] is optional. Whether one is used is decided once,
//! by [`StoreSelection::resolve`], before a
//! [`TieredCache`](crate::TieredCache) is built; the cache never swaps
//! backends afterwards.
//!
//! Backends implement the fallible `try_*` methods. Callers use the provided
//! `get`/`set`/`clear`, which log failures at `warn` and degrade to
//! "absent"/no-op so backend errors never reach the cache's callers.

#[cfg(feature = "redis-store")]
pub mod redis_store;
pub mod table;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use geoproxy_core::{BackendError, Settings, StoreKind};
use serde_json::Value;
use tracing::{info, warn};

use crate::clock::Clock;

#[cfg(feature = "redis-store")]
pub use redis_store::RedisStore;
pub use table::{DocumentTable, MemoryTable, TableRow, TableStore};

/// A shared key/value backend with TTL support.
///
/// Keys passed in are cache-local; implementations prefix them with their
/// namespace so caches for different namespaces never see each other's data.
#[async_trait]
pub trait DistributedStore: Send + Sync {
    /// Reads and decodes the value stored under `key`.
    async fn try_get(&self, key: &str) -> Result<Option<Value>, BackendError>;

    /// Encodes and stores `value` under `key` for `ttl`.
    async fn try_set(&self, key: &str, value: &Value, ttl: Duration) -> Result<(), BackendError>;

    /// Removes every entry of this store's namespace.
    async fn try_clear(&self) -> Result<(), BackendError>;

    /// Returns the name of this backend, for logs.
    fn name(&self) -> &str;

    /// Like [`try_get`](Self::try_get), but failures read as absent.
    async fn get(&self, key: &str) -> Option<Value> {
        match self.try_get(key).await {
            Ok(value) => value,
            Err(e) => {
                warn!(backend = self.name(), key = %key, error = %e, "Distributed GET failed; treating as miss");
                None
            },
        }
    }

    /// Like [`try_set`](Self::try_set), but failures are logged and dropped.
    async fn set(&self, key: &str, value: &Value, ttl: Duration) {
        if let Err(e) = self.try_set(key, value, ttl).await {
            warn!(backend = self.name(), key = %key, error = %e, "Distributed SET failed; continuing");
        }
    }

    /// Like [`try_clear`](Self::try_clear), but failures are logged and dropped.
    async fn clear(&self) {
        if let Err(e) = self.try_clear().await {
            warn!(backend = self.name(), error = %e, "Distributed CLEAR failed; continuing");
        }
    }
}

/// The outcome of backend selection.
#[derive(Clone)]
pub enum StoreSelection {
    /// A distributed backend is configured and reachable.
    Distributed(Arc<dyn DistributedStore>),
    /// Use the in-process store. `reason` says why no distributed backend
    /// was selected.
    Local { reason: String },
}

impl StoreSelection {
    /// Selects the in-process store.
    pub fn local(reason: impl Into<String>) -> Self {
        Self::Local {
            reason: reason.into(),
        }
    }

    /// Resolves the backend for `namespace` from `settings`.
    ///
    /// Never fails: a missing URL, a backend compiled out, or a failed
    /// handshake all resolve to [`StoreSelection::Local`].
    ///
    /// For [`StoreKind::Table`], `table` supplies the document-store client.
    /// When none is given, a `memory://` URL selects a fresh [`MemoryTable`];
    /// any other URL has no client and falls back to the in-process store.
    pub async fn resolve(
        settings: &Settings,
        namespace: &str,
        table: Option<Arc<dyn DocumentTable>>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let Some(url) = settings.distributed_store_url() else {
            return Self::local("DISTRIBUTED_STORE_URL not set");
        };

        let selection = match settings.distributed_store_kind() {
            StoreKind::Redis => Self::resolve_redis(url, namespace).await,
            StoreKind::Table => {
                let client = table.or_else(|| {
                    url.starts_with("memory:")
                        .then(|| Arc::new(MemoryTable::new()) as Arc<dyn DocumentTable>)
                });
                match client {
                    Some(client) => {
                        let store = TableStore::new(
                            client,
                            settings.distributed_store_table(),
                            namespace,
                            clock,
                        );
                        Ok(Arc::new(store) as Arc<dyn DistributedStore>)
                    },
                    None => Err(BackendError::unavailable(format!(
                        "no document table client for {}",
                        url
                    ))),
                }
            },
        };

        match selection {
            Ok(store) => {
                info!(namespace = %namespace, backend = store.name(), "Distributed cache backend selected");
                Self::Distributed(store)
            },
            Err(e) => {
                warn!(namespace = %namespace, error = %e, "Distributed cache unavailable; using in-process store");
                Self::local(e.to_string())
            },
        }
    }

    #[cfg(feature = "redis-store")]
    async fn resolve_redis(
        url: &str,
        namespace: &str,
    ) -> Result<Arc<dyn DistributedStore>, BackendError> {
        let store = RedisStore::connect(url, namespace).await?;
        Ok(Arc::new(store))
    }

    #[cfg(not(feature = "redis-store"))]
    async fn resolve_redis(
        _url: &str,
        _namespace: &str,
    ) -> Result<Arc<dyn DistributedStore>, BackendError> {
        Err(BackendError::unavailable(
            "redis support not compiled in (enable the redis-store feature)",
        ))
    }

    /// Returns true if a distributed backend was selected.
    pub fn is_distributed(&self) -> bool {
        matches!(self, Self::Distributed(_))
    }
}

impl std::fmt::Debug for StoreSelection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Distributed(store) => f.debug_tuple("Distributed").field(&store.name()).finish(),
            Self::Local { reason } => f.debug_struct("Local").field("reason", reason).finish(),
        }
    }
}

/// Joins a namespace and a cache-local key into a backend key.
pub(crate) fn namespaced(namespace: &str, key: &str) -> String {
    format!("{}:{}", namespace, key)
}

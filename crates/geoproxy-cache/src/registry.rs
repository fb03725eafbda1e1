//! One [`TieredCache`] per namespace.

use std::collections::HashMap;
use std::sync::Arc;

use geoproxy_core::Settings;
use tokio::sync::Mutex;
use tracing::debug;

use crate::clock::{Clock, SystemClock};
use crate::distributed::{DocumentTable, StoreSelection};
use crate::tiered::{CacheConfig, TieredCache};

/// Owns the caches of a process, one per namespace.
///
/// Build it once at startup and hand it (or the caches it returns) to the
/// components that need caching. Caches for different namespaces share no
/// state.
///
/// # Examples
///
/// ```
/// use geoproxy_cache::CacheRegistry;
/// use geoproxy_core::Settings;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let settings = Settings::from_vars(Vec::<(String, String)>::new()).unwrap();
/// let registry = CacheRegistry::builder(settings).build();
///
/// let traffic = registry.cache("traffic").await;
/// let again = registry.cache("traffic").await;
/// assert!(std::sync::Arc::ptr_eq(&traffic, &again));
/// assert_eq!(traffic.backend_name(), "memory");
/// # }
/// ```
pub struct CacheRegistry {
    settings: Settings,
    clock: Arc<dyn Clock>,
    document_table: Option<Arc<dyn DocumentTable>>,
    caches: Mutex<HashMap<String, Arc<TieredCache>>>,
}

impl CacheRegistry {
    /// Creates a builder for a registry over `settings`.
    pub fn builder(settings: Settings) -> CacheRegistryBuilder {
        CacheRegistryBuilder {
            settings,
            clock: None,
            document_table: None,
        }
    }

    /// Returns the cache for `namespace`, building it on first use.
    ///
    /// The first call for a namespace resolves its backend (which may
    /// connect to the distributed store); later calls return the same cache.
    /// Resolution runs without holding the registry lock, so a slow backend
    /// never blocks lookups for other namespaces. If two tasks race on the
    /// same namespace, the first one registered wins and both get it.
    pub async fn cache(&self, namespace: &str) -> Arc<TieredCache> {
        if let Some(cache) = self.caches.lock().await.get(namespace) {
            return Arc::clone(cache);
        }

        let selection = StoreSelection::resolve(
            &self.settings,
            namespace,
            self.document_table.clone(),
            Arc::clone(&self.clock),
        )
        .await;
        let built = Arc::new(TieredCache::new(
            namespace,
            selection,
            CacheConfig::from_settings(&self.settings),
            Arc::clone(&self.clock),
        ));

        let mut caches = self.caches.lock().await;
        let cache = caches
            .entry(namespace.to_string())
            .or_insert_with(|| {
                debug!(namespace = %namespace, backend = built.backend_name(), "Cache registered");
                Arc::clone(&built)
            });
        Arc::clone(cache)
    }

    /// Returns the namespaces built so far.
    pub async fn namespaces(&self) -> Vec<String> {
        let mut names: Vec<String> = self.caches.lock().await.keys().cloned().collect();
        names.sort();
        names
    }

    /// Returns the settings the registry was built with.
    pub fn settings(&self) -> &Settings {
        &self.settings
    }
}

/// Builder for [`CacheRegistry`].
pub struct CacheRegistryBuilder {
    settings: Settings,
    clock: Option<Arc<dyn Clock>>,
    document_table: Option<Arc<dyn DocumentTable>>,
}

impl CacheRegistryBuilder {
    /// Sets the clock shared by every cache (default: system clock).
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Sets the document-table client used when the table backend is
    /// configured.
    pub fn document_table(mut self, client: Arc<dyn DocumentTable>) -> Self {
        self.document_table = Some(client);
        self
    }

    /// Builds the registry. No backend is contacted until a cache is
    /// requested.
    pub fn build(self) -> CacheRegistry {
        CacheRegistry {
            settings: self.settings,
            clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
            document_table: self.document_table,
            caches: Mutex::new(HashMap::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distributed::MemoryTable;
    use serde_json::json;

    fn settings(vars: &[(&str, &str)]) -> Settings {
        Settings::from_vars(vars.iter().map(|(k, v)| (k.to_string(), v.to_string()))).unwrap()
    }

    #[tokio::test]
    async fn test_namespaces_are_independent() {
        let registry = CacheRegistry::builder(settings(&[])).build();

        let traffic = registry.cache("traffic").await;
        let weather = registry.cache("weather").await;

        traffic.set("k", json!(1), None).await;

        assert_eq!(weather.get("k").await, None);
        assert_eq!(traffic.get("k").await, Some(json!(1)));
        assert_eq!(weather.metrics().misses, 1);
        assert_eq!(traffic.metrics().hits, 1);
        assert_eq!(registry.namespaces().await, vec!["traffic", "weather"]);
    }

    #[tokio::test]
    async fn test_settings_flow_into_caches() {
        let registry = CacheRegistry::builder(settings(&[("DEFAULT_TTL_MS", "1234")])).build();

        let cache = registry.cache("traffic").await;

        assert_eq!(cache.default_ttl().as_millis(), 1234);
        assert_eq!(registry.settings().default_ttl().as_millis(), 1234);
    }

    #[tokio::test]
    async fn test_concurrent_first_use_shares_one_cache() {
        let registry = CacheRegistry::builder(settings(&[])).build();

        let (a, b) = tokio::join!(registry.cache("traffic"), registry.cache("traffic"));

        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(registry.namespaces().await, vec!["traffic"]);
    }

    #[tokio::test]
    async fn test_injected_document_table() {
        let table = Arc::new(MemoryTable::new());
        let registry = CacheRegistry::builder(settings(&[
            ("DISTRIBUTED_STORE_URL", "https://table.example"),
            ("DISTRIBUTED_STORE_KIND", "table"),
            ("DISTRIBUTED_STORE_TABLE", "geo-cache"),
        ]))
        .document_table(table.clone())
        .build();

        let cache = registry.cache("traffic").await;
        cache.set("k", json!({"v": true}), None).await;

        assert_eq!(cache.backend_name(), "table");
        assert!(table.raw_row("geo-cache", "traffic:k").is_some());
    }
}

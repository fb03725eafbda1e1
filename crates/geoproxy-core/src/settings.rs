//! Environment-driven settings.
//!
//! Settings are read once at process start with the `config` crate and then
//! passed by reference to whatever needs them. Recognized variables:
//!
//! | Variable | Default |
//! |---|---|
//! | `DISTRIBUTED_STORE_URL` | unset (in-process store only) |
//! | `DISTRIBUTED_STORE_KIND` | `redis` |
//! | `DISTRIBUTED_STORE_TABLE` | `geoproxy-cache` |
//! | `DEFAULT_TTL_MS` | `60000` |
//! | `CACHE_MAX_ENTRIES` | `10000` (`0` = unbounded) |
//! | `UPSTREAM_PROVIDER` | `mock` |
//! | `UPSTREAM_API_KEY` | unset |
//! | `UPSTREAM_TIMEOUT_MS` | `3000` |
//! | `UPSTREAM_ATTEMPTS` | `2` |
//! | `UPSTREAM_RETRY_DELAY_MS` | `200` |
//! | `TRAFFIC_TTL_MS` | `300000` |

use std::time::Duration;

use config::{Config, Environment};
use serde::Deserialize;

use crate::error::SettingsError;

/// Which distributed backend `DISTRIBUTED_STORE_URL` points at.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    /// Key/value store with native millisecond TTL (Redis).
    #[default]
    Redis,
    /// Document table with an epoch-seconds TTL attribute.
    Table,
}

/// Which upstream traffic provider to call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// TomTom flow-segment API.
    TomTom,
    /// Local provider producing synthetic readings.
    #[default]
    Mock,
}

impl ProviderKind {
    /// Provider name as used in cache keys and results.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TomTom => "tomtom",
            Self::Mock => "mock",
        }
    }
}

/// Process-wide settings.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    #[serde(default)]
    distributed_store_url: Option<String>,
    #[serde(default)]
    distributed_store_kind: StoreKind,
    distributed_store_table: String,
    default_ttl_ms: u64,
    cache_max_entries: usize,
    #[serde(default)]
    upstream_provider: ProviderKind,
    #[serde(default)]
    upstream_api_key: Option<String>,
    upstream_timeout_ms: u64,
    upstream_attempts: u32,
    upstream_retry_delay_ms: u64,
    traffic_ttl_ms: u64,
}

impl Settings {
    /// Loads settings from the process environment.
    pub fn from_env() -> Result<Self, SettingsError> {
        Self::load(Environment::default())
    }

    /// Loads settings from an explicit set of variables instead of the
    /// process environment.
    ///
    /// # Examples
    ///
    /// ```
    /// use geoproxy_core::Settings;
    ///
    /// let settings = Settings::from_vars([("DEFAULT_TTL_MS", "1500")]).unwrap();
    /// assert_eq!(settings.default_ttl().as_millis(), 1500);
    /// assert!(settings.distributed_store_url().is_none());
    /// ```
    pub fn from_vars<I, K, V>(vars: I) -> Result<Self, SettingsError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let source: config::Map<String, String> = vars
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        Self::load(Environment::default().source(Some(source)))
    }

    fn load(env: Environment) -> Result<Self, SettingsError> {
        let settings: Settings = Config::builder()
            .set_default("distributed_store_table", "geoproxy-cache")?
            .set_default("default_ttl_ms", 60_000)?
            .set_default("cache_max_entries", 10_000)?
            .set_default("upstream_timeout_ms", 3_000)?
            .set_default("upstream_attempts", 2)?
            .set_default("upstream_retry_delay_ms", 200)?
            .set_default("traffic_ttl_ms", 300_000)?
            .add_source(env)
            .build()?
            .try_deserialize()?;

        settings.validated()
    }

    fn validated(mut self) -> Result<Self, SettingsError> {
        // Variables definidas pero vacias cuentan como ausentes
        self.distributed_store_url = non_blank(self.distributed_store_url);
        self.upstream_api_key = non_blank(self.upstream_api_key);

        if self.upstream_attempts == 0 {
            return Err(SettingsError::invalid(
                "UPSTREAM_ATTEMPTS",
                "must be at least 1",
            ));
        }
        if self.upstream_timeout_ms == 0 {
            return Err(SettingsError::invalid(
                "UPSTREAM_TIMEOUT_MS",
                "must be greater than 0",
            ));
        }
        Ok(self)
    }

    /// Returns the distributed store URL, if one is configured.
    pub fn distributed_store_url(&self) -> Option<&str> {
        self.distributed_store_url.as_deref()
    }

    /// Returns the kind of distributed store the URL points at.
    pub fn distributed_store_kind(&self) -> StoreKind {
        self.distributed_store_kind
    }

    /// Returns the table name used by the table backend.
    pub fn distributed_store_table(&self) -> &str {
        &self.distributed_store_table
    }

    /// Returns the TTL applied when a caller does not pass one.
    pub fn default_ttl(&self) -> Duration {
        Duration::from_millis(self.default_ttl_ms)
    }

    /// Returns the in-process store capacity, or `None` when unbounded.
    pub fn max_entries(&self) -> Option<usize> {
        (self.cache_max_entries > 0).then_some(self.cache_max_entries)
    }

    /// Returns the configured upstream provider.
    pub fn upstream_provider(&self) -> ProviderKind {
        self.upstream_provider
    }

    /// Returns the upstream API key, if one is configured.
    pub fn upstream_api_key(&self) -> Option<&str> {
        self.upstream_api_key.as_deref()
    }

    /// Returns the per-attempt upstream deadline.
    pub fn upstream_timeout(&self) -> Duration {
        Duration::from_millis(self.upstream_timeout_ms)
    }

    /// Returns the maximum number of upstream attempts.
    pub fn upstream_attempts(&self) -> u32 {
        self.upstream_attempts
    }

    /// Returns the pause between upstream attempts.
    pub fn upstream_retry_delay(&self) -> Duration {
        Duration::from_millis(self.upstream_retry_delay_ms)
    }

    /// Returns the TTL for cached traffic readings.
    pub fn traffic_ttl(&self) -> Duration {
        Duration::from_millis(self.traffic_ttl_ms)
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

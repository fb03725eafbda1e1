//! Traffic lookups that degrade instead of failing.
//!
//! Every lookup ends in one of three outcomes:
//!
//! | Outcome | When | Cached |
//! |---|---|---|
//! | cached | the key is in the cache | already |
//! | fetched | the provider answered | yes, for `TRAFFIC_TTL_MS` |
//! | fallback | credentials missing or every attempt failed | never |
//!
//! Fallbacks are never written to the cache, so the next lookup for the
//! same point tries the provider again.

use std::sync::Arc;
use std::time::Duration;

use geoproxy_cache::{CacheRegistry, TieredCache};
use geoproxy_core::{CacheKey, FallbackResult, Settings, UpstreamError};
use metrics::{counter, describe_counter};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::credentials::{CredentialSource, StaticCredentials};
use crate::provider::{self, Coordinates, TrafficProvider, TrafficReading, synthetic_congestion};
use crate::resilience::ResilientCall;

/// Cache namespace for traffic readings.
pub const TRAFFIC_NAMESPACE: &str = "traffic";

/// Provider name carried by synthesized readings.
pub const FALLBACK_PROVIDER: &str = "mock-fallback";

/// Registra las metricas de lookups de trafico.
pub fn register_traffic_metrics() {
    describe_counter!(
        "geoproxy_traffic_lookups_total",
        "Total traffic lookups by outcome (cached, fetched, fallback)"
    );
}

/// Caller-facing shape of a lookup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrafficResponse {
    pub provider: String,
    pub congestion: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from_fallback: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TrafficResponse {
    /// Returns true if this response came from the fallback path.
    pub fn is_fallback(&self) -> bool {
        self.from_fallback == Some(true)
    }
}

impl From<FallbackResult<TrafficReading>> for TrafficResponse {
    fn from(result: FallbackResult<TrafficReading>) -> Self {
        let from_fallback = result.is_fallback().then_some(true);
        let error = result.error().map(str::to_string);
        let reading = result.into_inner();
        Self {
            provider: reading.provider,
            congestion: reading.congestion,
            from_fallback,
            error,
        }
    }
}

#[derive(Serialize)]
struct TrafficKeyParams<'a> {
    lat: f64,
    lng: f64,
    provider: &'a str,
}

/// Cache-first traffic lookup with a resilient upstream call and a
/// synthesized fallback.
pub struct DegradingFetchAdapter {
    cache: Arc<TieredCache>,
    provider: Arc<dyn TrafficProvider>,
    credentials: Arc<dyn CredentialSource>,
    call: ResilientCall,
    ttl: Duration,
}

impl DegradingFetchAdapter {
    /// Creates an adapter with the default call policy and the cache's
    /// default TTL.
    pub fn new(
        cache: Arc<TieredCache>,
        provider: Arc<dyn TrafficProvider>,
        credentials: Arc<dyn CredentialSource>,
    ) -> Self {
        let ttl = cache.default_ttl();
        Self {
            cache,
            provider,
            credentials,
            call: ResilientCall::default(),
            ttl,
        }
    }

    /// Wires an adapter from settings: the configured provider, its API
    /// key, the `UPSTREAM_*` call policy and the `traffic` cache.
    pub async fn from_settings(settings: &Settings, registry: &CacheRegistry) -> Self {
        let cache = registry.cache(TRAFFIC_NAMESPACE).await;
        Self::new(
            cache,
            provider::from_kind(settings.upstream_provider()),
            Arc::new(StaticCredentials::from_settings(settings)),
        )
        .with_call(ResilientCall::from_settings(settings))
        .with_ttl(settings.traffic_ttl())
    }

    /// Sets the upstream call policy.
    pub fn with_call(mut self, call: ResilientCall) -> Self {
        self.call = call;
        self
    }

    /// Sets the TTL of fetched readings.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Returns the cache readings are stored in.
    pub fn cache(&self) -> &Arc<TieredCache> {
        &self.cache
    }

    /// Returns the provider name.
    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    /// Derives the cache key for `point`, rounded to 4 decimals.
    pub fn cache_key(&self, point: Coordinates) -> Result<CacheKey, serde_json::Error> {
        let rounded = point.rounded();
        CacheKey::derive(
            TRAFFIC_NAMESPACE,
            &TrafficKeyParams {
                lat: rounded.lat,
                lng: rounded.lng,
                provider: self.provider.name(),
            },
        )
    }

    /// Looks up the reading at `point`. Never fails: upstream problems
    /// produce a fallback reading tagged with the error.
    pub async fn fetch(&self, point: Coordinates) -> FallbackResult<TrafficReading> {
        let point = point.rounded();
        let key = match self.cache_key(point) {
            Ok(key) => Some(key),
            Err(e) => {
                warn!(lat = point.lat, lng = point.lng, error = %e, "Cache key derivation failed, bypassing cache");
                None
            },
        };

        if let Some(key) = &key
            && let Some(reading) = self.cache.get_json::<TrafficReading>(key.as_str()).await
        {
            debug!(key = %key, "Traffic served from cache");
            return Self::finish(FallbackResult::cached(reading));
        }

        let result = match self.fetch_upstream(point).await {
            Ok(reading) => {
                if !self.provider.is_synthetic()
                    && let Some(key) = &key
                {
                    self.cache.set_json(key.as_str(), &reading, Some(self.ttl)).await;
                }
                FallbackResult::fetched(reading)
            },
            Err(err) => {
                warn!(
                    provider = self.provider.name(),
                    kind = err.kind(),
                    error = %err,
                    "Traffic lookup degraded to fallback"
                );
                FallbackResult::fallback(Self::fallback_reading(), err.to_string())
            },
        };

        Self::finish(result)
    }

    /// [`fetch`](Self::fetch) flattened into the caller-facing shape.
    pub async fn fetch_with_fallback(&self, lat: f64, lng: f64) -> TrafficResponse {
        self.fetch(Coordinates::new(lat, lng)).await.into()
    }

    async fn fetch_upstream(&self, point: Coordinates) -> Result<TrafficReading, UpstreamError> {
        let api_key = if self.provider.requires_credentials() {
            let key = self.credentials.api_key(self.provider.name()).await;
            Some(key.ok_or_else(|| UpstreamError::missing_credentials(self.provider.name()))?)
        } else {
            None
        };

        let provider = &self.provider;
        let api_key = api_key.as_deref();
        self.call.invoke(|| provider.fetch(point, api_key)).await
    }

    fn fallback_reading() -> TrafficReading {
        TrafficReading::new(FALLBACK_PROVIDER, synthetic_congestion())
    }

    fn finish(result: FallbackResult<TrafficReading>) -> FallbackResult<TrafficReading> {
        counter!("geoproxy_traffic_lookups_total", "outcome" => result.provenance().as_str())
            .increment(1);
        result
    }
}

impl std::fmt::Debug for DegradingFetchAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DegradingFetchAdapter")
            .field("namespace", &self.cache.namespace())
            .field("provider", &self.provider.name())
            .field("call", &self.call)
            .field("ttl", &self.ttl)
            .finish()
    }
}

//! Upstream traffic providers.

mod mock;
mod tomtom;

pub use mock::{MockTrafficProvider, SYNTHETIC_CONGESTION, synthetic_congestion};
pub use tomtom::HttpTrafficProvider;

use std::sync::Arc;

use async_trait::async_trait;
use geoproxy_core::{ProviderKind, UpstreamError};
use serde::{Deserialize, Serialize};

/// Decimal places kept when coordinates are used as cache keys (~11 m).
pub const COORDINATE_PRECISION: i32 = 4;

/// A WGS84 point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}

impl Coordinates {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Returns the point rounded to [`COORDINATE_PRECISION`] decimals, so
    /// nearby requests share a cache entry.
    pub fn rounded(&self) -> Self {
        Self {
            lat: round_to(self.lat, COORDINATE_PRECISION),
            lng: round_to(self.lng, COORDINATE_PRECISION),
        }
    }
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    let rounded = (value * factor).round() / factor;
    // -0.0 y 0.0 deben producir la misma key
    if rounded == 0.0 { 0.0 } else { rounded }
}

/// A normalized congestion reading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrafficReading {
    /// Name of the provider that produced the reading.
    pub provider: String,
    /// Congestion percentage, 0 (free flow) to 100 (standstill).
    pub congestion: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_speed: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub free_flow_speed: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
}

impl TrafficReading {
    /// A reading with only a congestion value.
    pub fn new(provider: impl Into<String>, congestion: u8) -> Self {
        Self {
            provider: provider.into(),
            congestion: congestion.min(100),
            current_speed: None,
            free_flow_speed: None,
            confidence: None,
        }
    }
}

/// A source of traffic readings.
#[async_trait]
pub trait TrafficProvider: Send + Sync {
    /// Provider name, used in cache keys and results.
    fn name(&self) -> &str;

    /// Returns true if [`fetch`](Self::fetch) needs an API key.
    fn requires_credentials(&self) -> bool {
        true
    }

    /// Returns true if readings are made up locally rather than observed.
    /// Synthetic readings are never cached.
    fn is_synthetic(&self) -> bool {
        false
    }

    /// Fetches the reading at `point`.
    ///
    /// # Errors
    ///
    /// Returns an [`UpstreamError`] describing why no reading was produced.
    async fn fetch(
        &self,
        point: Coordinates,
        api_key: Option<&str>,
    ) -> Result<TrafficReading, UpstreamError>;
}

/// Builds the provider named by `UPSTREAM_PROVIDER`.
pub fn from_kind(kind: ProviderKind) -> Arc<dyn TrafficProvider> {
    match kind {
        ProviderKind::TomTom => Arc::new(HttpTrafficProvider::new()),
        ProviderKind::Mock => Arc::new(MockTrafficProvider::new()),
    }
}

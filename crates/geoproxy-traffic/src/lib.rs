//! # Geoproxy Traffic
//!
//! Congestion lookups that always answer.
//!
//! - [`ResilientCall`]: per-attempt deadline plus bounded retry around one
//!   upstream call
//! - [`TrafficProvider`]: the upstream, either [`HttpTrafficProvider`]
//!   (TomTom) or [`MockTrafficProvider`]
//! - [`DegradingFetchAdapter`]: cache first, then the provider through a
//!   [`ResilientCall`], then a synthesized reading that is never cached
//!
//! ## Example
//!
//! ```
//! use geoproxy_cache::CacheRegistry;
//! use geoproxy_core::Settings;
//! use geoproxy_traffic::DegradingFetchAdapter;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let settings = Settings::from_vars([("UPSTREAM_PROVIDER", "tomtom")]).unwrap();
//! let registry = CacheRegistry::builder(settings.clone()).build();
//! let adapter = DegradingFetchAdapter::from_settings(&settings, &registry).await;
//!
//! // Sin API key la respuesta es sintetica
//! let response = adapter.fetch_with_fallback(40.0, -73.0).await;
//! assert_eq!(response.provider, "mock-fallback");
//! assert!(response.is_fallback());
//! # }
//! ```

pub mod adapter;
pub mod credentials;
pub mod provider;
pub mod resilience;

// Re-exports
pub use adapter::{
    DegradingFetchAdapter, FALLBACK_PROVIDER, TRAFFIC_NAMESPACE, TrafficResponse,
    register_traffic_metrics,
};
pub use credentials::{CredentialSource, StaticCredentials};
pub use provider::{
    Coordinates, HttpTrafficProvider, MockTrafficProvider, TrafficProvider, TrafficReading,
};
pub use resilience::{ResilientCall, ResilientCallBuilder, TimeoutError};

//! # Geoproxy Core
//!
//! Shared building blocks for the Geoproxy caching and upstream-call layer.
//!
//! This crate holds the types every other Geoproxy crate agrees on:
//!
//! - [`CacheKey`]: deterministic cache keys derived from a namespace and a
//!   parameter set
//! - [`FallbackResult`] and [`Provenance`]: results tagged with where they
//!   came from (cache, upstream or synthesized fallback)
//! - [`Settings`]: environment-driven configuration
//! - The error taxonomy ([`BackendError`], [`UpstreamError`], [`SettingsError`])
//!
//! ## Example
//!
//! ```
//! use geoproxy_core::{CacheKey, FallbackResult, Provenance};
//! use serde_json::json;
//!
//! let key = CacheKey::derive("traffic", &json!({"lat": 40.0, "lng": -73.0})).unwrap();
//! assert_eq!(key.as_str().len(), CacheKey::DIGEST_LEN);
//!
//! let result = FallbackResult::fallback(12u8, "missing credentials");
//! assert_eq!(result.provenance(), Provenance::FromFallback);
//! ```

pub mod error;
pub mod keys;
pub mod result;
pub mod settings;
pub mod telemetry;

pub use error::{BackendError, SettingsError, UpstreamError};
pub use keys::CacheKey;
pub use result::{FallbackResult, Provenance};
pub use settings::{ProviderKind, Settings, StoreKind};

//! Provenance-tagged results.

use serde::{Deserialize, Serialize};

/// Where a result came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Provenance {
    /// Served from the cache without calling the upstream.
    FromCache,
    /// Fetched from the upstream provider (and cached).
    FromUpstream,
    /// Synthesized after the upstream failed. Never cached.
    FromFallback,
}

impl Provenance {
    /// Short label for logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FromCache => "cached",
            Self::FromUpstream => "fetched",
            Self::FromFallback => "fallback",
        }
    }
}

/// A value tagged with its [`Provenance`] and, for fallbacks, the failure
/// that caused it.
#[derive(Debug, Clone, PartialEq)]
pub struct FallbackResult<T> {
    value: T,
    provenance: Provenance,
    error: Option<String>,
}

impl<T> FallbackResult<T> {
    /// A value served from the cache.
    pub fn cached(value: T) -> Self {
        Self {
            value,
            provenance: Provenance::FromCache,
            error: None,
        }
    }

    /// A value fetched from the upstream.
    pub fn fetched(value: T) -> Self {
        Self {
            value,
            provenance: Provenance::FromUpstream,
            error: None,
        }
    }

    /// A synthesized value standing in for a failed upstream call.
    pub fn fallback(value: T, reason: impl Into<String>) -> Self {
        Self {
            value,
            provenance: Provenance::FromFallback,
            error: Some(reason.into()),
        }
    }

    /// Returns the wrapped value.
    pub fn value(&self) -> &T {
        &self.value
    }

    /// Returns where the value came from.
    pub fn provenance(&self) -> Provenance {
        self.provenance
    }

    /// Returns the failure reason, if this is a fallback.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Returns true if this value was synthesized.
    pub fn is_fallback(&self) -> bool {
        self.provenance == Provenance::FromFallback
    }

    /// Returns true if this value may be written to the cache.
    pub fn is_cacheable(&self) -> bool {
        self.provenance == Provenance::FromUpstream
    }

    /// Consumes the result and returns the wrapped value.
    pub fn into_inner(self) -> T {
        self.value
    }

    /// Maps the wrapped value, keeping provenance and error.
    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> FallbackResult<U> {
        FallbackResult {
            value: f(self.value),
            provenance: self.provenance,
            error: self.error,
        }
    }
}

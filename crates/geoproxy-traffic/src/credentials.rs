//! Upstream credential lookup.

use std::collections::HashMap;

use async_trait::async_trait;
use geoproxy_core::Settings;

/// Resolves the API key for an upstream provider.
///
/// Lookups may hit a secret store, so they are async. `None` means no key
/// is configured, which the fetch adapter turns into a fallback.
#[async_trait]
pub trait CredentialSource: Send + Sync {
    async fn api_key(&self, provider: &str) -> Option<String>;
}

/// Keys known at startup, per provider name.
#[derive(Debug, Clone, Default)]
pub struct StaticCredentials {
    keys: HashMap<String, String>,
}

impl StaticCredentials {
    /// A source with no keys at all.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Registers `key` for `provider`. Blank keys are ignored.
    pub fn with_key(mut self, provider: impl Into<String>, key: impl Into<String>) -> Self {
        let key = key.into();
        if !key.trim().is_empty() {
            self.keys.insert(provider.into(), key);
        }
        self
    }

    /// Uses `UPSTREAM_API_KEY` as the key of the configured provider.
    pub fn from_settings(settings: &Settings) -> Self {
        match settings.upstream_api_key() {
            Some(key) => Self::empty().with_key(settings.upstream_provider().as_str(), key),
            None => Self::empty(),
        }
    }
}

#[async_trait]
impl CredentialSource for StaticCredentials {
    async fn api_key(&self, provider: &str) -> Option<String> {
        self.keys.get(provider).cloned()
    }
}

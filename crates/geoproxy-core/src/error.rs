//! Error types shared across Geoproxy crates.
//!
//! None of these errors are meant to reach an end user. Backend errors are
//! absorbed by the cache layer and upstream errors by the fetch adapter; they
//! exist so both layers can log and classify what went wrong.

/// Errors raised while loading [`Settings`](crate::Settings).
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    /// The configuration source could not be read or deserialized.
    #[error("failed to load settings: {0}")]
    Load(#[from] config::ConfigError),

    /// A setting has a value outside its accepted range.
    #[error("invalid setting {key}: {reason}")]
    Invalid { key: String, reason: String },
}

impl SettingsError {
    /// Creates a new invalid-setting error.
    pub fn invalid(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key: key.into(),
            reason: reason.into(),
        }
    }
}

/// Errors produced by a distributed cache backend.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    /// The backend could not be constructed (missing client, failed handshake).
    #[error("backend unavailable: {reason}")]
    Unavailable { reason: String },

    /// A single read or write against the backend failed.
    #[error("backend I/O error: {0}")]
    Io(String),

    /// A stored payload could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl BackendError {
    /// Creates a new backend unavailable error.
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::Unavailable {
            reason: reason.into(),
        }
    }

    /// Creates a new backend I/O error.
    pub fn io(msg: impl Into<String>) -> Self {
        Self::Io(msg.into())
    }

    /// Returns true if the backend could not be constructed at all.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Unavailable { .. })
    }
}

/// Errors produced while calling an upstream data provider.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UpstreamError {
    /// No credentials could be resolved for the provider.
    #[error("missing credentials for provider {provider}")]
    MissingCredentials { provider: String },

    /// The call did not complete before its deadline.
    #[error("upstream timed out after {millis}ms")]
    Timeout { millis: u64 },

    /// The provider answered with a non-success status.
    #[error("upstream returned HTTP {status}")]
    Http { status: u16 },

    /// The request never produced a response (DNS, connect, TLS, ...).
    #[error("upstream transport error: {0}")]
    Transport(String),

    /// The response body did not have the expected shape.
    #[error("failed to parse upstream payload: {0}")]
    Parse(String),
}

impl UpstreamError {
    /// Creates a new missing-credentials error.
    pub fn missing_credentials(provider: impl Into<String>) -> Self {
        Self::MissingCredentials {
            provider: provider.into(),
        }
    }

    /// Creates a new transport error.
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    /// Creates a new parse error.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse(msg.into())
    }

    /// Short, stable label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MissingCredentials { .. } => "missing_credentials",
            Self::Timeout { .. } => "timeout",
            Self::Http { .. } => "http",
            Self::Transport(_) => "transport",
            Self::Parse(_) => "parse",
        }
    }

    /// Returns true if retrying the same call might succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Timeout { .. } | Self::Transport(_) => true,
            Self::Http { status } => *status == 429 || *status >= 500,
            Self::MissingCredentials { .. } | Self::Parse(_) => false,
        }
    }
}

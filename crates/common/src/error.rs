//! Unified error types for the beachcast workspace.

use std::fmt;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Beach not found: {0}")]
    BeachNotFound(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failure of a single upstream call, tagged with the provider it came
/// from. Providers fail independently; callers decide per call site
/// whether a failure degrades to a missing section or propagates.
#[derive(Debug, Clone, Error)]
#[error("{provider} provider error ({kind}): {message}")]
pub struct ProviderError {
    pub provider: &'static str,
    pub kind: ProviderErrorKind,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderErrorKind {
    /// Required API key is missing or empty.
    MissingCredentials,
    /// Transport-level failure (DNS, connect, TLS, read).
    Network,
    /// The upstream did not answer within the configured deadline.
    Timeout,
    /// Non-success HTTP status.
    Status(u16),
    /// Response arrived but could not be interpreted.
    BadPayload,
}

impl fmt::Display for ProviderErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingCredentials => write!(f, "missing credentials"),
            Self::Network => write!(f, "network"),
            Self::Timeout => write!(f, "timeout"),
            Self::Status(code) => write!(f, "status {}", code),
            Self::BadPayload => write!(f, "bad payload"),
        }
    }
}

impl ProviderError {
    pub fn new(
        provider: &'static str,
        kind: ProviderErrorKind,
        message: impl Into<String>,
    ) -> Self {
        Self {
            provider,
            kind,
            message: message.into(),
        }
    }

    pub fn missing_credentials(provider: &'static str) -> Self {
        Self::new(
            provider,
            ProviderErrorKind::MissingCredentials,
            "API key is not configured",
        )
    }

    pub fn bad_payload(provider: &'static str, message: impl Into<String>) -> Self {
        Self::new(provider, ProviderErrorKind::BadPayload, message)
    }

    pub fn status(provider: &'static str, code: u16, body: impl Into<String>) -> Self {
        Self::new(provider, ProviderErrorKind::Status(code), body)
    }
}

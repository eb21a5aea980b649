//! Provider error taxonomy

use thiserror::Error;

/// Errors returned by an edge provider binding
///
/// Variants are classified so callers can decide whether to retry:
/// see [`ProviderError::is_retryable`] and [`ProviderError::is_transient`].
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("provider configuration error: {0}")]
    Config(String),

    #[error("provider request timed out")]
    Timeout,

    #[error("provider rate limit exceeded")]
    RateLimited { retry_after_secs: Option<u64> },

    #[error("provider rejected credentials: {0}")]
    Unauthorized(String),

    #[error("zone not active yet: {0}")]
    ZoneNotActive(String),

    #[error("SSL already enabled for zone")]
    AlreadyEnabled,

    #[error("zone already exists: {0}")]
    ZoneAlreadyExists(String),

    #[error("resource not found: {0}")]
    NotFound(String),

    #[error("provider API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    #[error("failed to decode provider response: {0}")]
    Decode(String),

    #[error("transport error: {0}")]
    Transport(String),
}

impl ProviderError {
    /// Worth retrying the same request immediately with backoff
    pub fn is_transient(&self) -> bool {
        match self {
            ProviderError::Timeout
            | ProviderError::RateLimited { .. }
            | ProviderError::Transport(_) => true,
            ProviderError::Api { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Safe to re-attempt the same idempotent operation later
    pub fn is_retryable(&self) -> bool {
        self.is_transient() || matches!(self, ProviderError::ZoneNotActive(_))
    }

    /// Short machine-readable error code
    pub fn code(&self) -> &'static str {
        match self {
            ProviderError::Config(_) => "PROVIDER_CONFIG",
            ProviderError::Timeout => "PROVIDER_TIMEOUT",
            ProviderError::RateLimited { .. } => "PROVIDER_RATE_LIMITED",
            ProviderError::Unauthorized(_) => "PROVIDER_UNAUTHORIZED",
            ProviderError::ZoneNotActive(_) => "ZONE_NOT_ACTIVE",
            ProviderError::AlreadyEnabled => "SSL_ALREADY_ENABLED",
            ProviderError::ZoneAlreadyExists(_) => "ZONE_ALREADY_EXISTS",
            ProviderError::NotFound(_) => "PROVIDER_NOT_FOUND",
            ProviderError::Api { .. } => "PROVIDER_API_ERROR",
            ProviderError::Decode(_) => "PROVIDER_DECODE_ERROR",
            ProviderError::Transport(_) => "PROVIDER_UNREACHABLE",
        }
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ProviderError::Timeout
        } else if e.is_decode() {
            ProviderError::Decode(e.to_string())
        } else {
            ProviderError::Transport(e.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(ProviderError::Timeout.is_transient());
        assert!(ProviderError::RateLimited {
            retry_after_secs: None
        }
        .is_transient());
        assert!(ProviderError::Api {
            status: 502,
            message: "bad gateway".to_string()
        }
        .is_transient());
        assert!(!ProviderError::Api {
            status: 400,
            message: "bad request".to_string()
        }
        .is_transient());
        assert!(!ProviderError::Unauthorized("nope".to_string()).is_transient());
    }

    #[test]
    fn test_zone_not_active_is_retryable_but_not_transient() {
        let err = ProviderError::ZoneNotActive("zone-1".to_string());
        assert!(err.is_retryable());
        assert!(!err.is_transient());
    }

    #[test]
    fn test_terminal_errors() {
        assert!(!ProviderError::Unauthorized("bad token".to_string()).is_retryable());
        assert!(!ProviderError::Decode("missing result".to_string()).is_retryable());
        assert_eq!(
            ProviderError::Unauthorized("x".to_string()).code(),
            "PROVIDER_UNAUTHORIZED"
        );
    }
}

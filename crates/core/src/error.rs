//! Error types for the Pitwall domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error variant.

use thiserror::Error;

/// The top-level error type for Pitwall operations that cross crate boundaries.
#[derive(Debug, Error)]
pub enum Error {
    // --- Provider errors ---
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

/// Failure of a single text-generation call.
///
/// Every variant except [`ProviderError::NotConfigured`] is a transport-level
/// failure: the call can be answered with a deterministic fallback reply.
/// `NotConfigured` means the backend can never succeed as configured.
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Invalid response from provider: {0}")]
    InvalidResponse(String),

    #[error("Local inference failed: {0}")]
    Inference(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),
}

impl ProviderError {
    /// Misconfiguration rather than a transient failure. Never retryable.
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::NotConfigured(_))
    }

    /// Timeout, connection failure, non-2xx status or unusable body.
    pub fn is_transport(&self) -> bool {
        !self.is_configuration()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_error_displays_correctly() {
        let err = Error::Provider(ProviderError::ApiError {
            status_code: 503,
            message: "Service unavailable".into(),
        });
        assert!(err.to_string().contains("503"));
        assert!(err.to_string().contains("Service unavailable"));
    }

    #[test]
    fn only_not_configured_is_a_configuration_error() {
        assert!(ProviderError::NotConfigured("no api key".into()).is_configuration());
        assert!(ProviderError::Timeout("30s".into()).is_transport());
        assert!(ProviderError::Network("refused".into()).is_transport());
        assert!(
            ProviderError::AuthenticationFailed("401".into()).is_transport(),
            "non-2xx responses are transport failures"
        );
    }
}

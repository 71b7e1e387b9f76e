//! HTTP plumbing shared by the remote backends.

use pitwall_config::Credentials;
use pitwall_core::ProviderError;
use std::time::Duration;
use tracing::warn;

/// Build a client whose requests give up after `timeout`.
///
/// If the TLS backend cannot be initialized the default client is used; the
/// router's own timeout still bounds every call.
pub(crate) fn client(timeout: Duration) -> reqwest::Client {
    match reqwest::Client::builder().timeout(timeout).build() {
        Ok(client) => client,
        Err(e) => {
            warn!(
                error = %e,
                timeout_secs = timeout.as_secs_f64(),
                "HTTP client builder failed, falling back to the default client"
            );
            reqwest::Client::new()
        }
    }
}

pub(crate) fn authorize(
    request: reqwest::RequestBuilder,
    credentials: &Credentials,
) -> reqwest::RequestBuilder {
    match credentials {
        Credentials::None => request,
        Credentials::Bearer(key) => request.bearer_auth(key),
        Credentials::Basic { username, password } => {
            request.basic_auth(username, password.as_deref())
        }
    }
}

/// Map a reqwest failure (send or body read) to a provider error.
pub(crate) fn transport_error(provider: &str, e: reqwest::Error) -> ProviderError {
    if e.is_timeout() {
        ProviderError::Timeout(format!("{provider}: {e}"))
    } else if e.is_decode() {
        ProviderError::InvalidResponse(format!("Failed to parse response: {e}"))
    } else {
        ProviderError::Network(e.to_string())
    }
}

/// Turn non-2xx responses into the matching error.
pub(crate) async fn check_status(
    provider: &str,
    response: reqwest::Response,
) -> Result<reqwest::Response, ProviderError> {
    let status = response.status().as_u16();

    if status == 429 {
        let retry_after_secs = response
            .headers()
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(5);
        return Err(ProviderError::RateLimited { retry_after_secs });
    }

    if status == 401 || status == 403 {
        return Err(ProviderError::AuthenticationFailed(
            "Invalid API key or insufficient permissions".into(),
        ));
    }

    if !(200..300).contains(&status) {
        let error_body = response.text().await.unwrap_or_default();
        warn!(provider, status, body = %error_body, "Provider returned error");
        return Err(ProviderError::ApiError {
            status_code: status,
            message: error_body,
        });
    }

    Ok(response)
}

//! Token-auth adapter.
//!
//! The transport authenticates with short-lived tokens minted by the
//! host's backend. This module adapts an arbitrary async token fetcher
//! into the answer the transport's auth callback expects, translating
//! HTTP failures into transport error envelopes. A 403 from the token
//! endpoint means the caller will never get a token for this series, so
//! the envelope carries the pairing that tells the transport to stop
//! retrying.

use async_trait::async_trait;
use podium_core::error::codes;
use podium_core::ErrorEnvelope;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Token material minted by the host's backend, opaque to Podium.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenRequest {
    /// The signed token or token request blob.
    pub token: String,
    /// Client id bound into the token, if any.
    #[serde(default)]
    pub client_id: Option<String>,
    /// Expiry as epoch milliseconds, if the backend reports one.
    #[serde(default)]
    pub expires: Option<u64>,
}

/// A token fetch failure.
#[derive(Debug, Clone, Error)]
#[error("token fetch failed: {message}")]
pub struct AuthError {
    /// HTTP status, when the failure was an HTTP response.
    pub status: Option<u16>,
    /// What happened.
    pub message: String,
}

impl AuthError {
    /// A failure carrying an HTTP status.
    #[must_use]
    pub fn http(status: u16, message: impl Into<String>) -> Self {
        Self {
            status: Some(status),
            message: message.into(),
        }
    }

    /// A failure with no HTTP response (network error, bad payload).
    #[must_use]
    pub fn other(message: impl Into<String>) -> Self {
        Self {
            status: None,
            message: message.into(),
        }
    }
}

/// Mints tokens for the transport's auth handshake.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// Fetch a fresh token.
    async fn fetch(&self) -> Result<TokenRequest, AuthError>;
}

/// Run one auth-callback round: fetch a token, or translate the failure
/// into the envelope the transport acts on.
///
/// # Errors
///
/// Returns a token-callback envelope (code 40170). Its status is 403
/// when the token endpoint said forbidden — the stop-retrying signal —
/// and the fetch failure's own status (or 500) otherwise.
pub async fn request_token(provider: &dyn TokenProvider) -> Result<TokenRequest, ErrorEnvelope> {
    match provider.fetch().await {
        Ok(token) => Ok(token),
        Err(err) => {
            let status = err.status.unwrap_or(500);
            debug!(status, "Token fetch failed");
            Err(ErrorEnvelope::new(
                codes::TOKEN_CALLBACK_FAILED,
                status,
                err.message,
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedProvider(Result<TokenRequest, AuthError>);

    #[async_trait]
    impl TokenProvider for FixedProvider {
        async fn fetch(&self) -> Result<TokenRequest, AuthError> {
            self.0.clone()
        }
    }

    #[tokio::test]
    async fn test_token_passes_through() {
        let provider = FixedProvider(Ok(TokenRequest {
            token: "tok_abc".to_string(),
            client_id: Some("user_1".to_string()),
            expires: None,
        }));

        let token = request_token(&provider).await.unwrap();
        assert_eq!(token.token, "tok_abc");
    }

    #[tokio::test]
    async fn test_forbidden_fetch_maps_to_stop_retrying() {
        let provider = FixedProvider(Err(AuthError::http(403, "series not accessible")));

        let envelope = request_token(&provider).await.unwrap_err();
        assert_eq!(envelope.code, codes::TOKEN_CALLBACK_FAILED);
        assert_eq!(envelope.status_code, 403);
    }

    #[tokio::test]
    async fn test_other_failures_keep_their_status() {
        let provider = FixedProvider(Err(AuthError::http(502, "backend unavailable")));
        let envelope = request_token(&provider).await.unwrap_err();
        assert_eq!(envelope.status_code, 502);

        let provider = FixedProvider(Err(AuthError::other("connection refused")));
        let envelope = request_token(&provider).await.unwrap_err();
        assert_eq!(envelope.status_code, 500);
    }
}

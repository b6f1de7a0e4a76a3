//! Google OAuth access tokens.
//!
//! Either a static bearer token from the environment, or a refresh-token
//! grant whose result is cached in memory until shortly before it expires.

use std::time::{Duration, Instant};

use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::core::config::GoogleCredentials;
use crate::domains::tools::HandlerError;

pub const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

/// Refresh this long before Google's stated expiry.
const EXPIRY_MARGIN: Duration = Duration::from_secs(60);

/// Lifetime assumed when the token endpoint omits `expires_in`.
const DEFAULT_LIFETIME_SECS: u64 = 3600;

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: Option<u64>,
}

struct CachedToken {
    value: String,
    refresh_at: Instant,
}

/// Supplies bearer tokens for Google REST calls.
pub struct GoogleAuth {
    credentials: GoogleCredentials,
    http: reqwest::Client,
    token_url: String,
    cached: Mutex<Option<CachedToken>>,
}

impl GoogleAuth {
    pub fn new(credentials: GoogleCredentials, http: reqwest::Client) -> Self {
        Self {
            credentials,
            http,
            token_url: TOKEN_URL.to_string(),
            cached: Mutex::new(None),
        }
    }

    /// Override the token endpoint.
    pub fn with_token_url(mut self, url: impl Into<String>) -> Self {
        self.token_url = url.into();
        self
    }

    pub fn is_configured(&self) -> bool {
        self.credentials.is_configured()
    }

    /// A valid access token, refreshing it when needed.
    pub async fn access_token(&self) -> Result<String, HandlerError> {
        if let Some(token) = self.credentials.access_token.as_deref().filter(|t| !t.is_empty()) {
            return Ok(token.to_string());
        }

        let (Some(client_id), Some(client_secret), Some(refresh_token)) = (
            self.credentials.client_id.as_deref(),
            self.credentials.client_secret.as_deref(),
            self.credentials.refresh_token.as_deref(),
        ) else {
            return Err(HandlerError::not_configured("Google OAuth"));
        };

        // Held across the refresh so concurrent callers share one grant.
        let mut cached = self.cached.lock().await;
        if let Some(token) = cached.as_ref().filter(|t| Instant::now() < t.refresh_at) {
            return Ok(token.value.clone());
        }

        debug!("Refreshing Google access token");
        let response = self
            .http
            .post(&self.token_url)
            .form(&[
                ("grant_type", "refresh_token"),
                ("client_id", client_id),
                ("client_secret", client_secret),
                ("refresh_token", refresh_token),
            ])
            .send()
            .await
            .map_err(|e| HandlerError::external("Google token refresh", e.without_url()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(HandlerError::external(
                "Google token refresh",
                format!("HTTP {status}: {}", super::api_error_message(&body)),
            ));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| HandlerError::external("Google token refresh", format!("invalid response: {}", e.without_url())))?;

        let lifetime = Duration::from_secs(token.expires_in.unwrap_or(DEFAULT_LIFETIME_SECS));
        info!("Google access token refreshed (valid for {}s)", lifetime.as_secs());
        *cached = Some(CachedToken {
            value: token.access_token.clone(),
            refresh_at: Instant::now() + lifetime.saturating_sub(EXPIRY_MARGIN),
        });
        Ok(token.access_token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_token_wins() {
        let auth = GoogleAuth::new(
            GoogleCredentials {
                access_token: Some("ya29.static".into()),
                ..Default::default()
            },
            reqwest::Client::new(),
        );
        assert!(auth.is_configured());
        assert_eq!(auth.access_token().await.unwrap(), "ya29.static");
    }

    #[tokio::test]
    async fn test_missing_credentials_not_configured() {
        let auth = GoogleAuth::new(
            GoogleCredentials {
                client_id: Some("id".into()),
                ..Default::default()
            },
            reqwest::Client::new(),
        );
        assert!(!auth.is_configured());
        let err = auth.access_token().await.unwrap_err();
        assert_eq!(err.to_string(), "Google OAuth is not configured");
    }

    #[tokio::test]
    async fn test_cached_token_reused() {
        let auth = GoogleAuth::new(
            GoogleCredentials {
                client_id: Some("id".into()),
                client_secret: Some("secret".into()),
                refresh_token: Some("refresh".into()),
                ..Default::default()
            },
            reqwest::Client::new(),
        )
        .with_token_url("http://127.0.0.1:9/unreachable");

        *auth.cached.lock().await = Some(CachedToken {
            value: "cached".into(),
            refresh_at: Instant::now() + Duration::from_secs(600),
        });
        assert_eq!(auth.access_token().await.unwrap(), "cached");
    }
}

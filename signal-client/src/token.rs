//! Call credentials from the relay's `/token` endpoint.
//!
//! The relay hands out short-lived credentials for the external video
//! service. The token is opaque to this crate; the caller passes it to
//! the video SDK together with the group id from `initiate_call`.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Token fetch errors.
#[derive(Debug, Error)]
pub enum TokenError {
    /// Network or decoding failure.
    #[error("token request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// Relay answered with a non-success status.
    #[error("token endpoint returned {status}: {message}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Error text from the response body, if any.
        message: String,
    },
}

/// Credentials for joining a video call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallCredentials {
    /// Access token for the video service.
    pub token: String,
    /// Identity the token was issued to.
    #[serde(rename = "userId")]
    pub user_id: String,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

/// HTTP client for the relay's token endpoint.
#[derive(Debug, Clone)]
pub struct TokenClient {
    base_url: String,
    http: reqwest::Client,
}

impl TokenClient {
    /// Create a client for the relay at `base_url` (e.g. `http://localhost:8080`).
    pub fn new(base_url: &str) -> Result<Self, TokenError> {
        Self::with_timeout(base_url, Duration::from_secs(10))
    }

    /// Create a client with a custom request timeout.
    pub fn with_timeout(base_url: &str, timeout: Duration) -> Result<Self, TokenError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
        })
    }

    /// Full URL of the token endpoint.
    pub fn endpoint(&self) -> String {
        format!("{}/token", self.base_url)
    }

    /// Fetch fresh call credentials.
    pub async fn fetch(&self) -> Result<CallCredentials, TokenError> {
        let response = self.http.get(self.endpoint()).send().await?;
        let status = response.status();

        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorBody>(&text)
                .map(|b| b.error)
                .unwrap_or(text);
            return Err(TokenError::Status {
                status: status.as_u16(),
                message,
            });
        }

        let creds = response.json::<CallCredentials>().await?;
        tracing::debug!("Fetched call credentials for {}", creds.user_id);
        Ok(creds)
    }
}

//! Token passthrough for the external video-call identity service.
//!
//! `GET /token` forwards to the configured endpoint and returns its JSON
//! (`{userId, token}`) verbatim. Any failure, including a missing endpoint,
//! answers 500 with `{error}`. Routing is never affected.

use crate::error::TokenError;
use crate::server::SignalRelay;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

/// Token handler.
pub async fn token_handler(Extension(relay): Extension<Arc<SignalRelay>>) -> Response {
    match fetch_token(&relay).await {
        Ok(body) => Json(body).into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Token request failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "Failed to get token" })),
            )
                .into_response()
        }
    }
}

async fn fetch_token(relay: &SignalRelay) -> Result<Value, TokenError> {
    let config = &relay.config().token;
    let endpoint = config
        .endpoint
        .as_deref()
        .ok_or(TokenError::NotConfigured)?;

    let response = relay
        .http_client()
        .get(endpoint)
        .timeout(Duration::from_secs(config.timeout_secs))
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        return Err(TokenError::Status(status.as_u16()));
    }

    Ok(response.json::<Value>().await?)
}

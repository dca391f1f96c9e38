//! Health check endpoint.

use crate::server::SignalRelay;
use axum::{Extension, Json};
use serde::Serialize;
use std::sync::Arc;

/// Health status response.
#[derive(Debug, Clone, Serialize)]
pub struct HealthStatus {
    /// Overall status.
    pub status: String,
    /// Server version.
    pub version: String,
    /// Number of open WebSocket connections.
    pub connections: usize,
    /// Number of live registrations.
    pub registrations: usize,
    /// Uptime in seconds.
    pub uptime_seconds: u64,
}

/// Health check handler.
pub async fn health_handler(Extension(relay): Extension<Arc<SignalRelay>>) -> Json<HealthStatus> {
    Json(HealthStatus {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        connections: relay.active_connections(),
        registrations: relay.registry().len(),
        uptime_seconds: relay.uptime().as_secs(),
    })
}

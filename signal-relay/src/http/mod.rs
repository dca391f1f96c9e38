//! HTTP endpoints for signal-relay.
//!
//! Serves the WebSocket upgrade plus health, metrics and the token
//! passthrough on a single listener.

pub mod health;
mod metrics;
pub mod token;
pub mod ws;

use crate::server::SignalRelay;
use axum::{routing::get, Extension, Router};
use std::sync::Arc;

pub use health::HealthStatus;

/// Build the HTTP router with all endpoints.
///
/// The WebSocket is accepted on both `/ws` and `/`; browser clients of the
/// earlier relay dial the bare host.
pub fn build_router(relay: Arc<SignalRelay>) -> Router {
    let mut router = Router::new()
        .route("/", get(ws::ws_upgrade))
        .route("/ws", get(ws::ws_upgrade))
        .route("/health", get(health::health_handler))
        .route("/token", get(token::token_handler));

    if relay.config().http.metrics_enabled {
        router = router.route("/metrics", get(metrics::metrics_handler));
    }

    router.layer(Extension(relay))
}

//! WebSocket upgrade endpoint.

use crate::server::SignalRelay;
use crate::session;
use axum::extract::ws::WebSocketUpgrade;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Extension;
use std::sync::Arc;

/// GET /ws (and GET /)
///
/// Refuses with 503 when `limits.max_connections` are already open.
/// Otherwise upgrades with the configured frame cap and spawns the
/// connection actor.
pub async fn ws_upgrade(
    Extension(relay): Extension<Arc<SignalRelay>>,
    ws: WebSocketUpgrade,
) -> Response {
    let Some(permit) = relay.try_acquire_connection() else {
        tracing::warn!(
            max = relay.config().limits.max_connections,
            "Connection limit reached, refusing upgrade"
        );
        return (StatusCode::SERVICE_UNAVAILABLE, "too many connections").into_response();
    };

    let max_size = relay.config().server.max_frame_size;
    ws.max_message_size(max_size)
        .max_frame_size(max_size)
        .on_failed_upgrade(|e| tracing::debug!(error = %e, "WebSocket upgrade failed"))
        .on_upgrade(move |socket| session::run_connection(relay, permit, socket))
}

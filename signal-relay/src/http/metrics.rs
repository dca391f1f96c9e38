//! Prometheus metrics endpoint.

use crate::server::SignalRelay;
use axum::{http::header::CONTENT_TYPE, response::IntoResponse, Extension};
use std::fmt::Write;
use std::sync::atomic::Ordering;
use std::sync::Arc;

/// Prometheus metrics handler.
///
/// Returns metrics in Prometheus text format.
/// Includes both gauges (current state) and counters (monotonic since startup).
pub async fn metrics_handler(Extension(relay): Extension<Arc<SignalRelay>>) -> impl IntoResponse {
    (
        [(CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
        render(&relay),
    )
}

fn render(relay: &SignalRelay) -> String {
    let m = relay.metrics();

    let gauges = [
        (
            "signal_relay_connections_active",
            "Number of open WebSocket connections",
            relay.active_connections() as u64,
        ),
        (
            "signal_relay_registrations_active",
            "Number of live participant registrations",
            relay.registry().len() as u64,
        ),
        (
            "signal_relay_rate_limiter_keys",
            "Keys tracked by the per-connection rate limiter",
            relay.rate_limits().message_keys_count() as u64,
        ),
    ];

    let counters = [
        ("signal_relay_connections_total", "Total connections accepted", &m.connections_total),
        (
            "signal_relay_connections_rejected_total",
            "Upgrades refused at the connection cap",
            &m.connections_rejected,
        ),
        ("signal_relay_registrations_total", "Total register frames accepted", &m.registrations_total),
        (
            "signal_relay_registrations_superseded_total",
            "Registrations that displaced another connection",
            &m.registrations_superseded,
        ),
        ("signal_relay_forwarded_total", "Envelopes forwarded", &m.forwarded_total),
        (
            "signal_relay_dropped_unknown_recipient_total",
            "Envelopes dropped for an unregistered recipient",
            &m.dropped_unknown_recipient,
        ),
        (
            "signal_relay_dropped_unregistered_sender_total",
            "Envelopes dropped from a sender without a current registration",
            &m.dropped_unregistered,
        ),
        ("signal_relay_malformed_total", "Frames that failed to parse", &m.malformed_total),
        ("signal_relay_rate_limit_hits_total", "Frames dropped by the rate limit", &m.rate_limit_hits),
        (
            "signal_relay_send_failures_total",
            "Envelopes whose recipient was closing",
            &m.send_failures,
        ),
    ];

    let mut body = String::new();
    let _ = writeln!(body, "# HELP signal_relay_info Server information");
    let _ = writeln!(body, "# TYPE signal_relay_info gauge");
    let _ = writeln!(
        body,
        "signal_relay_info{{version=\"{}\"}} 1",
        env!("CARGO_PKG_VERSION")
    );

    for (name, help, value) in gauges {
        let _ = write!(body, "\n# HELP {name} {help}\n# TYPE {name} gauge\n{name} {value}\n");
    }
    for (name, help, counter) in counters {
        let value = counter.load(Ordering::Relaxed);
        let _ = write!(body, "\n# HELP {name} {help}\n# TYPE {name} counter\n{name} {value}\n");
    }
    body
}

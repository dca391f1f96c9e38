//! Main SignalRelay server coordination.
//!
//! SignalRelay owns the registration table, rate limiters and metrics, and
//! implements the three relay operations: register, route and unregister on
//! disconnect. There are no globals; every relay instance is independent.

use crate::config::Config;
use crate::error::{ProtocolError, ProtocolResult};
use crate::limits::RateLimits;
use crate::registry::{ConnectionId, OutboundSender, RouteOutcome, Registry};
use signal_types::{Forwarded, ParticipantName, RawPayload};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Operational metrics for monitoring relay activity.
///
/// All counters are monotonically increasing (reset only on restart).
/// Thread-safe via `AtomicU64`, no locks needed for incrementing.
#[derive(Debug, Default)]
pub struct RelayMetrics {
    /// Total WebSocket connections accepted.
    pub connections_total: AtomicU64,
    /// Upgrades refused because the connection cap was reached.
    pub connections_rejected: AtomicU64,
    /// Total register frames accepted.
    pub registrations_total: AtomicU64,
    /// Registrations that displaced another live connection.
    pub registrations_superseded: AtomicU64,
    /// Envelopes queued on a recipient connection.
    pub forwarded_total: AtomicU64,
    /// Envelopes dropped because the recipient was not registered.
    pub dropped_unknown_recipient: AtomicU64,
    /// Envelopes dropped because the sender held no (current) registration.
    pub dropped_unregistered: AtomicU64,
    /// Frames that failed to parse or validate.
    pub malformed_total: AtomicU64,
    /// Frames dropped by the per-connection rate limit.
    pub rate_limit_hits: AtomicU64,
    /// Envelopes whose recipient connection was already tearing down.
    pub send_failures: AtomicU64,
}

impl RelayMetrics {
    fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// Slot in the connection cap, held for the lifetime of one connection.
///
/// Dropping the permit frees the slot.
#[derive(Debug)]
pub struct ConnectionPermit {
    id: ConnectionId,
    active: Arc<AtomicUsize>,
}

impl ConnectionPermit {
    /// Identity assigned to this connection.
    pub fn id(&self) -> ConnectionId {
        self.id
    }
}

impl Drop for ConnectionPermit {
    fn drop(&mut self) {
        self.active.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Main relay server.
pub struct SignalRelay {
    config: Config,
    registry: Registry,
    /// Per-connection rate limiter.
    rate_limits: RateLimits,
    /// Operational metrics (counters).
    metrics: RelayMetrics,
    /// Currently open connections.
    active: Arc<AtomicUsize>,
    next_connection_id: AtomicU64,
    started_at: Instant,
    /// Outbound HTTP client for the token passthrough.
    http: reqwest::Client,
}

impl std::fmt::Debug for SignalRelay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignalRelay")
            .field("config", &self.config)
            .field("rate_limits", &self.rate_limits)
            .field("metrics", &self.metrics)
            .field("registrations", &self.registry.len())
            .field("active_connections", &self.active_connections())
            .finish_non_exhaustive()
    }
}

impl SignalRelay {
    /// Create a new SignalRelay with the given config.
    pub fn new(config: Config) -> Self {
        let rate_limits = RateLimits::new(&config.limits);
        Self {
            config,
            registry: Registry::new(),
            rate_limits,
            metrics: RelayMetrics::default(),
            active: Arc::new(AtomicUsize::new(0)),
            next_connection_id: AtomicU64::new(1),
            started_at: Instant::now(),
            http: reqwest::Client::new(),
        }
    }

    /// Get the relay configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Get the registration table.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Get access to the rate limiters.
    pub fn rate_limits(&self) -> &RateLimits {
        &self.rate_limits
    }

    /// Get access to the operational metrics.
    pub fn metrics(&self) -> &RelayMetrics {
        &self.metrics
    }

    /// HTTP client for outbound requests.
    pub fn http_client(&self) -> &reqwest::Client {
        &self.http
    }

    /// Time since this relay was created.
    pub fn uptime(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Number of open connections.
    pub fn active_connections(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    /// Take a connection slot, or `None` if `limits.max_connections` are open.
    pub fn try_acquire_connection(&self) -> Option<ConnectionPermit> {
        let max = self.config.limits.max_connections;
        let acquired = self
            .active
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| {
                (n < max).then_some(n + 1)
            })
            .is_ok();

        if !acquired {
            RelayMetrics::incr(&self.metrics.connections_rejected);
            return None;
        }

        RelayMetrics::incr(&self.metrics.connections_total);
        let id = ConnectionId::new(self.next_connection_id.fetch_add(1, Ordering::Relaxed));
        Some(ConnectionPermit {
            id,
            active: self.active.clone(),
        })
    }

    /// Bind `name` to `conn`. Any earlier holder of the name is superseded
    /// without notice.
    pub fn register(
        &self,
        conn: ConnectionId,
        name: &ParticipantName,
        sender: OutboundSender,
    ) -> ProtocolResult<()> {
        name.check_len(self.config.limits.max_name_len)?;

        let displaced = self.registry.register(name.clone(), conn, sender);
        RelayMetrics::incr(&self.metrics.registrations_total);

        match displaced {
            Some(previous) => {
                RelayMetrics::incr(&self.metrics.registrations_superseded);
                tracing::info!(
                    conn = %conn,
                    name = %name,
                    superseded = %previous,
                    "Registration superseded earlier connection"
                );
            }
            None => tracing::info!(conn = %conn, name = %name, "Registered"),
        }
        Ok(())
    }

    /// Forward `{kind, from, payload}` to `to`.
    ///
    /// `from` is the sender's registered name, never a client claim. The
    /// outcome is for logging and metrics only; the sender is never told.
    ///
    /// The route takes effect at the ownership check. A register of `from`
    /// by another connection that completes after the check is ordered
    /// after this frame, so the frame may still be delivered; once that
    /// register has returned, every later frame from `conn` is refused.
    /// The two lookups are not done under one guard: holding the sender's
    /// shard while taking the recipient's can deadlock when both names hash
    /// to the same shard.
    pub fn route(
        &self,
        conn: ConnectionId,
        from: &ParticipantName,
        kind: &str,
        to: &ParticipantName,
        payload: RawPayload,
    ) -> ProtocolResult<RouteOutcome> {
        if !self.registry.is_current(from.as_str(), conn) {
            return Err(ProtocolError::Superseded {
                name: from.to_string(),
            });
        }

        let frame = Forwarded::new(kind, from.clone(), payload).to_json()?;
        let outcome = self.registry.route(to.as_str(), frame);

        match outcome {
            RouteOutcome::Delivered => {
                RelayMetrics::incr(&self.metrics.forwarded_total);
                tracing::debug!(conn = %conn, from = %from, to = %to, kind, "Forwarded");
            }
            RouteOutcome::UnknownRecipient => {
                RelayMetrics::incr(&self.metrics.dropped_unknown_recipient);
                tracing::debug!(
                    conn = %conn,
                    from = %from,
                    to = %to,
                    kind,
                    "Dropped: recipient not registered"
                );
            }
            RouteOutcome::SendFailed => {
                RelayMetrics::incr(&self.metrics.send_failures);
                tracing::warn!(
                    conn = %conn,
                    from = %from,
                    to = %to,
                    kind,
                    "Dropped: recipient connection closing"
                );
            }
        }
        Ok(outcome)
    }

    /// Remove `name` if it still belongs to `conn`.
    ///
    /// Called when `conn` closes or moves to another name.
    pub fn unregister(&self, conn: ConnectionId, name: &ParticipantName) -> bool {
        let removed = self.registry.unregister(name.as_str(), conn);
        if removed {
            tracing::info!(conn = %conn, name = %name, "Unregistered");
        } else {
            tracing::debug!(
                conn = %conn,
                name = %name,
                "Name already held by another connection, left in place"
            );
        }
        removed
    }

    /// Count and log a frame the relay refused to act on.
    pub fn record_rejected(&self, conn: ConnectionId, error: &ProtocolError) {
        match error {
            ProtocolError::Malformed(_) | ProtocolError::Binary { .. } => {
                RelayMetrics::incr(&self.metrics.malformed_total);
                tracing::warn!(conn = %conn, error = %error, "Dropped malformed frame");
            }
            ProtocolError::NotRegistered | ProtocolError::Superseded { .. } => {
                RelayMetrics::incr(&self.metrics.dropped_unregistered);
                tracing::debug!(conn = %conn, error = %error, "Dropped frame from unregistered sender");
            }
            ProtocolError::RateLimited { .. } => {
                RelayMetrics::incr(&self.metrics.rate_limit_hits);
                tracing::warn!(conn = %conn, error = %error, "Dropped rate-limited frame");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::ws::Message;
    use serde_json::value::RawValue;
    use serde_json::{json, Value};
    use tokio::sync::mpsc;

    fn name(s: &str) -> ParticipantName {
        ParticipantName::new(s).unwrap()
    }

    fn raw(text: &str) -> RawPayload {
        Some(RawValue::from_string(text.to_string()).unwrap())
    }

    fn relay_with(config: Config) -> SignalRelay {
        SignalRelay::new(config)
    }

    fn relay() -> SignalRelay {
        relay_with(Config::default())
    }

    fn recv_text(rx: &mut mpsc::UnboundedReceiver<Message>) -> Value {
        match rx.try_recv().unwrap() {
            Message::Text(t) => serde_json::from_str(&t).unwrap(),
            other => panic!("expected text, got {other:?}"),
        }
    }

    #[test]
    fn route_asserts_registered_sender() {
        let relay = relay();
        let (agent_tx, _agent_rx) = mpsc::unbounded_channel();
        let (cust_tx, mut cust_rx) = mpsc::unbounded_channel();
        let agent_conn = ConnectionId::new(1);
        relay.register(agent_conn, &name("agent1"), agent_tx).unwrap();
        relay
            .register(ConnectionId::new(2), &name("customer1"), cust_tx)
            .unwrap();

        let outcome = relay
            .route(
                agent_conn,
                &name("agent1"),
                "question",
                &name("customer1"),
                raw(r#"{"question":"Q1"}"#),
            )
            .unwrap();

        assert_eq!(outcome, RouteOutcome::Delivered);
        assert_eq!(
            recv_text(&mut cust_rx),
            json!({"type": "question", "from": "agent1", "payload": {"question": "Q1"}})
        );
        assert_eq!(relay.metrics().forwarded_total.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn route_from_superseded_sender_is_rejected() {
        let relay = relay();
        let (tx1, _rx1) = mpsc::unbounded_channel();
        let (tx2, _rx2) = mpsc::unbounded_channel();
        relay.register(ConnectionId::new(1), &name("a"), tx1).unwrap();
        relay.register(ConnectionId::new(2), &name("a"), tx2).unwrap();

        let result = relay.route(ConnectionId::new(1), &name("a"), "x", &name("a"), None);
        assert!(matches!(result, Err(ProtocolError::Superseded { .. })));
        assert_eq!(
            relay.metrics().registrations_superseded.load(Ordering::Relaxed),
            1
        );
    }

    #[test]
    fn supersede_orders_after_earlier_frames() {
        let relay = relay();
        let (old_tx, _old_rx) = mpsc::unbounded_channel();
        let (new_tx, _new_rx) = mpsc::unbounded_channel();
        let (dest_tx, mut dest_rx) = mpsc::unbounded_channel();
        let old = ConnectionId::new(1);
        relay.register(old, &name("c"), old_tx).unwrap();
        relay.register(ConnectionId::new(3), &name("d"), dest_tx).unwrap();

        let before = relay.route(old, &name("c"), "x", &name("d"), raw("1")).unwrap();
        assert_eq!(before, RouteOutcome::Delivered);

        relay.register(ConnectionId::new(2), &name("c"), new_tx).unwrap();
        let after = relay.route(old, &name("c"), "x", &name("d"), raw("2"));
        assert!(matches!(after, Err(ProtocolError::Superseded { .. })));

        assert_eq!(recv_text(&mut dest_rx)["payload"], 1);
        assert!(dest_rx.try_recv().is_err());
    }

    #[test]
    fn route_passes_payload_text_unchanged() {
        let relay = relay();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let conn = ConnectionId::new(1);
        relay.register(conn, &name("a"), tx).unwrap();

        relay
            .route(conn, &name("a"), "x", &name("a"), raw(r#"{"z":1,"a":1.50}"#))
            .unwrap();
        relay.route(conn, &name("a"), "y", &name("a"), raw("null")).unwrap();

        let text = |msg| match msg {
            Message::Text(t) => t,
            other => panic!("expected text, got {other:?}"),
        };
        assert_eq!(
            text(rx.try_recv().unwrap()),
            r#"{"type":"x","from":"a","payload":{"z":1,"a":1.50}}"#
        );
        assert_eq!(
            text(rx.try_recv().unwrap()),
            r#"{"type":"y","from":"a","payload":null}"#
        );
    }

    #[test]
    fn route_to_unknown_recipient_counts_drop() {
        let relay = relay();
        let (tx, _rx) = mpsc::unbounded_channel();
        relay.register(ConnectionId::new(1), &name("a"), tx).unwrap();

        let outcome = relay
            .route(ConnectionId::new(1), &name("a"), "x", &name("ghost"), raw("{}"))
            .unwrap();
        assert_eq!(outcome, RouteOutcome::UnknownRecipient);
        assert_eq!(
            relay.metrics().dropped_unknown_recipient.load(Ordering::Relaxed),
            1
        );
    }

    #[test]
    fn register_rejects_long_name() {
        let mut config = Config::default();
        config.limits.max_name_len = 4;
        let relay = relay_with(config);
        let (tx, _rx) = mpsc::unbounded_channel();

        let result = relay.register(ConnectionId::new(1), &name("customer1"), tx);
        assert!(matches!(result, Err(ProtocolError::Malformed(_))));
        assert!(relay.registry().is_empty());
    }

    #[test]
    fn unregister_matches_connection() {
        let relay = relay();
        let (tx1, _rx1) = mpsc::unbounded_channel();
        let (tx2, _rx2) = mpsc::unbounded_channel();
        relay.register(ConnectionId::new(1), &name("c"), tx1).unwrap();
        relay.register(ConnectionId::new(2), &name("c"), tx2).unwrap();

        assert!(!relay.unregister(ConnectionId::new(1), &name("c")));
        assert!(relay.unregister(ConnectionId::new(2), &name("c")));
        assert!(relay.registry().is_empty());
    }

    #[test]
    fn connection_cap_is_enforced_and_released() {
        let mut config = Config::default();
        config.limits.max_connections = 2;
        let relay = relay_with(config);

        let first = relay.try_acquire_connection().unwrap();
        let second = relay.try_acquire_connection().unwrap();
        assert_ne!(first.id(), second.id());
        assert!(relay.try_acquire_connection().is_none());
        assert_eq!(relay.active_connections(), 2);

        drop(first);
        assert_eq!(relay.active_connections(), 1);
        assert!(relay.try_acquire_connection().is_some());
        assert_eq!(
            relay.metrics().connections_rejected.load(Ordering::Relaxed),
            1
        );
    }

    #[test]
    fn record_rejected_updates_counters() {
        let relay = relay();
        let conn = ConnectionId::new(1);
        relay.record_rejected(conn, &ProtocolError::Binary { len: 3 });
        relay.record_rejected(conn, &ProtocolError::NotRegistered);
        relay.record_rejected(
            conn,
            &ProtocolError::RateLimited {
                reason: "test".into(),
            },
        );

        let m = relay.metrics();
        assert_eq!(m.malformed_total.load(Ordering::Relaxed), 1);
        assert_eq!(m.dropped_unregistered.load(Ordering::Relaxed), 1);
        assert_eq!(m.rate_limit_hits.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn relays_are_independent() {
        let a = relay();
        let b = relay();
        let (tx, _rx) = mpsc::unbounded_channel();
        a.register(ConnectionId::new(1), &name("x"), tx).unwrap();

        assert_eq!(a.registry().len(), 1);
        assert!(b.registry().is_empty());
    }
}

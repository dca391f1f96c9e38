//! Per-connection session management.
//!
//! Each WebSocket connection gets a Session that tracks its registration and
//! handles frames strictly in arrival order. The connection runs as an actor:
//!
//! - writer task: owns the sink and drains an unbounded channel, so routing
//!   into this connection never blocks the sender's reader
//! - ping task: sends a ping every `ping_interval_secs` and gives up if no
//!   pong arrives within `pong_timeout_secs`
//! - reader loop: parses and dispatches frames one at a time
//!
//! On exit the registration is removed only if it still points at this
//! connection.

use crate::error::{ProtocolError, ProtocolResult};
use crate::registry::{ConnectionId, OutboundSender};
use crate::server::{ConnectionPermit, SignalRelay};
use axum::extract::ws::{CloseFrame, Message, WebSocket};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use signal_types::{Frame, ParticipantName};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{interval, timeout};

const WRITER_DRAIN: Duration = Duration::from_secs(1);

/// Session state machine states.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    /// Open, no name bound yet.
    Connected,
    /// Bound to a name.
    Registered {
        /// The name this connection registered under.
        name: ParticipantName,
    },
    /// Terminal.
    Closed,
}

/// A per-connection session.
pub struct Session {
    relay: Arc<SignalRelay>,
    permit: ConnectionPermit,
    outbound: OutboundSender,
    state: SessionState,
}

impl Session {
    /// Create a new session. `outbound` feeds this connection's writer.
    pub fn new(
        relay: Arc<SignalRelay>,
        permit: ConnectionPermit,
        outbound: OutboundSender,
    ) -> Self {
        Self {
            relay,
            permit,
            outbound,
            state: SessionState::Connected,
        }
    }

    /// Connection identity.
    pub fn id(&self) -> ConnectionId {
        self.permit.id()
    }

    /// Current state.
    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Handle one inbound text frame.
    ///
    /// An error means the frame was dropped; the connection stays open.
    pub fn handle_text(&mut self, text: &str) -> ProtocolResult<()> {
        if matches!(self.state, SessionState::Closed) {
            return Ok(());
        }

        if let Err(e) = self.relay.rate_limits().check_message(self.id()) {
            return Err(ProtocolError::RateLimited {
                reason: e.to_string(),
            });
        }

        match Frame::parse(text)? {
            Frame::Register { name } => self.register(name),
            Frame::Route { kind, to, payload } => {
                let SessionState::Registered { name } = &self.state else {
                    return Err(ProtocolError::NotRegistered);
                };
                self.relay
                    .route(self.id(), name, &kind, &to, payload)
                    .map(|_| ())
            }
        }
    }

    fn register(&mut self, name: ParticipantName) -> ProtocolResult<()> {
        self.relay.register(self.id(), &name, self.outbound.clone())?;

        // Moving to a new name releases the old one
        if let SessionState::Registered { name: previous } = &self.state {
            if *previous != name {
                self.relay.unregister(self.id(), previous);
            }
        }

        self.state = SessionState::Registered { name };
        Ok(())
    }

    /// Release the registration (if still ours) and enter the terminal state.
    pub fn close(&mut self) {
        if let SessionState::Registered { name } = &self.state {
            self.relay.unregister(self.id(), name);
        }
        self.state = SessionState::Closed;
    }
}

/// Run the actor for an upgraded WebSocket until it closes.
pub async fn run_connection(
    relay: Arc<SignalRelay>,
    permit: ConnectionPermit,
    socket: WebSocket,
) {
    let (ws_sender, ws_receiver) = socket.split();
    let (tx, rx) = mpsc::unbounded_channel::<Message>();

    let ping_interval = relay.config().server.ping_interval();
    let pong_timeout = relay.config().server.pong_timeout();

    let mut session = Session::new(relay, permit, tx.clone());
    let conn = session.id();
    tracing::info!(conn = %conn, "Connection opened");

    let mut writer_handle = tokio::spawn(writer_task(ws_sender, rx));

    let (pong_tx, pong_rx) = mpsc::unbounded_channel::<()>();
    let ping_handle = tokio::spawn(ping_task(tx, pong_rx, ping_interval, pong_timeout));

    read_loop(&mut session, ws_receiver, pong_tx, ping_handle).await;

    session.close();
    // Last sender goes with the session, letting the writer flush a pending close
    drop(session);
    if timeout(WRITER_DRAIN, &mut writer_handle).await.is_err() {
        tracing::debug!(conn = %conn, "Writer did not drain in time");
        writer_handle.abort();
    }
    tracing::info!(conn = %conn, "Connection closed");
}

async fn read_loop(
    session: &mut Session,
    mut ws_receiver: SplitStream<WebSocket>,
    pong_tx: mpsc::UnboundedSender<()>,
    mut ping_handle: tokio::task::JoinHandle<()>,
) {
    let conn = session.id();
    loop {
        tokio::select! {
            msg = ws_receiver.next() => match msg {
                Some(Ok(Message::Text(text))) => {
                    if let Err(e) = session.handle_text(&text) {
                        session.relay.record_rejected(conn, &e);
                    }
                }
                Some(Ok(Message::Binary(data))) => {
                    session
                        .relay
                        .record_rejected(conn, &ProtocolError::Binary { len: data.len() });
                }
                Some(Ok(Message::Pong(_))) => {
                    let _ = pong_tx.send(());
                }
                // Pongs to client pings are answered by the WebSocket layer
                Some(Ok(Message::Ping(_))) => {}
                Some(Ok(Message::Close(frame))) => {
                    tracing::debug!(conn = %conn, reason = ?frame, "Client initiated close");
                    break;
                }
                Some(Err(e)) => {
                    tracing::debug!(conn = %conn, error = %e, "WebSocket receive error");
                    break;
                }
                None => break,
            },
            _ = &mut ping_handle => {
                tracing::warn!(conn = %conn, "Heartbeat lost, closing connection");
                break;
            }
        }
    }
    ping_handle.abort();
}

/// Forward queued messages to the socket until the channel closes or a
/// close frame is written.
async fn writer_task(
    mut sink: SplitSink<WebSocket, Message>,
    mut rx: mpsc::UnboundedReceiver<Message>,
) {
    while let Some(msg) = rx.recv().await {
        let closing = matches!(msg, Message::Close(_));
        if let Err(e) = sink.send(msg).await {
            tracing::debug!(error = %e, "WebSocket send failed");
            break;
        }
        if closing {
            break;
        }
    }
}

/// Returns when the peer stops answering pings or the writer is gone.
async fn ping_task(
    tx: OutboundSender,
    mut pong_rx: mpsc::UnboundedReceiver<()>,
    every: Duration,
    pong_timeout: Duration,
) {
    let mut ping_timer = interval(every);
    // Skip the first immediate tick
    ping_timer.tick().await;

    loop {
        ping_timer.tick().await;

        if tx.send(Message::Ping(b"hb".to_vec())).is_err() {
            return;
        }

        match timeout(pong_timeout, pong_rx.recv()).await {
            Ok(Some(())) => {}
            _ => {
                let _ = tx.send(Message::Close(Some(CloseFrame {
                    code: axum::extract::ws::close_code::AWAY,
                    reason: "pong timeout".into(),
                })));
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use serde_json::{json, Value};

    fn relay(config: Config) -> Arc<SignalRelay> {
        Arc::new(SignalRelay::new(config))
    }

    fn session(relay: &Arc<SignalRelay>) -> (Session, mpsc::UnboundedReceiver<Message>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let permit = relay.try_acquire_connection().unwrap();
        (Session::new(relay.clone(), permit, tx), rx)
    }

    fn next_json(rx: &mut mpsc::UnboundedReceiver<Message>) -> Value {
        match rx.try_recv().unwrap() {
            Message::Text(t) => serde_json::from_str(&t).unwrap(),
            other => panic!("expected text, got {other:?}"),
        }
    }

    fn name(s: &str) -> ParticipantName {
        ParticipantName::new(s).unwrap()
    }

    #[test]
    fn register_then_route() {
        let relay = relay(Config::default());
        let (mut agent, _agent_rx) = session(&relay);
        let (mut customer, mut customer_rx) = session(&relay);

        agent
            .handle_text(r#"{"type":"register","from":"agent1"}"#)
            .unwrap();
        customer
            .handle_text(r#"{"type":"register","from":"customer1"}"#)
            .unwrap();
        assert_eq!(
            agent.state(),
            &SessionState::Registered {
                name: name("agent1")
            }
        );

        agent
            .handle_text(r#"{"type":"initiate_call","from":"agent1","to":"customer1","payload":{"groupId":"g-123"}}"#)
            .unwrap();
        assert_eq!(
            next_json(&mut customer_rx),
            json!({"type": "initiate_call", "from": "agent1", "payload": {"groupId": "g-123"}})
        );
    }

    #[test]
    fn claimed_from_is_replaced_by_registered_name() {
        let relay = relay(Config::default());
        let (mut agent, _agent_rx) = session(&relay);
        let (mut customer, mut customer_rx) = session(&relay);
        agent.handle_text(r#"{"type":"register","from":"agent1"}"#).unwrap();
        customer.handle_text(r#"{"type":"register","from":"customer1"}"#).unwrap();

        agent
            .handle_text(r#"{"type":"question","from":"impostor","to":"customer1","payload":{}}"#)
            .unwrap();
        assert_eq!(next_json(&mut customer_rx)["from"], "agent1");
    }

    #[test]
    fn route_before_register_is_rejected() {
        let relay = relay(Config::default());
        let (mut s, _rx) = session(&relay);
        let result = s.handle_text(r#"{"type":"question","to":"customer1"}"#);
        assert!(matches!(result, Err(ProtocolError::NotRegistered)));
    }

    #[test]
    fn malformed_frames_are_rejected_without_state_change() {
        let relay = relay(Config::default());
        let (mut s, _rx) = session(&relay);

        assert!(matches!(
            s.handle_text("not json"),
            Err(ProtocolError::Malformed(_))
        ));
        assert!(matches!(
            s.handle_text(r#"{"type":"question","from":"a"}"#),
            Err(ProtocolError::Malformed(_))
        ));
        assert_eq!(s.state(), &SessionState::Connected);
    }

    #[test]
    fn re_register_moves_association() {
        let relay = relay(Config::default());
        let (mut s, _rx) = session(&relay);
        s.handle_text(r#"{"type":"register","from":"a"}"#).unwrap();
        s.handle_text(r#"{"type":"register","from":"b"}"#).unwrap();

        assert!(!relay.registry().contains("a"));
        assert!(relay.registry().is_current("b", s.id()));
    }

    #[test]
    fn close_of_superseded_session_keeps_new_registration() {
        let relay = relay(Config::default());
        let (mut old, _old_rx) = session(&relay);
        let (mut new, _new_rx) = session(&relay);
        old.handle_text(r#"{"type":"register","from":"c"}"#).unwrap();
        new.handle_text(r#"{"type":"register","from":"c"}"#).unwrap();

        old.close();
        assert_eq!(old.state(), &SessionState::Closed);
        assert!(relay.registry().is_current("c", new.id()));

        new.close();
        assert!(relay.registry().is_empty());
    }

    #[test]
    fn superseded_session_cannot_route() {
        let relay = relay(Config::default());
        let (mut old, _old_rx) = session(&relay);
        let (mut new, mut new_rx) = session(&relay);
        old.handle_text(r#"{"type":"register","from":"c"}"#).unwrap();
        new.handle_text(r#"{"type":"register","from":"c"}"#).unwrap();

        let result = old.handle_text(r#"{"type":"x","to":"c"}"#);
        assert!(matches!(result, Err(ProtocolError::Superseded { .. })));
        assert!(new_rx.try_recv().is_err());
    }

    #[test]
    fn rate_limit_drops_excess_frames() {
        let mut config = Config::default();
        config.limits.messages_per_minute = 2;
        let relay = relay(config);
        let (mut s, _rx) = session(&relay);

        s.handle_text(r#"{"type":"register","from":"a"}"#).unwrap();
        s.handle_text(r#"{"type":"x","to":"nobody"}"#).unwrap();
        assert!(matches!(
            s.handle_text(r#"{"type":"x","to":"nobody"}"#),
            Err(ProtocolError::RateLimited { .. })
        ));
        // Still registered
        assert!(relay.registry().contains("a"));
    }

    #[test]
    fn closed_session_ignores_frames() {
        let relay = relay(Config::default());
        let (mut s, _rx) = session(&relay);
        s.close();
        assert!(s.handle_text(r#"{"type":"register","from":"a"}"#).is_ok());
        assert!(relay.registry().is_empty());
    }

    #[tokio::test]
    async fn ping_task_gives_up_without_pong() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let (_pong_tx, pong_rx) = mpsc::unbounded_channel();

        tokio::time::timeout(
            Duration::from_secs(2),
            ping_task(tx, pong_rx, Duration::from_millis(20), Duration::from_millis(20)),
        )
        .await
        .expect("ping task should stop after a missed pong");

        assert!(matches!(rx.try_recv(), Ok(Message::Ping(_))));
        assert!(matches!(rx.try_recv(), Ok(Message::Close(Some(_)))));
    }

    #[tokio::test]
    async fn ping_task_continues_while_pongs_arrive() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let (pong_tx, pong_rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(ping_task(
            tx,
            pong_rx,
            Duration::from_millis(20),
            Duration::from_millis(500),
        ));

        for _ in 0..3 {
            assert!(matches!(rx.recv().await, Some(Message::Ping(_))));
            pong_tx.send(()).unwrap();
        }
        assert!(!handle.is_finished());
        handle.abort();
    }
}

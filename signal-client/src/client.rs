//! SignalClient - the main interface for relay endpoints.
//!
//! # Architecture
//!
//! SignalClient uses a pure state machine (from signal-core) for the
//! connection lifecycle and interprets its actions to perform actual I/O via
//! the Transport trait.
//!
//! ```text
//! Application → SignalClient → Transport → Relay
//!                   ↓
//!              signal-core (pure state machine)
//! ```
//!
//! Sends are fire-and-forget. `Ok(())` from [`SignalClient::send`] means
//! the frame was handed to the transport; the relay silently drops frames
//! for unknown recipients and never acknowledges anything.

use serde_json::Value;
use signal_core::{Action, ConnectionEvent, ConnectionState, Event, Outbound};
use signal_types::{Envelope, Forwarded, ParticipantName, RawPayload, SignalError};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;

use crate::transport::{Transport, TransportError};

/// Client errors.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Transport error.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Frame encoding or decoding error.
    #[error("frame error: {0}")]
    Signal(#[from] SignalError),

    /// Not registered with the relay.
    #[error("not connected")]
    NotConnected,

    /// Connection failed.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),
}

/// Configuration for SignalClient.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Relay WebSocket URL (e.g. `ws://127.0.0.1:8080/ws`).
    pub relay_url: String,
    /// Name to register under.
    pub name: ParticipantName,
}

impl ClientConfig {
    /// Create a configuration, validating the participant name.
    pub fn new(relay_url: &str, name: &str) -> Result<Self, ClientError> {
        Ok(Self {
            relay_url: relay_url.to_string(),
            name: ParticipantName::new(name)?,
        })
    }
}

/// A relay endpoint.
pub struct SignalClient<T: Transport> {
    config: ClientConfig,
    transport: T,
    state: Arc<Mutex<ConnectionState>>,
    reconnect_delay: Arc<Mutex<Option<Duration>>>,
}

impl<T: Transport> SignalClient<T> {
    /// Create a new SignalClient.
    pub fn new(config: ClientConfig, transport: T) -> Self {
        Self {
            config,
            transport,
            state: Arc::new(Mutex::new(ConnectionState::new())),
            reconnect_delay: Arc::new(Mutex::new(None)),
        }
    }

    /// Name this client registers under.
    pub fn name(&self) -> &ParticipantName {
        &self.config.name
    }

    /// Connect to the relay and register.
    ///
    /// Also used to come back after a disconnect: a reconnecting client
    /// registers again, since the relay forgets it on disconnect.
    pub async fn connect(&self) -> Result<(), ClientError> {
        let first = {
            let state = self.state.lock().await;
            match &*state {
                ConnectionState::Registered { .. } => return Ok(()),
                ConnectionState::Reconnecting { .. } => Event::ReconnectTimer,
                _ => Event::ConnectRequested,
            }
        };
        self.apply(first).await;

        if let Err(e) = self.transport.connect(&self.config.relay_url).await {
            self.apply(Event::ConnectFailed {
                error: e.to_string(),
            })
            .await;
            return Err(ClientError::ConnectionFailed(e.to_string()));
        }

        let actions = self
            .apply(Event::ConnectSucceeded {
                name: self.config.name.clone(),
            })
            .await;

        for action in actions {
            if let Action::SendRegister { name } = action {
                if let Err(e) = self.send_register(&name).await {
                    // Not registered after all; the next connect() starts over
                    self.apply(Event::Disconnected {
                        reason: e.to_string(),
                    })
                    .await;
                    let _ = self.transport.close().await;
                    return Err(e);
                }
            }
        }

        Ok(())
    }

    async fn send_register(&self, name: &ParticipantName) -> Result<(), ClientError> {
        let frame = Envelope::register(name).to_json()?;
        self.transport.send(&frame).await?;
        Ok(())
    }

    /// Check if registered.
    pub async fn is_registered(&self) -> bool {
        self.state.lock().await.is_registered()
    }

    /// Current connection state.
    pub async fn state(&self) -> ConnectionState {
        self.state.lock().await.clone()
    }

    /// Delay requested by the state machine before the next [`Self::connect`].
    pub async fn reconnect_delay(&self) -> Option<Duration> {
        *self.reconnect_delay.lock().await
    }

    /// Send `kind` with `payload` to `to`.
    ///
    /// No delivery confirmation exists; see the module docs.
    pub async fn send(
        &self,
        kind: impl Into<String>,
        to: &ParticipantName,
        payload: Value,
    ) -> Result<(), ClientError> {
        let envelope = Envelope::message(kind, &self.config.name, to, payload)?;
        self.send_envelope(&envelope).await
    }

    /// Send `kind` to `to` with a payload that is already JSON text.
    ///
    /// The text reaches the recipient unchanged; `None` sends no payload.
    pub async fn send_raw(
        &self,
        kind: impl Into<String>,
        to: &ParticipantName,
        payload: RawPayload,
    ) -> Result<(), ClientError> {
        let envelope = Envelope::message_raw(kind, &self.config.name, to, payload);
        self.send_envelope(&envelope).await
    }

    async fn send_envelope(&self, envelope: &Envelope) -> Result<(), ClientError> {
        if !self.is_registered().await {
            return Err(ClientError::NotConnected);
        }

        let frame = envelope.to_json()?;
        if let Err(e) = self.transport.send(&frame).await {
            self.apply(Event::Disconnected {
                reason: e.to_string(),
            })
            .await;
            return Err(e.into());
        }
        Ok(())
    }

    /// Send a message produced by a session state machine.
    pub async fn send_outbound(
        &self,
        to: &ParticipantName,
        outbound: &Outbound,
    ) -> Result<(), ClientError> {
        self.send(outbound.kind.as_str(), to, outbound.payload.clone())
            .await
    }

    /// Receive the next forwarded envelope.
    pub async fn recv(&self) -> Result<Forwarded, ClientError> {
        match self.transport.recv().await {
            Ok(text) => Ok(Forwarded::from_json(&text)?),
            Err(e) => {
                if matches!(
                    e,
                    TransportError::ConnectionClosed | TransportError::ReceiveFailed(_)
                ) {
                    self.apply(Event::Disconnected {
                        reason: e.to_string(),
                    })
                    .await;
                }
                Err(e.into())
            }
        }
    }

    /// Disconnect from the relay.
    pub async fn disconnect(&self) -> Result<(), ClientError> {
        self.apply(Event::DisconnectRequested).await;
        self.transport.close().await?;
        Ok(())
    }

    /// Get a reference to the transport (for testing).
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Feed the state machine and perform the bookkeeping actions.
    ///
    /// Returns the actions that need transport I/O.
    async fn apply(&self, event: Event) -> Vec<Action> {
        let actions = {
            let mut state = self.state.lock().await;
            let (new_state, actions) = state.clone().on_event(event);
            *state = new_state;
            actions
        };

        let mut io = Vec::new();
        for action in actions {
            match action {
                Action::StartReconnectTimer { delay } => {
                    *self.reconnect_delay.lock().await = Some(delay);
                }
                Action::CancelReconnect => {
                    *self.reconnect_delay.lock().await = None;
                }
                Action::EmitEvent(event) => log_event(&event),
                other => io.push(other),
            }
        }
        io
    }
}

fn log_event(event: &ConnectionEvent) {
    match event {
        ConnectionEvent::Registered { name } => tracing::info!("Registered as {}", name),
        ConnectionEvent::ConnectionFailed { error } => {
            tracing::warn!("Connection failed: {}", error)
        }
        ConnectionEvent::Disconnected { reason } => tracing::info!("Disconnected: {}", reason),
        ConnectionEvent::ReconnectFailed { attempt, error } => {
            tracing::warn!("Reconnect attempt {} failed: {}", attempt, error)
        }
    }
}

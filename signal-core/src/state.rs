//! Connection state machine for a relay endpoint.
//!
//! The relay keeps no state across restarts: after any disconnect an endpoint
//! must reconnect and register again. This module encodes that lifecycle as a
//! pure state machine. It takes events as input and produces a new state plus
//! a list of actions to execute; `signal-client` performs the actual I/O.

use signal_types::ParticipantName;
use std::time::Duration;

/// Connection state machine - NO I/O, just state transitions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    /// Not connected to the relay.
    Disconnected,
    /// Connection attempt in progress.
    Connecting,
    /// Connected and the register frame has been sent.
    ///
    /// The relay sends no acknowledgement, so this is the best the
    /// endpoint can know.
    Registered {
        /// Name the endpoint registered under.
        name: ParticipantName,
    },
    /// Disconnected, waiting to reconnect.
    Reconnecting {
        /// Number of reconnection attempts so far.
        attempt: u32,
    },
}

impl ConnectionState {
    /// Create a new state machine in the Disconnected state.
    pub fn new() -> Self {
        Self::Disconnected
    }

    /// Process an event and return the new state plus actions to execute.
    ///
    /// This is a pure function - no side effects. The caller (signal-client)
    /// is responsible for executing the returned actions.
    pub fn on_event(self, event: Event) -> (Self, Vec<Action>) {
        match (self, event) {
            // From Disconnected
            (Self::Disconnected, Event::ConnectRequested) => {
                (Self::Connecting, vec![Action::Connect])
            }

            // From Connecting
            (Self::Connecting, Event::ConnectSucceeded { name }) => (
                Self::Registered { name: name.clone() },
                vec![
                    Action::SendRegister { name: name.clone() },
                    Action::EmitEvent(ConnectionEvent::Registered { name }),
                ],
            ),
            (Self::Connecting, Event::ConnectFailed { error }) => (
                Self::Reconnecting { attempt: 1 },
                vec![
                    Action::EmitEvent(ConnectionEvent::ConnectionFailed { error }),
                    Action::StartReconnectTimer {
                        delay: calculate_backoff(1),
                    },
                ],
            ),

            // From Registered
            (Self::Registered { .. }, Event::Disconnected { reason }) => (
                Self::Reconnecting { attempt: 1 },
                vec![
                    Action::EmitEvent(ConnectionEvent::Disconnected { reason }),
                    Action::StartReconnectTimer {
                        delay: calculate_backoff(1),
                    },
                ],
            ),
            (Self::Registered { .. }, Event::DisconnectRequested) => (
                Self::Disconnected,
                vec![
                    Action::Disconnect,
                    Action::EmitEvent(ConnectionEvent::Disconnected {
                        reason: "user requested".into(),
                    }),
                ],
            ),

            // From Reconnecting
            (Self::Reconnecting { .. }, Event::ReconnectTimer) => {
                (Self::Connecting, vec![Action::Connect])
            }
            (Self::Reconnecting { attempt }, Event::ConnectFailed { error }) => {
                let next_attempt = attempt.saturating_add(1);
                (
                    Self::Reconnecting {
                        attempt: next_attempt,
                    },
                    vec![
                        Action::EmitEvent(ConnectionEvent::ReconnectFailed {
                            attempt: next_attempt,
                            error,
                        }),
                        Action::StartReconnectTimer {
                            delay: calculate_backoff(next_attempt),
                        },
                    ],
                )
            }
            (Self::Reconnecting { .. }, Event::DisconnectRequested) => {
                (Self::Disconnected, vec![Action::CancelReconnect])
            }

            // Invalid transitions - stay in current state
            (state, _) => (state, vec![]),
        }
    }

    /// Check if currently registered with the relay.
    pub fn is_registered(&self) -> bool {
        matches!(self, Self::Registered { .. })
    }

    /// Check if currently trying to connect.
    pub fn is_connecting(&self) -> bool {
        matches!(self, Self::Connecting | Self::Reconnecting { .. })
    }
}

impl Default for ConnectionState {
    fn default() -> Self {
        Self::new()
    }
}

/// Events that can occur in the connection lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// User requested connection.
    ConnectRequested,
    /// Transport connection succeeded.
    ConnectSucceeded {
        /// Name to register under.
        name: ParticipantName,
    },
    /// Transport connection failed.
    ConnectFailed {
        /// Error message describing the failure.
        error: String,
    },
    /// Connection was lost.
    Disconnected {
        /// Reason for disconnection.
        reason: String,
    },
    /// User requested disconnect.
    DisconnectRequested,
    /// Reconnect timer fired.
    ReconnectTimer,
}

/// Actions to be executed by the signal-client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Initiate transport connection.
    Connect,
    /// Disconnect the transport.
    Disconnect,
    /// Send the register frame.
    SendRegister {
        /// Name to register under.
        name: ParticipantName,
    },
    /// Start a timer for reconnection.
    StartReconnectTimer {
        /// Delay before attempting reconnection.
        delay: Duration,
    },
    /// Cancel any pending reconnect timer.
    CancelReconnect,
    /// Emit an event to the application.
    EmitEvent(ConnectionEvent),
}

/// Events emitted to the application layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    /// Connected and registered.
    Registered {
        /// Name registered under.
        name: ParticipantName,
    },
    /// Connection failed.
    ConnectionFailed {
        /// Error message describing the failure.
        error: String,
    },
    /// Disconnected from the relay.
    Disconnected {
        /// Reason for disconnection.
        reason: String,
    },
    /// Reconnection attempt failed.
    ReconnectFailed {
        /// Which reconnection attempt this was.
        attempt: u32,
        /// Error message describing the failure.
        error: String,
    },
}

/// Calculate reconnection backoff with jitter.
///
/// Formula: min(30s, 2^attempt seconds) + random(0..1000ms)
fn calculate_backoff(attempt: u32) -> Duration {
    let base_secs = 2u64.pow(attempt.min(5)).min(30);
    Duration::from_secs(base_secs) + Duration::from_millis(random_jitter_ms())
}

/// Generate random jitter between 0 and 1000 milliseconds.
fn random_jitter_ms() -> u64 {
    let mut bytes = [0u8; 8];
    if getrandom::getrandom(&mut bytes).is_err() {
        return 0;
    }
    u64::from_le_bytes(bytes) % 1001
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name() -> ParticipantName {
        ParticipantName::new("customer1").unwrap()
    }

    fn registered() -> ConnectionState {
        ConnectionState::Registered { name: name() }
    }

    #[test]
    fn starts_disconnected() {
        assert_eq!(ConnectionState::new(), ConnectionState::Disconnected);
    }

    #[test]
    fn connect_request_transitions_to_connecting() {
        let (state, actions) = ConnectionState::Disconnected.on_event(Event::ConnectRequested);
        assert_eq!(state, ConnectionState::Connecting);
        assert_eq!(actions, vec![Action::Connect]);
    }

    #[test]
    fn connect_success_sends_register() {
        let (state, actions) =
            ConnectionState::Connecting.on_event(Event::ConnectSucceeded { name: name() });

        assert_eq!(state, registered());
        assert_eq!(actions[0], Action::SendRegister { name: name() });
        assert!(actions
            .iter()
            .any(|a| matches!(a, Action::EmitEvent(ConnectionEvent::Registered { .. }))));
    }

    #[test]
    fn connect_failure_triggers_reconnect() {
        let (state, actions) = ConnectionState::Connecting.on_event(Event::ConnectFailed {
            error: "refused".into(),
        });

        assert_eq!(state, ConnectionState::Reconnecting { attempt: 1 });
        assert!(actions
            .iter()
            .any(|a| matches!(a, Action::StartReconnectTimer { .. })));
    }

    #[test]
    fn unexpected_disconnect_triggers_reconnect() {
        // A relay restart drops every registration; the endpoint must come back
        let (state, actions) = registered().on_event(Event::Disconnected {
            reason: "relay restarted".into(),
        });

        assert_eq!(state, ConnectionState::Reconnecting { attempt: 1 });
        assert!(actions
            .iter()
            .any(|a| matches!(a, Action::StartReconnectTimer { .. })));
    }

    #[test]
    fn reconnect_cycle_registers_again() {
        let (state, _) = registered().on_event(Event::Disconnected {
            reason: "gone".into(),
        });
        let (state, actions) = state.on_event(Event::ReconnectTimer);
        assert_eq!(state, ConnectionState::Connecting);
        assert_eq!(actions, vec![Action::Connect]);

        let (state, actions) = state.on_event(Event::ConnectSucceeded { name: name() });
        assert!(state.is_registered());
        assert!(actions.contains(&Action::SendRegister { name: name() }));
    }

    #[test]
    fn reconnect_failure_increments_attempt() {
        let state = ConnectionState::Reconnecting { attempt: 3 };
        let (state, actions) = state.on_event(Event::ConnectFailed {
            error: "still down".into(),
        });

        assert_eq!(state, ConnectionState::Reconnecting { attempt: 4 });
        assert!(actions.iter().any(|a| matches!(
            a,
            Action::EmitEvent(ConnectionEvent::ReconnectFailed { attempt: 4, .. })
        )));
    }

    #[test]
    fn reconnect_backoff_increases_with_attempt() {
        // Jitter is at most 1s, so base differences dominate
        assert!(calculate_backoff(1) < Duration::from_secs(4));
        assert!(calculate_backoff(3) >= Duration::from_secs(8));
    }

    #[test]
    fn reconnect_delay_capped_at_30_seconds_plus_jitter() {
        let delay = calculate_backoff(50);
        assert!(delay >= Duration::from_secs(30));
        assert!(delay <= Duration::from_secs(31));
    }

    #[test]
    fn disconnect_request_from_registered() {
        let (state, actions) = registered().on_event(Event::DisconnectRequested);
        assert_eq!(state, ConnectionState::Disconnected);
        assert!(actions.contains(&Action::Disconnect));
    }

    #[test]
    fn disconnect_request_from_reconnecting_cancels() {
        let (state, actions) =
            ConnectionState::Reconnecting { attempt: 2 }.on_event(Event::DisconnectRequested);
        assert_eq!(state, ConnectionState::Disconnected);
        assert_eq!(actions, vec![Action::CancelReconnect]);
    }

    #[test]
    fn invalid_transition_is_noop() {
        let (state, actions) = ConnectionState::Disconnected.on_event(Event::ReconnectTimer);
        assert_eq!(state, ConnectionState::Disconnected);
        assert!(actions.is_empty());
    }

    #[test]
    fn helpers() {
        assert!(registered().is_registered());
        assert!(!ConnectionState::Connecting.is_registered());
        assert!(ConnectionState::Connecting.is_connecting());
        assert!(ConnectionState::Reconnecting { attempt: 1 }.is_connecting());
        assert!(!registered().is_connecting());
    }
}

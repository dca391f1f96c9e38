//! The registration table: participant name to live connection.
//!
//! At most one connection holds a name. A later `register` under the same
//! name silently supersedes the earlier one, and removal on disconnect is
//! matched by connection identity, so a superseded connection closing late
//! never evicts the entry that replaced it.

use axum::extract::ws::Message;
use dashmap::DashMap;
use signal_types::ParticipantName;
use std::fmt;
use tokio::sync::mpsc;

/// Channel feeding a connection's writer task.
pub type OutboundSender = mpsc::UnboundedSender<Message>;

/// Identity of one accepted WebSocket connection.
///
/// Allocated by the relay and never reused within a process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Wrap a raw id.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Raw id.
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

#[derive(Debug)]
struct Registration {
    conn: ConnectionId,
    sender: OutboundSender,
}

/// What happened to a routed frame. Never reported to the sender.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteOutcome {
    /// Queued on the recipient's connection.
    Delivered,
    /// No live registration under the recipient name.
    UnknownRecipient,
    /// Recipient connection is tearing down; its writer is gone.
    SendFailed,
}

/// Concurrency-safe registration table owned by one relay instance.
#[derive(Debug, Default)]
pub struct Registry {
    entries: DashMap<ParticipantName, Registration>,
}

impl Registry {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `name` to `conn`, overwriting any previous binding.
    ///
    /// Returns the connection that was displaced, if it was a different one.
    pub fn register(
        &self,
        name: ParticipantName,
        conn: ConnectionId,
        sender: OutboundSender,
    ) -> Option<ConnectionId> {
        self.entries
            .insert(name, Registration { conn, sender })
            .map(|previous| previous.conn)
            .filter(|previous| *previous != conn)
    }

    /// Queue `frame` on the connection registered as `to`.
    ///
    /// The send happens while the entry's shard lock is held, so a
    /// concurrent register or unregister of `to` is either fully before
    /// or fully after it.
    pub fn route(&self, to: &str, frame: String) -> RouteOutcome {
        match self.entries.get(to) {
            Some(entry) => match entry.sender.send(Message::Text(frame)) {
                Ok(()) => RouteOutcome::Delivered,
                Err(_) => RouteOutcome::SendFailed,
            },
            None => RouteOutcome::UnknownRecipient,
        }
    }

    /// Remove `name` only if it still belongs to `conn`.
    ///
    /// Returns true if an entry was removed.
    pub fn unregister(&self, name: &str, conn: ConnectionId) -> bool {
        self.entries
            .remove_if(name, |_, registration| registration.conn == conn)
            .is_some()
    }

    /// Remove every entry owned by `conn`.
    ///
    /// Fallback for when the caller does not know which name `conn` holds.
    pub fn unregister_connection(&self, conn: ConnectionId) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, registration| registration.conn != conn);
        before.saturating_sub(self.entries.len())
    }

    /// Check whether `name` is currently bound to `conn`.
    pub fn is_current(&self, name: &str, conn: ConnectionId) -> bool {
        self.connection_of(name) == Some(conn)
    }

    /// Connection currently bound to `name`.
    pub fn connection_of(&self, name: &str) -> Option<ConnectionId> {
        self.entries.get(name).map(|entry| entry.conn)
    }

    /// Check whether `name` has a live registration.
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Number of live registrations.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

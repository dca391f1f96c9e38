//! Transport abstraction for the signalling relay.
//!
//! This module provides a pluggable transport layer that abstracts
//! the underlying connection mechanism (WebSocket, mock for testing).
//!
//! # Design
//!
//! The transport trait is async, connection-oriented and frame-based:
//! - `connect()` establishes a connection
//! - `send()` transmits one JSON text frame
//! - `recv()` receives one JSON text frame
//! - `close()` gracefully terminates
//!
//! # Example
//!
//! ```ignore
//! let transport = MockTransport::new();
//! transport.connect("ws://relay").await?;
//! transport.send(r#"{"type":"register","from":"agent1"}"#).await?;
//! let frame = transport.recv().await?;
//! ```

mod mock;
mod websocket;

pub use mock::MockTransport;
pub use websocket::{WebSocketTransport, WebSocketTransportConfig};

use async_trait::async_trait;
use thiserror::Error;

/// Transport errors.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Connection failed.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// Not connected.
    #[error("not connected")]
    NotConnected,

    /// Connection closed.
    #[error("connection closed")]
    ConnectionClosed,

    /// Send failed.
    #[error("send failed: {0}")]
    SendFailed(String),

    /// Receive failed.
    #[error("receive failed: {0}")]
    ReceiveFailed(String),

    /// Connection timeout.
    #[error("connection timeout")]
    Timeout,
}

/// Transport trait for sending and receiving relay frames.
///
/// `send` and `recv` take `&self` so one task can block in `recv` while
/// another sends.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Connect to the relay at the given address (a `ws://` URL for WebSocket).
    async fn connect(&self, address: &str) -> Result<(), TransportError>;

    /// Send one text frame.
    async fn send(&self, frame: &str) -> Result<(), TransportError>;

    /// Receive one text frame.
    ///
    /// Blocks until data is available or connection closes.
    async fn recv(&self) -> Result<String, TransportError>;

    /// Check if currently connected.
    fn is_connected(&self) -> bool;

    /// Close the connection gracefully.
    async fn close(&self) -> Result<(), TransportError>;
}

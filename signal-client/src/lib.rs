//! # signal-client
//!
//! Client library for the vkyc signalling relay.
//!
//! This is what an agent or customer endpoint uses to talk to the relay.
//!
//! ## Features
//!
//! - **Transport Abstraction**: Pluggable transport layer (WebSocket, mock)
//! - **Pure State Machine**: Uses signal-core for the connect/register/reconnect lifecycle
//! - **Fire-and-forget sends**: a successful `send` only means the frame left
//!   this process; the relay never confirms delivery
//! - **Token client**: fetches calling-SDK credentials from `GET /token`
//!
//! ## Example
//!
//! ```ignore
//! use signal_client::{ClientConfig, SignalClient, WebSocketTransport};
//!
//! let config = ClientConfig::new("ws://127.0.0.1:8080/ws", "agent1")?;
//! let client = SignalClient::new(config, WebSocketTransport::new());
//! client.connect().await?;
//!
//! client.send("initiate_call", &"customer1".try_into()?, json!({"groupId": "g-123"})).await?;
//! let envelope = client.recv().await?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod client;
pub mod token;
pub mod transport;

pub use client::{ClientConfig, ClientError, SignalClient};
pub use token::{CallCredentials, TokenClient, TokenError};
pub use transport::{MockTransport, Transport, TransportError, WebSocketTransport};

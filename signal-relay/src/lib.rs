//! # signal-relay
//!
//! Signalling relay for agent/customer identity verification sessions.
//!
//! This crate implements a relay server that:
//! - Accepts WebSocket connections from browser or CLI endpoints
//! - Binds each connection to a participant name on `register`
//! - Forwards typed envelopes by name, asserting `from` itself
//! - Forgets a name when its connection closes
//!
//! Delivery is best effort: an envelope for a name nobody holds is
//! dropped, and senders are never told either way.
//!
//! ## Architecture
//!
//! ```text
//!  agent1 ──┐                         ┌── customer1
//!           │   WebSocket (JSON)      │
//!           ├────────────────────────►│
//!       ┌───┴─────────────────────────┴───┐
//!       │          signal-relay           │
//!       │  ┌───────────────────────────┐  │
//!       │  │ Registry: name → conn     │  │
//!       │  └───────────────────────────┘  │
//!       └─────────────────────────────────┘
//! ```
//!
//! ## Protocol
//!
//! - `{type:"register", from}` binds the connection to `from`
//! - `{type, to, payload}` is forwarded to `to` as `{type, from, payload}`
//!
//! The relay also serves `/health`, `/metrics` and a `/token` passthrough.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod cleanup;
pub mod config;
pub mod error;
pub mod http;
pub mod limits;
pub mod registry;
pub mod server;
pub mod session;

pub use config::Config;
pub use registry::{ConnectionId, Registry, RouteOutcome};
pub use server::SignalRelay;

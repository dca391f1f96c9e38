//! # signal-core
//!
//! Pure logic for vkyc signalling endpoints (no I/O, instant tests).
//!
//! This crate implements the state machines a client endpoint runs on top of
//! the relay without any network I/O:
//! - [`ConnectionState`] - connect / register / reconnect lifecycle
//! - [`AgentSession`] and [`CustomerSession`] - the guided verification flow
//!
//! ## Design Philosophy
//!
//! All modules in this crate are **pure** - they take input and produce output
//! without side effects. The actual I/O is performed by `signal-client`,
//! which interprets the actions produced here.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod session;
pub mod state;

pub use session::{
    AgentSession, CaptureKind, CustomerSession, Outbound, Progress, SessionEvent,
    DEFAULT_QUESTIONS,
};
pub use state::{Action, ConnectionEvent, ConnectionState, Event};

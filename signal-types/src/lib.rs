//! # signal-types
//!
//! Wire format types for the vkyc signalling relay.
//!
//! This crate provides the types shared by the relay and its client endpoints:
//! - [`ParticipantName`] - The routing key a connection registers under
//! - [`Envelope`] - Inbound frame as written by a client
//! - [`Frame`] - An inbound envelope classified as registration or routable message
//! - [`Forwarded`] - What a recipient receives (`from` asserted by the relay)
//! - [`MessageKind`] - The application vocabulary exchanged by agent and customer
//! - [`SignalError`] - Error types
//!
//! All frames are JSON text. The relay never looks inside `payload` and
//! forwards its text unchanged.

#![warn(missing_docs)]
#![warn(clippy::all)]

mod envelope;
mod error;
mod messages;
mod name;

pub use envelope::{Envelope, Forwarded, Frame, RawPayload, REGISTER};
pub use error::SignalError;
pub use messages::{CallRendezvous, CapturedImage, MessageKind, QuestionPayload, ResponsePayload};
pub use name::ParticipantName;

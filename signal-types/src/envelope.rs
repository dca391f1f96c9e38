//! Envelope - the wire format wrapper for every relayed message.
//!
//! Payloads are carried as [`RawValue`]: the exact JSON text the sender
//! wrote, so key order, number formatting and an explicit `null` all
//! reach the recipient unchanged.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::value::{to_raw_value, RawValue};
use serde_json::Value;

use crate::{ParticipantName, SignalError};

/// Reserved `type` of the frame that binds a connection to a name.
pub const REGISTER: &str = "register";

/// A payload as the sender wrote it. `None` when the field was absent;
/// an explicit `null` is `Some` holding the text `null`.
pub type RawPayload = Option<Box<RawValue>>;

/// A present field is kept even when it is `null`.
fn present<'de, D>(deserializer: D) -> Result<RawPayload, D::Error>
where
    D: Deserializer<'de>,
{
    Box::<RawValue>::deserialize(deserializer).map(Some)
}

/// Encode a structured payload. `Value::Null` means no payload at all.
fn encode(payload: &Value) -> Result<RawPayload, SignalError> {
    if payload.is_null() {
        return Ok(None);
    }
    to_raw_value(payload)
        .map(Some)
        .map_err(SignalError::Serialization)
}

fn same_payload(a: &RawPayload, b: &RawPayload) -> bool {
    a.as_deref().map(RawValue::get) == b.as_deref().map(RawValue::get)
}

/// An inbound frame as written by a client: `{ type, from, to?, payload? }`.
///
/// `from` is trusted only on registration. For every other type the relay
/// discards it and asserts the sender's registered name instead.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    /// Application-level tag (`register`, `question`, `initiate_call`, ...).
    #[serde(rename = "type")]
    pub kind: String,
    /// Sender name as claimed by the client.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    /// Recipient name. Required for all non-register types.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<String>,
    /// Opaque payload.
    #[serde(
        default,
        deserialize_with = "present",
        skip_serializing_if = "Option::is_none"
    )]
    pub payload: RawPayload,
}

impl PartialEq for Envelope {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind
            && self.from == other.from
            && self.to == other.to
            && same_payload(&self.payload, &other.payload)
    }
}

impl Envelope {
    /// Build the registration frame for `name`.
    pub fn register(name: &ParticipantName) -> Self {
        Self {
            kind: REGISTER.to_string(),
            from: Some(name.to_string()),
            to: None,
            payload: None,
        }
    }

    /// Build a routable message from a structured payload.
    ///
    /// `Value::Null` sends no payload; use [`Self::message_raw`] to send an
    /// explicit `null` or pre-encoded JSON.
    pub fn message(
        kind: impl Into<String>,
        from: &ParticipantName,
        to: &ParticipantName,
        payload: Value,
    ) -> Result<Self, SignalError> {
        Ok(Self::message_raw(kind, from, to, encode(&payload)?))
    }

    /// Build a routable message carrying `payload` verbatim.
    pub fn message_raw(
        kind: impl Into<String>,
        from: &ParticipantName,
        to: &ParticipantName,
        payload: RawPayload,
    ) -> Self {
        Self {
            kind: kind.into(),
            from: Some(from.to_string()),
            to: Some(to.to_string()),
            payload,
        }
    }

    /// Serialize to a JSON text frame.
    pub fn to_json(&self) -> Result<String, SignalError> {
        serde_json::to_string(self).map_err(SignalError::Serialization)
    }

    /// Deserialize from a JSON text frame.
    pub fn from_json(text: &str) -> Result<Self, SignalError> {
        serde_json::from_str(text).map_err(SignalError::Deserialization)
    }

    /// Check whether this is a registration frame.
    pub fn is_register(&self) -> bool {
        self.kind == REGISTER
    }
}

/// An inbound envelope classified by what the relay must do with it.
#[derive(Debug, Clone)]
pub enum Frame {
    /// Bind the connection to `name`.
    Register {
        /// Name to bind.
        name: ParticipantName,
    },
    /// Forward `kind` + `payload` to `to`.
    Route {
        /// The envelope's `type`, preserved verbatim.
        kind: String,
        /// Recipient.
        to: ParticipantName,
        /// Payload text, preserved verbatim.
        payload: RawPayload,
    },
}

impl PartialEq for Frame {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Register { name: a }, Self::Register { name: b }) => a == b,
            (
                Self::Route {
                    kind: ka,
                    to: ta,
                    payload: pa,
                },
                Self::Route {
                    kind: kb,
                    to: tb,
                    payload: pb,
                },
            ) => ka == kb && ta == tb && same_payload(pa, pb),
            _ => false,
        }
    }
}

impl Frame {
    /// Parse and classify a text frame.
    pub fn parse(text: &str) -> Result<Self, SignalError> {
        Self::try_from(Envelope::from_json(text)?)
    }
}

impl TryFrom<Envelope> for Frame {
    type Error = SignalError;

    fn try_from(envelope: Envelope) -> Result<Self, Self::Error> {
        if envelope.is_register() {
            let name = envelope.from.ok_or(SignalError::MissingName)?;
            return Ok(Frame::Register {
                name: ParticipantName::new(name)?,
            });
        }

        let to = envelope.to.ok_or_else(|| SignalError::MissingRecipient {
            kind: envelope.kind.clone(),
        })?;

        Ok(Frame::Route {
            to: ParticipantName::new(to)?,
            kind: envelope.kind,
            payload: envelope.payload,
        })
    }
}

/// What a recipient receives: `{ type, from, payload }`.
///
/// `to` is consumed by the relay and not re-transmitted. An absent payload
/// stays absent; anything else, `null` included, is written back as sent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Forwarded {
    /// The original `type`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Sender name as registered with the relay.
    pub from: ParticipantName,
    /// The original payload text.
    #[serde(
        default,
        deserialize_with = "present",
        skip_serializing_if = "Option::is_none"
    )]
    pub payload: RawPayload,
}

impl PartialEq for Forwarded {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind
            && self.from == other.from
            && same_payload(&self.payload, &other.payload)
    }
}

impl Forwarded {
    /// Create a forwarded envelope around a payload taken off the wire.
    pub fn new(kind: impl Into<String>, from: ParticipantName, payload: RawPayload) -> Self {
        Self {
            kind: kind.into(),
            from,
            payload,
        }
    }

    /// Create a forwarded envelope from a structured payload.
    /// `Value::Null` means no payload.
    pub fn from_value(
        kind: impl Into<String>,
        from: ParticipantName,
        payload: Value,
    ) -> Result<Self, SignalError> {
        Ok(Self::new(kind, from, encode(&payload)?))
    }

    /// Payload text exactly as the sender wrote it.
    pub fn payload_str(&self) -> Option<&str> {
        self.payload.as_deref().map(RawValue::get)
    }

    /// Payload as a JSON value; `Value::Null` when absent.
    pub fn payload_value(&self) -> Value {
        self.decode_payload().unwrap_or(Value::Null)
    }

    /// Decode the payload into `T`. `None` when absent or of another shape.
    pub fn decode_payload<T: DeserializeOwned>(&self) -> Option<T> {
        serde_json::from_str(self.payload_str()?).ok()
    }

    /// Serialize to a JSON text frame.
    pub fn to_json(&self) -> Result<String, SignalError> {
        serde_json::to_string(self).map_err(SignalError::Serialization)
    }

    /// Deserialize from a JSON text frame.
    pub fn from_json(text: &str) -> Result<Self, SignalError> {
        serde_json::from_str(text).map_err(SignalError::Deserialization)
    }
}

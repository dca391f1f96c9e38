//! Error types for signal frames.

use thiserror::Error;

/// Errors that can occur while decoding or validating signal frames.
#[derive(Debug, Error)]
pub enum SignalError {
    /// JSON serialization failed
    #[error("serialization failed: {0}")]
    Serialization(#[source] serde_json::Error),

    /// JSON deserialization failed (unparseable frame or wrong shape)
    #[error("deserialization failed: {0}")]
    Deserialization(#[source] serde_json::Error),

    /// A non-register frame carried no `to`
    #[error("missing recipient for message type {kind:?}")]
    MissingRecipient {
        /// The frame's `type`.
        kind: String,
    },

    /// A register frame carried no `from`
    #[error("register frame without a participant name")]
    MissingName,

    /// A participant name failed validation
    #[error("invalid participant name: {reason}")]
    InvalidName {
        /// Why the name was rejected.
        reason: String,
    },

    /// A participant name exceeded the configured maximum
    #[error("participant name too long: {len} chars (limit: {max})")]
    NameTooLong {
        /// Length of the rejected name in chars.
        len: usize,
        /// Configured maximum.
        max: usize,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = SignalError::MissingRecipient {
            kind: "question".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "missing recipient for message type \"question\""
        );

        let err = SignalError::NameTooLong { len: 300, max: 128 };
        assert_eq!(
            err.to_string(),
            "participant name too long: 300 chars (limit: 128)"
        );
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<SignalError>();
    }
}

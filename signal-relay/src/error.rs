//! Error types for signal-relay.

use signal_types::SignalError;

/// Main error type for signal-relay operations.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    /// Protocol error.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Token passthrough error.
    #[error("token error: {0}")]
    Token(#[from] TokenError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors for a single inbound frame.
///
/// None of these close the connection; the frame is dropped and counted.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Frame could not be decoded or classified.
    #[error("malformed frame: {0}")]
    Malformed(#[from] SignalError),

    /// Frame arrived as binary.
    #[error("binary frames are not supported ({len} bytes)")]
    Binary {
        /// Size of the rejected frame.
        len: usize,
    },

    /// Routable frame from a connection that holds no registration.
    #[error("connection is not registered")]
    NotRegistered,

    /// Routable frame from a connection whose name now belongs to another connection.
    #[error("registration for {name} was superseded")]
    Superseded {
        /// The name that moved.
        name: String,
    },

    /// Per-connection rate limit exceeded.
    #[error("rate limited: {reason}")]
    RateLimited {
        /// Reason for rate limiting.
        reason: String,
    },
}

/// Token passthrough errors.
#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    /// No identity service is configured.
    #[error("token endpoint not configured")]
    NotConfigured,

    /// Upstream request failed.
    #[error("upstream request failed: {0}")]
    Upstream(#[from] reqwest::Error),

    /// Upstream answered with a non-success status.
    #[error("upstream returned {0}")]
    Status(u16),
}

/// Result type alias for relay operations.
pub type Result<T> = std::result::Result<T, RelayError>;

/// Result type alias for protocol operations.
pub type ProtocolResult<T> = std::result::Result<T, ProtocolError>;

//! Rate limiting for signal-relay.
//!
//! Frames are limited per connection, keyed by [`ConnectionId`]. Names are
//! client-chosen and can move between connections, so they make a poor key.
//! The keyed limiter is backed by DashMap (governor's default keyed store).

use crate::config::LimitsConfig;
use crate::registry::ConnectionId;
use governor::{DefaultKeyedRateLimiter, Quota, RateLimiter};
use std::num::NonZeroU32;
use std::sync::Arc;

/// Rate limiters for the relay server.
#[derive(Clone)]
pub struct RateLimits {
    /// Limits inbound frames per connection.
    ///
    /// Configured via `limits.messages_per_minute`.
    message_limiter: Arc<DefaultKeyedRateLimiter<ConnectionId>>,
}

impl std::fmt::Debug for RateLimits {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimits")
            .field("message_limiter", &"KeyedLimiter<ConnectionId>")
            .field("tracked_keys", &self.message_keys_count())
            .finish()
    }
}

impl RateLimits {
    /// Create rate limiters from configuration.
    ///
    /// A zero rate is clamped to one frame per minute; `Config::validate`
    /// rejects it before this point in normal startup.
    pub fn new(config: &LimitsConfig) -> Self {
        let messages_per_minute =
            NonZeroU32::new(config.messages_per_minute).unwrap_or(NonZeroU32::MIN);
        let message_quota = Quota::per_minute(messages_per_minute);

        Self {
            message_limiter: Arc::new(RateLimiter::keyed(message_quota)),
        }
    }

    /// Check if one more frame from `conn` is allowed.
    ///
    /// # Returns
    ///
    /// `Ok(())` if allowed, `Err` if rate limited.
    pub fn check_message(&self, conn: ConnectionId) -> Result<(), RateLimitError> {
        self.message_limiter
            .check_key(&conn)
            .map_err(|_| RateLimitError::MessageLimitExceeded)
    }

    /// Get the number of tracked message keys (for metrics).
    pub fn message_keys_count(&self) -> usize {
        self.message_limiter.len()
    }

    /// Evict stale entries from the keyed limiter.
    ///
    /// Closed connections leave entries behind. `retain_recent()` removes
    /// entries whose cells have fully recharged. Called from the cleanup task.
    pub fn shrink(&self) {
        self.message_limiter.retain_recent();
    }
}

/// Rate limit error types.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RateLimitError {
    /// Too many frames from this connection.
    #[error("message rate limit exceeded")]
    MessageLimitExceeded,
}

//! Background cleanup task for rate limiter state.
//!
//! Closed connections leave keys behind in the keyed rate limiter. This task
//! runs periodically and evicts keys whose quota has fully recharged.

use crate::config::CleanupConfig;
use crate::server::SignalRelay;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::interval;

/// Spawn a background cleanup task.
///
/// Returns a handle that can be used to abort the task.
pub fn spawn_cleanup_task(
    relay: Arc<SignalRelay>,
    config: CleanupConfig,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        if !config.enabled {
            tracing::info!("Cleanup task disabled");
            return;
        }

        let interval_secs = config.interval_secs.max(1);
        tracing::info!("Cleanup task started (interval: {}s)", interval_secs);

        let mut timer = interval(Duration::from_secs(interval_secs));

        loop {
            timer.tick().await;
            run_once(&relay);
        }
    })
}

/// One cleanup pass. Returns the number of evicted limiter keys.
pub fn run_once(relay: &SignalRelay) -> usize {
    let before = relay.rate_limits().message_keys_count();
    relay.rate_limits().shrink();
    let evicted = before.saturating_sub(relay.rate_limits().message_keys_count());

    if evicted > 0 {
        tracing::info!("Cleanup: evicted {} idle rate limiter keys", evicted);
    } else {
        tracing::debug!(
            registrations = relay.registry().len(),
            connections = relay.active_connections(),
            "Cleanup: nothing to evict"
        );
    }
    evicted
}

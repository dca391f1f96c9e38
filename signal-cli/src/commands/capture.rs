//! Request a face or ID capture from the customer.

use anyhow::Result;
use signal_core::{AgentSession, CaptureKind};
use std::time::Duration;

use super::{recipient, Endpoint};

/// Run the capture command.
///
/// Sends the ready notice, waits `delay_ms`, then sends the trigger.
pub async fn run(endpoint: &Endpoint, to: &str, kind: CaptureKind, delay_ms: u64) -> Result<()> {
    let to = recipient(to)?;
    let [ready, trigger] = AgentSession::with_default_questions().request_capture(kind);

    let client = endpoint.connect().await?;
    client.send_outbound(&to, &ready).await?;
    println!("Sent {} to {}", ready.kind.as_str(), to);

    tokio::time::sleep(Duration::from_millis(delay_ms)).await;

    client.send_outbound(&to, &trigger).await?;
    println!("Sent {} to {}", trigger.kind.as_str(), to);
    client.disconnect().await?;

    Ok(())
}

//! Send a message of any type.

use anyhow::{Context, Result};
use serde_json::value::RawValue;
use signal_types::RawPayload;

use super::{recipient, Endpoint};

/// Run the send command.
pub async fn run(endpoint: &Endpoint, to: &str, kind: &str, payload: Option<&str>) -> Result<()> {
    let to = recipient(to)?;
    let payload = parse_payload(payload)?;

    let client = endpoint.connect().await?;
    client.send_raw(kind, &to, payload).await?;
    client.disconnect().await?;

    println!("Sent {} to {}", kind, to);
    Ok(())
}

/// Validate `--payload` as JSON, keeping the text as typed. Absent means no
/// payload on the wire.
fn parse_payload(raw: Option<&str>) -> Result<RawPayload> {
    raw.map(|text| RawValue::from_string(text.to_string()).context("Payload is not valid JSON"))
        .transpose()
}

//! Print forwarded envelopes until interrupted.

use anyhow::{Context, Result};

use super::Endpoint;

/// Run the listen command.
pub async fn run(endpoint: &Endpoint) -> Result<()> {
    let client = endpoint.connect().await?;
    eprintln!("Listening as {} (Ctrl-C to stop)", client.name());

    loop {
        tokio::select! {
            received = client.recv() => {
                let envelope = received.context("Connection to relay lost")?;
                println!("{}", envelope.to_json()?);
            }
            _ = tokio::signal::ctrl_c() => {
                break;
            }
        }
    }

    client.disconnect().await?;
    Ok(())
}

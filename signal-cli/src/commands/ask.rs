//! Ask the customer a single question.

use anyhow::Result;
use signal_core::AgentSession;

use super::{recipient, Endpoint};

/// Run the ask command.
pub async fn run(endpoint: &Endpoint, to: &str, question: &str) -> Result<()> {
    let to = recipient(to)?;
    let mut session = AgentSession::new(vec![question.to_string()]);
    let Some(outbound) = session.ask(0) else {
        anyhow::bail!("No question to ask");
    };

    let client = endpoint.connect().await?;
    client.send_outbound(&to, &outbound).await?;
    client.disconnect().await?;

    println!("Asked {}: {}", to, question);
    Ok(())
}

//! Hand a call group id to the customer.

use anyhow::Result;
use signal_core::AgentSession;
use uuid::Uuid;

use super::{recipient, Endpoint};

/// Run the call command.
pub async fn run(endpoint: &Endpoint, to: &str, group_id: Option<String>) -> Result<()> {
    let to = recipient(to)?;
    let group_id = group_id.unwrap_or_else(|| Uuid::new_v4().to_string());
    let outbound = AgentSession::with_default_questions().initiate_call(&group_id);

    let client = endpoint.connect().await?;
    client.send_outbound(&to, &outbound).await?;
    client.disconnect().await?;

    // Printed so the agent can join the same call group
    println!("{}", group_id);
    Ok(())
}

//! Fetch calling-SDK credentials.

use anyhow::{Context, Result};
use signal_client::TokenClient;

/// Run the token command.
pub async fn run(base: &str) -> Result<()> {
    let client = TokenClient::new(base)?;
    let credentials = client
        .fetch()
        .await
        .with_context(|| format!("Failed to fetch token from {}", client.endpoint()))?;

    println!("userId: {}", credentials.user_id);
    println!("token:  {}", credentials.token);
    Ok(())
}

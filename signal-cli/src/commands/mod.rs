//! CLI command implementations.

pub mod ask;
pub mod call;
pub mod capture;
pub mod listen;
pub mod send;
pub mod token;

use anyhow::{Context, Result};
use signal_client::{ClientConfig, SignalClient, WebSocketTransport};
use signal_core::CaptureKind;
use signal_types::ParticipantName;

/// Where and as whom to connect.
#[derive(Debug, Clone)]
pub struct Endpoint {
    relay: String,
    name: Option<String>,
}

impl Endpoint {
    /// Bundle the global relay flags.
    pub fn new(relay: &str, name: Option<&str>) -> Self {
        Self {
            relay: relay.to_string(),
            name: name.map(str::to_string),
        }
    }

    /// Connect to the relay and register.
    ///
    /// The relay sends no acknowledgement, so success only means the
    /// register frame was written.
    pub async fn connect(&self) -> Result<SignalClient<WebSocketTransport>> {
        let name = self
            .name
            .as_deref()
            .context("--name is required for this command")?;
        let config = ClientConfig::new(&self.relay, name)?;
        let client = SignalClient::new(config, WebSocketTransport::new());
        client
            .connect()
            .await
            .with_context(|| format!("Failed to connect to {}", self.relay))?;
        tracing::debug!(relay = %self.relay, name, "registered");
        Ok(client)
    }
}

/// Parse a recipient name from the command line.
pub fn recipient(to: &str) -> Result<ParticipantName> {
    ParticipantName::new(to).with_context(|| format!("Invalid recipient '{}'", to))
}

/// `--kind` values for the capture command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum CaptureArg {
    /// Customer's face
    Face,
    /// Customer's identity document
    Id,
}

impl From<CaptureArg> for CaptureKind {
    fn from(arg: CaptureArg) -> Self {
        match arg {
            CaptureArg::Face => CaptureKind::Face,
            CaptureArg::Id => CaptureKind::Id,
        }
    }
}

//! # signal-cli
//!
//! CLI tool for driving the vkyc signalling relay by hand.
//!
//! ## Commands
//!
//! - `listen`: Register and print every forwarded envelope
//! - `send`: Send an arbitrary message
//! - `ask`: Ask the customer a question
//! - `capture`: Request a face or ID capture
//! - `call`: Hand a call group id to the customer
//! - `token`: Fetch calling-SDK credentials
//!
//! ## Example
//!
//! ```bash
//! # Customer side
//! signal-cli --name customer1 listen
//!
//! # Agent side
//! signal-cli --name agent1 ask customer1 "What is your full name?"
//! signal-cli --name agent1 capture customer1 --kind face
//! signal-cli --name agent1 call customer1
//!
//! # Credentials
//! signal-cli token --base http://127.0.0.1:8080
//! ```

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

use commands::{ask, call, capture, listen, send, token, CaptureArg, Endpoint};

/// CLI tool for driving the vkyc signalling relay.
#[derive(Parser, Debug)]
#[command(name = "signal-cli")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Relay WebSocket URL
    #[arg(
        long,
        global = true,
        env = "SIGNAL_RELAY_URL",
        default_value = "ws://127.0.0.1:8080/ws"
    )]
    relay: String,

    /// Participant name to register under
    #[arg(long, short, global = true)]
    name: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Register and print every forwarded envelope as one JSON line
    Listen,

    /// Send a message of any type
    Send {
        /// Recipient participant name
        to: String,

        /// Message type
        #[arg(value_name = "TYPE")]
        kind: String,

        /// JSON payload
        #[arg(long, short)]
        payload: Option<String>,
    },

    /// Ask the recipient a question
    Ask {
        /// Recipient participant name
        to: String,

        /// Question text
        question: String,
    },

    /// Announce a capture, wait, then trigger it
    Capture {
        /// Recipient participant name
        to: String,

        /// What to capture
        #[arg(long, value_enum)]
        kind: CaptureArg,

        /// Delay between the ready notice and the trigger
        #[arg(long, default_value = "2000")]
        delay_ms: u64,
    },

    /// Hand a call group id to the recipient
    Call {
        /// Recipient participant name
        to: String,

        /// Call group id (a fresh UUID if omitted)
        #[arg(long)]
        group_id: Option<String>,
    },

    /// Fetch calling-SDK credentials from the relay's token route
    Token {
        /// HTTP base URL of the relay
        #[arg(long, default_value = "http://127.0.0.1:8080")]
        base: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so `listen` output stays machine-readable
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let endpoint = Endpoint::new(&cli.relay, cli.name.as_deref());

    match cli.command {
        Commands::Listen => {
            listen::run(&endpoint).await?;
        }
        Commands::Send { to, kind, payload } => {
            send::run(&endpoint, &to, &kind, payload.as_deref()).await?;
        }
        Commands::Ask { to, question } => {
            ask::run(&endpoint, &to, &question).await?;
        }
        Commands::Capture { to, kind, delay_ms } => {
            capture::run(&endpoint, &to, kind.into(), delay_ms).await?;
        }
        Commands::Call { to, group_id } => {
            call::run(&endpoint, &to, group_id).await?;
        }
        Commands::Token { base } => {
            token::run(&base).await?;
        }
    }

    Ok(())
}

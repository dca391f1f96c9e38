//! signal-relay binary entry point.
//!
//! Usage:
//! ```bash
//! signal-relay --config relay.toml
//! SIGNAL_RELAY_BIND=127.0.0.1:9000 signal-relay
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use vkyc_signal_relay::cleanup::spawn_cleanup_task;
use vkyc_signal_relay::config::{Config, LogFormat};
use vkyc_signal_relay::http::build_router;
use vkyc_signal_relay::SignalRelay;

/// Signalling relay for identity verification sessions.
#[derive(Parser, Debug)]
#[command(name = "signal-relay", version, about)]
struct Args {
    /// Path to the TOML configuration file.
    #[arg(short, long, default_value = "relay.toml")]
    config: PathBuf,

    /// Override `server.bind_address`.
    #[arg(long, env = "SIGNAL_RELAY_BIND")]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = Config::load_or_default(&args.config)
        .with_context(|| format!("loading {}", args.config.display()))?;
    if let Some(bind) = args.bind {
        config.server.bind_address = bind;
    }

    init_tracing(config.server.log_format);

    let listener = tokio::net::TcpListener::bind(&config.server.bind_address)
        .await
        .with_context(|| format!("binding {}", config.server.bind_address))?;
    let addr = listener.local_addr().context("reading bound address")?;

    let cleanup = config.cleanup.clone();
    let relay = Arc::new(SignalRelay::new(config));
    let cleanup_handle = spawn_cleanup_task(relay.clone(), cleanup);

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        "signal-relay listening on {} (ws://{}/ws)",
        addr,
        addr
    );

    axum::serve(listener, build_router(relay))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving HTTP")?;

    cleanup_handle.abort();
    tracing::info!("signal-relay stopped");
    Ok(())
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Pretty => builder.init(),
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

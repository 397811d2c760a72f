//! Signaling relay - Entry Point
//!
//! Reads configuration, starts the listener and serves connections.

use tracing_subscriber::EnvFilter;

use signal_relay::{RelayConfig, RelayServer};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging with environment filter
    // Use RUST_LOG env var to control log level
    // e.g., RUST_LOG=debug or RUST_LOG=signal_relay=trace
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("signal_relay=info")),
        )
        .init();

    let config = RelayConfig::from_env()?;
    let server = RelayServer::bind(config).await?;
    server.run().await;

    Ok(())
}

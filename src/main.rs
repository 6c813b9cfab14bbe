//! agent-bridge - HTTP server entry point.
//!
//! Starts the HTTP server that bridges callers to the upstream agent.

use agent_bridge::{api, config::Config};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "agent_bridge=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env()?;
    info!("Bridging upstream agent at {}", config.upstream_url);

    // Start HTTP server
    api::serve(config).await?;

    Ok(())
}

//! taskloop - HTTP Server Entry Point
//!
//! Starts the control process that exposes the task lifecycle API.

use taskloop::{api, Config};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "taskloop=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env()?;
    info!(
        "Loaded configuration: workspaces_root={}, default_max_iterations={}, agent_cli={}",
        config.workspaces_root.display(),
        config.default_max_iterations,
        config.agent_cli_path
    );

    // Start HTTP server
    api::serve(config).await?;

    Ok(())
}

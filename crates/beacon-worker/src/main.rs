use anyhow::Result;
use beacon_store::StoreConfig;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "beacon_worker=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("beacon-worker starting...");

    let store_config = StoreConfig::from_env()?;
    tracing::info!(mode = ?store_config.mode, "Relay store configured");

    // Blasts are spawned in-process by the API; this binary is passive
    // and exists so deployments can split the sender out later
    tracing::info!("Worker running in passive mode (blasts handled by API)");
    tracing::info!("Worker ready, waiting for shutdown signal...");
    tokio::signal::ctrl_c().await?;

    tracing::info!("Worker shutdown complete");
    Ok(())
}

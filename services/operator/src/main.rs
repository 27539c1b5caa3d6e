use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::watch;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use fleetd_operator::config::Config;
use fleetd_operator::worker::OperatorWorker;
use fleetd_store::{MemoryStore, Store};

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env()?;

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.log_level.clone())),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    info!(
        sync_interval_secs = config.sync_interval_secs,
        "Starting fleetd operator"
    );

    let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
    let worker = OperatorWorker::new(
        store.clone(),
        Duration::from_secs(config.sync_interval_secs),
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handle = tokio::spawn(async move {
        worker.run(shutdown_rx).await;
    });

    tokio::signal::ctrl_c()
        .await
        .context("waiting for shutdown signal")?;
    info!("Received shutdown signal");

    let _ = shutdown_tx.send(true);
    let _ = handle.await;

    info!("Operator shutdown complete");
    Ok(())
}

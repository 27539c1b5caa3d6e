use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::watch;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use fleetd_agent::config::Config;
use fleetd_agent::grpc::GrpcLoader;
use fleetd_agent::reconciler::AgentReconciler;
use fleetd_api::{Node, ProgramKind};
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
        node = %config.node_name,
        loader = %config.loader_endpoint,
        "Starting fleetd node agent"
    );

    let loader = GrpcLoader::connect(
        &config.loader_endpoint,
        Duration::from_secs(config.loader_timeout_secs),
    )
    .await
    .context("connecting to the loader daemon")?;
    let loader = Arc::new(loader);

    let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
    store
        .put_node(Node {
            name: config.node_name.clone(),
            labels: config.node_labels.clone(),
            interfaces: config.interfaces.clone(),
        })
        .await
        .context("registering this node")?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // One reconciler per program kind, sharing the loader connection.
    let mut handles = Vec::new();
    for kind in ProgramKind::ALL {
        let reconciler = AgentReconciler::new(
            store.clone(),
            loader.clone(),
            config.node_name.clone(),
            kind,
            Duration::from_secs(config.reconcile_interval_secs),
        );
        let shutdown_rx = shutdown_rx.clone();
        handles.push(tokio::spawn(async move {
            reconciler.run(shutdown_rx).await;
        }));
    }

    tokio::signal::ctrl_c()
        .await
        .context("waiting for shutdown signal")?;
    info!("Received shutdown signal");

    let _ = shutdown_tx.send(true);
    for handle in handles {
        let _ = handle.await;
    }

    info!("Node agent shutdown complete");
    Ok(())
}

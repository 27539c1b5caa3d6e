//! Operator background worker.
//!
//! Runs the aggregation loop over every spec on a periodic interval.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, error, info, instrument};

use fleetd_store::Store;

use crate::aggregator::{Aggregation, Aggregator};

/// What one pass over all specs did.
#[derive(Debug, Default, Clone, Copy)]
pub struct SyncStats {
    pub specs: usize,
    pub updated: usize,
    pub released: usize,
    pub conflicts: usize,
}

/// Worker that aggregates all specs on an interval.
pub struct OperatorWorker {
    store: Arc<dyn Store>,
    aggregator: Aggregator,
    interval: Duration,
}

impl OperatorWorker {
    pub fn new(store: Arc<dyn Store>, interval: Duration) -> Self {
        Self {
            aggregator: Aggregator::new(store.clone()),
            store,
            interval,
        }
    }

    /// Run until shutdown is signaled.
    #[instrument(skip(self, shutdown))]
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!(
            interval_secs = self.interval.as_secs(),
            "Starting operator worker"
        );

        let mut interval = tokio::time::interval(self.interval);
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    match self.sync_all().await {
                        Ok(stats) if stats.updated > 0 || stats.released > 0 => {
                            info!(
                                specs = stats.specs,
                                updated = stats.updated,
                                released = stats.released,
                                "Aggregation pass complete"
                            );
                        }
                        Ok(stats) => debug!(specs = stats.specs, "Aggregation pass complete"),
                        Err(e) => error!(error = %e, "Aggregation pass failed"),
                    }
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("Operator worker shutting down");
                        break;
                    }
                }
            }
        }
    }

    /// Aggregate every spec once. Write conflicts are left for the next
    /// tick; fresh state is re-read then anyway.
    pub async fn sync_all(&self) -> anyhow::Result<SyncStats> {
        let specs = self.store.list_specs(None).await?;
        let mut stats = SyncStats {
            specs: specs.len(),
            ..SyncStats::default()
        };

        for spec in specs {
            let name = spec.name.clone();
            match self.aggregator.aggregate(spec).await {
                Ok(Aggregation::Updated) => stats.updated += 1,
                Ok(Aggregation::Released) => stats.released += 1,
                Ok(Aggregation::Unchanged) => {}
                Err(err) if err.is_conflict() => {
                    debug!(spec = %name, "Write conflict, retrying next tick");
                    stats.conflicts += 1;
                }
                Err(err) => return Err(err.into()),
            }
        }
        Ok(stats)
    }
}

//! In-process node: ledger, round tracker and aggregation broadcast.

use crate::config::NodeConfig;
use anyhow::{anyhow, Result};
use fedchain_ledger::Ledger;
use fedchain_tracker::{
    BroadcastPublisher, LedgerGateway, ListenerError, RoundTrackerService, TrackerHandle,
    TrackerMetrics,
};
use prometheus::Registry;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{error, info};

pub struct Node {
    pub ledger: Arc<Ledger>,
    pub publisher: Arc<BroadcastPublisher>,
    pub tracker: TrackerHandle,
    pub metrics: Arc<TrackerMetrics>,
    listener_task: JoinHandle<Result<(), ListenerError>>,
    service_task: JoinHandle<()>,
}

impl Node {
    /// Build the ledger and start the tracker tasks.
    pub fn start(config: &NodeConfig) -> Result<Self> {
        config.validate()?;

        let ledger = Arc::new(Ledger::in_memory(config.ledger.clone()));
        let publisher = Arc::new(BroadcastPublisher::new(config.tracker.publish_buffer_size));
        let metrics = Arc::new(TrackerMetrics::new(&Registry::new())?);

        let (mut service, mut listener) = RoundTrackerService::new(
            config.tracker.clone(),
            ledger.subscribe(),
            Arc::new(LedgerGateway::new(ledger.clone())),
            publisher.clone(),
            metrics.clone(),
        )
        .map_err(|e| anyhow!("failed to start round tracker: {e}"))?;
        let tracker = service.handle();

        let listener_task = tokio::spawn(async move { listener.run().await });
        let service_task = tokio::spawn(async move {
            if let Err(e) = service.run().await {
                error!(error = %e, "Round tracker service failed");
            }
        });

        if config.seed_ledger {
            ledger.submit("InitLedger", &[])?;
            info!("Ledger seeded");
        }

        Ok(Self {
            ledger,
            publisher,
            tracker,
            metrics,
            listener_task,
            service_task,
        })
    }

    /// Connect an aggregation listener.
    pub fn aggregation_listener(&self) -> broadcast::Receiver<String> {
        self.publisher.subscribe()
    }

    /// Stop the tracker tasks.
    pub async fn stop(self) -> Result<()> {
        self.listener_task.abort();
        let _ = self.listener_task.await;
        self.service_task.await?;
        Ok(())
    }
}

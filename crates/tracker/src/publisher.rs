//! Aggregation request publication.

use crate::error::{PublishError, PublishResult};
use async_trait::async_trait;
use fedchain_types::AggregationRequest;
use tokio::sync::broadcast;
use tracing::debug;

/// Downstream consumer of aggregation requests.
#[async_trait]
pub trait AggregationSink: Send + Sync {
    /// Deliver a request to every listener. Returns the number reached.
    async fn publish(&self, request: &AggregationRequest) -> PublishResult<usize>;
}

/// Fans aggregation requests out to every connected listener as JSON text.
#[derive(Clone)]
pub struct BroadcastPublisher {
    tx: broadcast::Sender<String>,
}

impl BroadcastPublisher {
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Connect a new listener.
    pub fn subscribe(&self) -> broadcast::Receiver<String> {
        self.tx.subscribe()
    }

    pub fn listener_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

#[async_trait]
impl AggregationSink for BroadcastPublisher {
    async fn publish(&self, request: &AggregationRequest) -> PublishResult<usize> {
        let message = request.to_json()?;
        let reached = self
            .tx
            .send(message)
            .map_err(|_| PublishError::NoListeners)?;
        debug!(round_id = %request.round_id, listeners = reached, "Aggregation request broadcast");
        Ok(reached)
    }
}

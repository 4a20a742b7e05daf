//! Ledger event listener.
//!
//! Consumes the ledger's ordered event stream, decodes each event and
//! forwards it to the tracker service over an mpsc channel.

use crate::error::{ListenerError, ListenerResult};
use fedchain_types::{ChaincodeEvent, LedgerEvent};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Ledger event listener.
pub struct EventListener {
    upstream: mpsc::UnboundedReceiver<ChaincodeEvent>,
    event_tx: mpsc::Sender<LedgerEvent>,
    shutdown_rx: Option<mpsc::Receiver<()>>,
    decode_failures: u64,
}

impl EventListener {
    /// Create a listener over a ledger subscription.
    ///
    /// # Arguments
    /// * `upstream` - Ledger event subscription
    /// * `event_tx` - Channel to the tracker service
    pub fn new(
        upstream: mpsc::UnboundedReceiver<ChaincodeEvent>,
        event_tx: mpsc::Sender<LedgerEvent>,
    ) -> Self {
        Self {
            upstream,
            event_tx,
            shutdown_rx: None,
            decode_failures: 0,
        }
    }

    /// Set the shutdown receiver for graceful termination.
    pub fn with_shutdown(mut self, shutdown_rx: mpsc::Receiver<()>) -> Self {
        self.shutdown_rx = Some(shutdown_rx);
        self
    }

    /// Events skipped because they could not be decoded.
    pub fn decode_failures(&self) -> u64 {
        self.decode_failures
    }

    /// Run until shutdown or until the upstream stream ends.
    ///
    /// There is no reconnect: an ended stream returns
    /// [`ListenerError::Subscription`] and the process is expected to be
    /// restarted externally.
    pub async fn run(&mut self) -> ListenerResult<()> {
        info!("Starting ledger event listener");

        loop {
            tokio::select! {
                maybe_event = self.upstream.recv() => {
                    match maybe_event {
                        Some(raw) => self.forward(raw).await?,
                        None => {
                            warn!("Ledger event stream ended");
                            return Err(ListenerError::Subscription(
                                "ledger event stream ended".to_string(),
                            ));
                        }
                    }
                }
                _ = wait_for_shutdown(&mut self.shutdown_rx) => {
                    info!("Ledger event listener stopped gracefully");
                    return Ok(());
                }
            }
        }
    }

    async fn forward(&mut self, raw: ChaincodeEvent) -> ListenerResult<()> {
        let event = match raw.decode() {
            Ok(event) => event,
            Err(e) => {
                self.decode_failures += 1;
                warn!(
                    tx_seq = raw.tx_seq,
                    event = %raw.event_name,
                    error = %e,
                    "Skipping undecodable ledger event"
                );
                return Ok(());
            }
        };

        debug!(tx_seq = raw.tx_seq, event = %raw.event_name, "Ledger event received");
        self.event_tx
            .send(event)
            .await
            .map_err(|_| ListenerError::Subscription("event channel closed".to_string()))
    }
}

async fn wait_for_shutdown(shutdown_rx: &mut Option<mpsc::Receiver<()>>) {
    match shutdown_rx {
        Some(rx) => {
            let _ = rx.recv().await;
        }
        None => std::future::pending::<()>().await,
    }
}

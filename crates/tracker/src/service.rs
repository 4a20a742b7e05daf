//! Round tracker service.
//!
//! Owns the tracker state and reacts to ledger events:
//!
//! - `ROUND_STARTED`: resolve the round's participants and start tracking it
//! - `MODEL_UPLOADED`: record the submission, resolving unknown rounds lazily,
//!   and publish `START_AGGREGATION` once every expected participant is in
//! - `AGGREGATED_MODEL_SUBMITTED`: mark the round finalized
//!
//! Publication is at-most-once: a round is marked triggered before the
//! request goes out, and a failed publication is never retried.

use crate::config::TrackerConfig;
use crate::error::{TrackerError, TrackerResult};
use crate::gateway::RoundDirectory;
use crate::listener::EventListener;
use crate::metrics::TrackerMetrics;
use crate::publisher::AggregationSink;
use crate::state::{RoundInfo, RoundTracker, SubmissionOutcome};
use fedchain_types::{AggregationRequest, ChaincodeEvent, LedgerEvent};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, error, info, warn};

/// Read-only view of the tracker state, cloneable across tasks.
#[derive(Clone)]
pub struct TrackerHandle {
    state: Arc<Mutex<RoundTracker>>,
}

impl TrackerHandle {
    /// Snapshot of a tracked round.
    pub async fn round(&self, round_id: &str) -> Option<RoundInfo> {
        self.state.lock().await.round(round_id).cloned()
    }

    /// Rounds still waiting for submissions.
    pub async fn active_rounds(&self) -> Vec<String> {
        self.state.lock().await.active_rounds()
    }

    /// Number of rounds held, including triggered ones.
    pub async fn tracked_rounds(&self) -> usize {
        self.state.lock().await.len()
    }
}

/// Round tracker service.
pub struct RoundTrackerService {
    config: TrackerConfig,
    state: Arc<Mutex<RoundTracker>>,
    directory: Arc<dyn RoundDirectory>,
    sink: Arc<dyn AggregationSink>,
    metrics: Arc<TrackerMetrics>,
    event_rx: mpsc::Receiver<LedgerEvent>,
    shutdown_tx: mpsc::Sender<()>,
}

impl RoundTrackerService {
    /// Create the service and the listener that feeds it.
    ///
    /// Both halves must be run; the service stops once the listener does.
    pub fn new(
        config: TrackerConfig,
        upstream: mpsc::UnboundedReceiver<ChaincodeEvent>,
        directory: Arc<dyn RoundDirectory>,
        sink: Arc<dyn AggregationSink>,
        metrics: Arc<TrackerMetrics>,
    ) -> TrackerResult<(Self, EventListener)> {
        config.validate()?;

        let (event_tx, event_rx) = mpsc::channel(config.event_buffer_size);
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        let listener = EventListener::new(upstream, event_tx).with_shutdown(shutdown_rx);

        let state = Arc::new(Mutex::new(RoundTracker::new(
            config.default_participants.clone(),
        )));

        Ok((
            Self {
                config,
                state,
                directory,
                sink,
                metrics,
                event_rx,
                shutdown_tx,
            },
            listener,
        ))
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    pub fn handle(&self) -> TrackerHandle {
        TrackerHandle {
            state: Arc::clone(&self.state),
        }
    }

    /// Ask the listener to stop.
    pub async fn shutdown(&self) {
        let _ = self.shutdown_tx.send(()).await;
    }

    /// Process events until the listener stops.
    pub async fn run(&mut self) -> TrackerResult<()> {
        info!(
            default_participants = ?self.config.default_participants,
            "Starting round tracker service"
        );

        while let Some(event) = self.event_rx.recv().await {
            if let Err(e) = self.handle_event(event).await {
                warn!(error = %e, "Error handling ledger event");
            }
        }

        info!("Round tracker service stopped");
        Ok(())
    }

    /// Apply one ledger event.
    pub async fn handle_event(&self, event: LedgerEvent) -> TrackerResult<()> {
        let name = event.name();
        let result = self.apply(event).await;
        self.metrics
            .events_processed_total
            .with_label_values(&[name])
            .inc();
        result
    }

    async fn apply(&self, event: LedgerEvent) -> TrackerResult<()> {
        match event {
            LedgerEvent::RoundStarted(e) => self.on_round_started(&e.round_id).await,
            LedgerEvent::ModelUploaded(e) => {
                self.on_model_uploaded(&e.round_id, &e.bank_id, &e.model_uri)
                    .await
            }
            LedgerEvent::AggregatedModelSubmitted(e) => {
                if self.state.lock().await.finalize(&e.round_id) {
                    info!(round_id = %e.round_id, model_uri = %e.model_uri, "Round finalized");
                } else {
                    debug!(round_id = %e.round_id, "Aggregated model for untracked round");
                }
                Ok(())
            }
            LedgerEvent::ReputationUpdated(e) => {
                debug!(
                    participant = %e.participant_id,
                    old_score = e.old_score,
                    new_score = e.new_score,
                    "Reputation updated"
                );
                Ok(())
            }
            LedgerEvent::QualityRecorded(e) => {
                debug!(
                    round_id = %e.round_id,
                    average_quality = e.average_quality,
                    "Quality metrics recorded"
                );
                Ok(())
            }
        }
    }

    async fn on_round_started(&self, round_id: &str) -> TrackerResult<()> {
        if self.state.lock().await.is_tracked(round_id) {
            debug!(round_id = %round_id, "Round already tracked");
            return Ok(());
        }

        // Lock is not held across the lookup.
        let participants = self.directory.participants(round_id).await?;
        self.track(round_id, participants).await;
        Ok(())
    }

    async fn on_model_uploaded(
        &self,
        round_id: &str,
        participant_id: &str,
        model_uri: &str,
    ) -> TrackerResult<()> {
        let outcome = self
            .state
            .lock()
            .await
            .record_submission(round_id, participant_id, model_uri);

        let outcome = match outcome {
            SubmissionOutcome::Untracked => {
                debug!(round_id = %round_id, "Submission for untracked round; resolving");
                let participants = match self.directory.participants(round_id).await {
                    Ok(participants) => participants,
                    Err(e) => {
                        // Known limitation: the submission is lost.
                        self.metrics.submissions_dropped_total.inc();
                        warn!(
                            round_id = %round_id,
                            participant = %participant_id,
                            error = %e,
                            "Dropping submission for unresolvable round"
                        );
                        return Err(e);
                    }
                };
                self.track(round_id, participants).await;
                self.state
                    .lock()
                    .await
                    .record_submission(round_id, participant_id, model_uri)
            }
            other => other,
        };

        match outcome {
            SubmissionOutcome::Pending { missing } => {
                self.metrics.submissions_recorded_total.inc();
                info!(
                    round_id = %round_id,
                    participant = %participant_id,
                    missing = ?missing,
                    "Submission recorded"
                );
                Ok(())
            }
            SubmissionOutcome::Ready(request) => {
                self.metrics.submissions_recorded_total.inc();
                self.metrics.aggregations_triggered_total.inc();
                info!(
                    round_id = %round_id,
                    submissions = request.submissions.len(),
                    "All expected participants submitted; triggering aggregation"
                );
                self.publish(request).await
            }
            SubmissionOutcome::Closed => {
                debug!(
                    round_id = %round_id,
                    participant = %participant_id,
                    "Round already triggered; submission ignored"
                );
                Ok(())
            }
            SubmissionOutcome::Untracked => Err(TrackerError::Lookup {
                round_id: round_id.to_string(),
                reason: "round still untracked after lookup".to_string(),
            }),
        }
    }

    async fn track(&self, round_id: &str, participants: Vec<String>) {
        let mut state = self.state.lock().await;
        if state.track(round_id, participants) {
            self.metrics.tracked_rounds.set(state.len() as i64);
            if let Some(tracked) = state.round(round_id) {
                info!(
                    round_id = %round_id,
                    expected = ?tracked.expected_participants,
                    "Tracking round"
                );
            }
        }
    }

    async fn publish(&self, request: AggregationRequest) -> TrackerResult<()> {
        match self.sink.publish(&request).await {
            Ok(listeners) => {
                info!(round_id = %request.round_id, listeners, "START_AGGREGATION published");
                Ok(())
            }
            Err(e) => {
                self.metrics.publish_failures_total.inc();
                error!(
                    round_id = %request.round_id,
                    error = %e,
                    "Failed to publish aggregation request; not retrying"
                );
                Err(e.into())
            }
        }
    }
}

//! Round lookups against the ledger.

use crate::error::{TrackerError, TrackerResult};
use async_trait::async_trait;
use fedchain_ledger::{Ledger, MemoryWorldState, WorldState};
use fedchain_types::TrainingRound;
use std::sync::Arc;
use tracing::debug;

/// Source of a round's participant list.
#[async_trait]
pub trait RoundDirectory: Send + Sync {
    /// Explicit participants of a round; empty when the round has none.
    async fn participants(&self, round_id: &str) -> TrackerResult<Vec<String>>;
}

/// [`RoundDirectory`] that queries an in-process ledger.
pub struct LedgerGateway<S: WorldState = MemoryWorldState> {
    ledger: Arc<Ledger<S>>,
}

impl<S: WorldState> LedgerGateway<S> {
    pub fn new(ledger: Arc<Ledger<S>>) -> Self {
        Self { ledger }
    }

    /// Fetch a round by id.
    pub fn round(&self, round_id: &str) -> TrackerResult<TrainingRound> {
        let lookup_error = |reason: String| TrackerError::Lookup {
            round_id: round_id.to_string(),
            reason,
        };
        let bytes = self
            .ledger
            .evaluate("GetTrainingRound", &[round_id])
            .map_err(|e| lookup_error(e.to_string()))?;
        serde_json::from_slice(&bytes).map_err(|e| lookup_error(e.to_string()))
    }
}

#[async_trait]
impl<S: WorldState + 'static> RoundDirectory for LedgerGateway<S> {
    async fn participants(&self, round_id: &str) -> TrackerResult<Vec<String>> {
        let round = self.round(round_id)?;
        debug!(
            round_id = %round_id,
            participants = round.participants.len(),
            "Fetched round participants"
        );
        Ok(round.participants)
    }
}

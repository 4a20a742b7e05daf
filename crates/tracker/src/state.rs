//! Tracker state machine.
//!
//! Pure bookkeeping with no I/O: which rounds are tracked, who each round
//! expects, who has submitted, and whether aggregation has fired. The
//! service wraps it in a single async mutex.

use fedchain_types::AggregationRequest;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

/// What the tracker knows about one round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoundInfo {
    pub round_id: String,
    pub expected_participants: Vec<String>,
    /// Participant ID -> model URI
    pub submissions: BTreeMap<String, String>,
    /// Set before the aggregation request is published; never cleared.
    pub aggregation_triggered: bool,
    /// Aggregated model recorded on the ledger.
    pub finalized: bool,
}

impl RoundInfo {
    fn new(round_id: &str, expected_participants: Vec<String>) -> Self {
        Self {
            round_id: round_id.to_string(),
            expected_participants,
            submissions: BTreeMap::new(),
            aggregation_triggered: false,
            finalized: false,
        }
    }

    /// Every expected participant has submitted.
    pub fn is_complete(&self) -> bool {
        self.expected_participants
            .iter()
            .all(|p| self.submissions.contains_key(p))
    }

    /// Expected participants that have not submitted yet.
    pub fn missing(&self) -> Vec<&str> {
        self.expected_participants
            .iter()
            .filter(|p| !self.submissions.contains_key(*p))
            .map(String::as_str)
            .collect()
    }

    /// Still waiting for submissions.
    pub fn is_active(&self) -> bool {
        !self.aggregation_triggered && !self.finalized
    }
}

/// Result of recording a submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionOutcome {
    /// Round is not tracked; resolve it and retry.
    Untracked,
    /// Recorded; still waiting on these participants.
    Pending { missing: Vec<String> },
    /// Recorded and the round just reached quorum. The round is already
    /// marked triggered; the request must be published exactly once.
    Ready(AggregationRequest),
    /// Round already triggered or finalized; the submission is ignored.
    Closed,
}

/// In-memory map of tracked rounds.
#[derive(Debug, Clone)]
pub struct RoundTracker {
    rounds: HashMap<String, RoundInfo>,
    default_participants: Vec<String>,
}

impl RoundTracker {
    pub fn new(default_participants: Vec<String>) -> Self {
        Self {
            rounds: HashMap::new(),
            default_participants,
        }
    }

    pub fn is_tracked(&self, round_id: &str) -> bool {
        self.rounds.contains_key(round_id)
    }

    /// Start tracking a round. An empty participant list means the configured
    /// default set. Returns `false` if the round was already tracked, in
    /// which case its state is left untouched.
    pub fn track(&mut self, round_id: &str, participants: Vec<String>) -> bool {
        if self.rounds.contains_key(round_id) {
            return false;
        }
        let expected = if participants.is_empty() {
            self.default_participants.clone()
        } else {
            participants
        };
        self.rounds
            .insert(round_id.to_string(), RoundInfo::new(round_id, expected));
        true
    }

    /// Record `participant_id`'s model for a round.
    pub fn record_submission(
        &mut self,
        round_id: &str,
        participant_id: &str,
        model_uri: &str,
    ) -> SubmissionOutcome {
        let Some(info) = self.rounds.get_mut(round_id) else {
            return SubmissionOutcome::Untracked;
        };
        if !info.is_active() {
            return SubmissionOutcome::Closed;
        }

        info.submissions
            .insert(participant_id.to_string(), model_uri.to_string());

        if info.is_complete() {
            info.aggregation_triggered = true;
            SubmissionOutcome::Ready(AggregationRequest::new(
                round_id,
                info.submissions.clone(),
            ))
        } else {
            SubmissionOutcome::Pending {
                missing: info.missing().into_iter().map(str::to_string).collect(),
            }
        }
    }

    /// Mark a round finalized. Returns `false` if it is not tracked.
    pub fn finalize(&mut self, round_id: &str) -> bool {
        match self.rounds.get_mut(round_id) {
            Some(info) => {
                info.finalized = true;
                true
            }
            None => false,
        }
    }

    pub fn round(&self, round_id: &str) -> Option<&RoundInfo> {
        self.rounds.get(round_id)
    }

    /// IDs of rounds still waiting for submissions, sorted.
    pub fn active_rounds(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .rounds
            .values()
            .filter(|info| info.is_active())
            .map(|info| info.round_id.clone())
            .collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.rounds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rounds.is_empty()
    }
}

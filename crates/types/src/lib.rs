//! Core types for the federated round ledger
//!
//! This crate provides the shared data model used by the ledger-side
//! contract (`fedchain-ledger`) and the off-chain round tracker
//! (`fedchain-tracker`). Field names serialize to the same JSON keys the
//! ledger stores in world state, so records written by one component can be
//! decoded by any other.

pub mod events;
pub mod history;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

pub use events::{
    AggregatedModelSubmitted, AggregationRequest, ChaincodeEvent, EventDecodeError, LedgerEvent,
    ModelUploaded, QualityRecorded, ReputationUpdated, RoundStarted, START_AGGREGATION,
};
pub use history::RollingHistory;

/// Unix timestamp in seconds.
pub type Timestamp = i64;

/// Number of reputation changes kept per participant.
pub const REPUTATION_HISTORY_CAP: usize = 10;

/// Number of quality scores kept per participant.
pub const QUALITY_HISTORY_CAP: usize = 10;

/// Score assigned to a participant the first time its reputation is read.
pub const DEFAULT_REPUTATION_SCORE: f64 = 0.5;

/// Number of most recent quality scores averaged into the current score.
pub const CURRENT_SCORE_WINDOW: usize = 3;

/// Training round lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RoundStatus {
    /// Round created, waiting for participants
    Initiated,
    /// Participants are training
    InProgress,
    /// Aggregated model recorded
    Completed,
    /// Round abandoned
    Failed,
}

impl RoundStatus {
    /// Rounds in these states are candidates for aggregation.
    pub fn is_active(&self) -> bool {
        matches!(self, RoundStatus::Initiated | RoundStatus::InProgress)
    }

    /// Wire representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            RoundStatus::Initiated => "INITIATED",
            RoundStatus::InProgress => "IN_PROGRESS",
            RoundStatus::Completed => "COMPLETED",
            RoundStatus::Failed => "FAILED",
        }
    }
}

impl fmt::Display for RoundStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a status string is not one of the known values.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown round status: {0}")]
pub struct ParseStatusError(pub String);

impl FromStr for RoundStatus {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "INITIATED" => Ok(RoundStatus::Initiated),
            "IN_PROGRESS" => Ok(RoundStatus::InProgress),
            "COMPLETED" => Ok(RoundStatus::Completed),
            "FAILED" => Ok(RoundStatus::Failed),
            other => Err(ParseStatusError(other.to_string())),
        }
    }
}

/// One federated-learning training cycle.
///
/// `end_time` is present exactly when `status` is [`RoundStatus::Completed`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrainingRound {
    #[serde(rename = "ID")]
    pub id: String,
    pub initiator: String,
    pub start_time: Timestamp,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<Timestamp>,
    pub status: RoundStatus,
    #[serde(default)]
    pub participants: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_weight_hash: Option<String>,
    #[serde(rename = "modelURI", default, skip_serializing_if = "Option::is_none")]
    pub model_uri: Option<String>,
    #[serde(default)]
    pub description: String,
}

impl TrainingRound {
    /// Create a freshly initiated round with no participants.
    pub fn new(
        id: impl Into<String>,
        initiator: impl Into<String>,
        description: impl Into<String>,
        start_time: Timestamp,
    ) -> Self {
        Self {
            id: id.into(),
            initiator: initiator.into(),
            start_time,
            end_time: None,
            status: RoundStatus::Initiated,
            participants: Vec::new(),
            model_weight_hash: None,
            model_uri: None,
            description: description.into(),
        }
    }

    /// Set the status, keeping `end_time` consistent with it.
    pub fn set_status(&mut self, status: RoundStatus, now: Timestamp) {
        self.status = status;
        self.end_time = match status {
            RoundStatus::Completed => Some(now),
            _ => None,
        };
    }

    /// Whether the participant is on the explicit list.
    pub fn has_participant(&self, participant_id: &str) -> bool {
        self.participants.iter().any(|p| p == participant_id)
    }
}

/// A participant's submitted model reference for one round.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelContribution {
    #[serde(rename = "ID")]
    pub id: String,
    #[serde(rename = "roundID")]
    pub round_id: String,
    #[serde(rename = "participantID")]
    pub participant_id: String,
    #[serde(rename = "submittedAt")]
    pub submitted_at: Timestamp,
    #[serde(rename = "weightHash")]
    pub weight_hash: String,
    #[serde(rename = "modelURI")]
    pub model_uri: String,
    #[serde(rename = "accuracyMetrics", default)]
    pub accuracy_metrics: BTreeMap<String, f64>,
    #[serde(rename = "trainingStats", default)]
    pub training_stats: BTreeMap<String, String>,
}

/// Response of a participant to a round invitation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticipationRecord {
    #[serde(rename = "ID")]
    pub id: String,
    #[serde(rename = "roundID")]
    pub round_id: String,
    #[serde(rename = "participantID")]
    pub participant_id: String,
    #[serde(rename = "invitedAt")]
    pub invited_at: Timestamp,
    #[serde(rename = "respondedAt")]
    pub responded_at: Timestamp,
    #[serde(rename = "hasAccepted")]
    pub has_accepted: bool,
    #[serde(default)]
    pub reason: String,
}

/// A single reputation score change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReputationChange {
    pub timestamp: Timestamp,
    pub old_score: f64,
    pub new_score: f64,
    pub reason: String,
    #[serde(rename = "roundID")]
    pub round_id: String,
}

/// Reputation score with its most recent changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReputationRecord {
    #[serde(rename = "participantID")]
    pub participant_id: String,
    pub score: f64,
    pub last_updated: Timestamp,
    #[serde(default)]
    pub history: RollingHistory<ReputationChange, REPUTATION_HISTORY_CAP>,
}

impl ReputationRecord {
    /// Fresh record with the default score and no history.
    pub fn new(participant_id: impl Into<String>, now: Timestamp) -> Self {
        Self {
            participant_id: participant_id.into(),
            score: DEFAULT_REPUTATION_SCORE,
            last_updated: now,
            history: RollingHistory::new(),
        }
    }

    /// Apply a new score, recording the change in the bounded history.
    pub fn apply(
        &mut self,
        new_score: f64,
        reason: impl Into<String>,
        round_id: impl Into<String>,
        now: Timestamp,
    ) -> ReputationChange {
        let change = ReputationChange {
            timestamp: now,
            old_score: self.score,
            new_score,
            reason: reason.into(),
            round_id: round_id.into(),
        };
        self.history.push(change.clone());
        self.score = new_score;
        self.last_updated = now;
        change
    }
}

/// Aggregate quality metrics recorded for a round.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QualityMetrics {
    #[serde(rename = "ID")]
    pub id: String,
    #[serde(rename = "roundID")]
    pub round_id: String,
    pub timestamp: Timestamp,
    pub threshold: f64,
    pub average_quality: f64,
    pub accepted_count: u32,
    pub rejected_count: u32,
    /// Participant ID -> quality score for this round
    pub participants: BTreeMap<String, f64>,
}

/// Round-level quality snapshot stored next to the metrics record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundQualitySnapshot {
    pub quality_threshold: f64,
    pub average_quality: f64,
    pub accepted_count: u32,
    pub rejected_count: u32,
}

/// Rolling quality history for one participant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantQualityData {
    #[serde(rename = "participantID")]
    pub participant_id: String,
    #[serde(default)]
    pub quality_history: RollingHistory<f64, QUALITY_HISTORY_CAP>,
    pub accepted_count: u64,
    pub rejected_count: u64,
    pub last_updated: Timestamp,
}

impl ParticipantQualityData {
    /// Empty history for a participant seen for the first time.
    pub fn new(participant_id: impl Into<String>, now: Timestamp) -> Self {
        Self {
            participant_id: participant_id.into(),
            quality_history: RollingHistory::new(),
            accepted_count: 0,
            rejected_count: 0,
            last_updated: now,
        }
    }

    /// Record one round's score against the round's threshold.
    pub fn record(&mut self, score: f64, threshold: f64, now: Timestamp) {
        self.quality_history.push(score);
        if score >= threshold {
            self.accepted_count += 1;
        } else {
            self.rejected_count += 1;
        }
        self.last_updated = now;
    }

    /// Mean of the most recent scores; 0.0 when there is no history.
    pub fn current_score(&self) -> f64 {
        let recent: Vec<f64> = self
            .quality_history
            .recent(CURRENT_SCORE_WINDOW)
            .copied()
            .collect();
        if recent.is_empty() {
            return 0.0;
        }
        recent.iter().sum::<f64>() / recent.len() as f64
    }
}

/// Read model over [`ParticipantQualityData`] with the derived current score.
///
/// Never persisted; built on every read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantQualitySummary {
    #[serde(flatten)]
    pub data: ParticipantQualityData,
    pub current_score: f64,
}

impl From<ParticipantQualityData> for ParticipantQualitySummary {
    fn from(data: ParticipantQualityData) -> Self {
        let current_score = data.current_score();
        Self {
            data,
            current_score,
        }
    }
}

/// General-purpose audit trail entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEvent {
    #[serde(rename = "ID")]
    pub id: String,
    pub event_type: String,
    pub timestamp: Timestamp,
    #[serde(rename = "actorID")]
    pub actor_id: String,
    #[serde(rename = "relatedID", default)]
    pub related_id: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

/// Answer of the global aggregation-readiness scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregationReadiness {
    pub ready: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub round_id: Option<String>,
    #[serde(rename = "uploadedCount", default, skip_serializing_if = "Option::is_none")]
    pub uploaded_count: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub participants: Option<Vec<String>>,
}

impl AggregationReadiness {
    /// No active round is ready.
    pub fn not_ready() -> Self {
        Self {
            ready: false,
            round_id: None,
            uploaded_count: None,
            participants: None,
        }
    }
}

/// Quorum status of a single round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundParticipationStatus {
    pub round_id: String,
    pub status: RoundStatus,
    pub ready: bool,
    #[serde(rename = "uploadedCount")]
    pub uploaded_count: usize,
    pub expected: Vec<String>,
    pub submitted: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_status_wire_format() {
        assert_eq!(
            serde_json::to_string(&RoundStatus::InProgress).unwrap(),
            "\"IN_PROGRESS\""
        );
        assert_eq!("COMPLETED".parse::<RoundStatus>(), Ok(RoundStatus::Completed));
        assert!("DONE".parse::<RoundStatus>().is_err());
        assert!(RoundStatus::Initiated.is_active());
        assert!(!RoundStatus::Failed.is_active());
    }

    #[test]
    fn test_round_json_keys() {
        let round = TrainingRound::new("round1", "dbs", "fraud model", 1_700_000_000);
        let json = serde_json::to_value(&round).unwrap();

        assert_eq!(json["ID"], "round1");
        assert_eq!(json["startTime"], 1_700_000_000);
        assert_eq!(json["status"], "INITIATED");
        assert!(json.get("endTime").is_none());
        assert!(json.get("modelURI").is_none());
    }

    #[test]
    fn test_end_time_follows_status() {
        let mut round = TrainingRound::new("r", "dbs", "", 10);
        round.set_status(RoundStatus::Completed, 20);
        assert_eq!(round.end_time, Some(20));

        round.set_status(RoundStatus::InProgress, 30);
        assert_eq!(round.end_time, None);
    }

    #[test]
    fn test_reputation_apply_records_change() {
        let mut record = ReputationRecord::new("dbs", 1);
        let change = record.apply(0.7, "good model", "round1", 2);

        assert_eq!(change.old_score, DEFAULT_REPUTATION_SCORE);
        assert_eq!(change.new_score, 0.7);
        assert_eq!(record.score, 0.7);
        assert_eq!(record.last_updated, 2);
        assert_eq!(record.history.len(), 1);
    }

    #[test]
    fn test_quality_current_score_uses_last_three() {
        let mut data = ParticipantQualityData::new("ing", 0);
        assert_eq!(data.current_score(), 0.0);

        for score in [0.1, 0.2, 0.6, 0.9] {
            data.record(score, 0.5, 1);
        }
        assert!((data.current_score() - (0.2 + 0.6 + 0.9) / 3.0).abs() < 1e-9);
        assert_eq!(data.accepted_count, 2);
        assert_eq!(data.rejected_count, 2);
    }

    #[test]
    fn test_quality_summary_flattens_data() {
        let mut data = ParticipantQualityData::new("ocbc", 0);
        data.record(0.8, 0.5, 5);
        let summary = ParticipantQualitySummary::from(data);

        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["participantID"], "ocbc");
        assert_eq!(json["currentScore"], 0.8);
        assert_eq!(json["qualityHistory"], serde_json::json!([0.8]));
    }

    #[test]
    fn test_not_ready_serializes_minimal() {
        let json = serde_json::to_string(&AggregationReadiness::not_ready()).unwrap();
        assert_eq!(json, "{\"ready\":false}");
    }
}

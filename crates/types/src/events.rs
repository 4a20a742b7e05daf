//! Ledger events and the outbound aggregation message.
//!
//! Events are the only channel by which off-chain components learn of
//! ledger state changes. On the wire an event is a name plus a JSON payload;
//! [`LedgerEvent`] is the typed view of the five names the ledger emits.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Event name for a newly created round.
pub const ROUND_STARTED: &str = "ROUND_STARTED";
/// Event name for a recorded model contribution.
pub const MODEL_UPLOADED: &str = "MODEL_UPLOADED";
/// Event name for a recorded final model.
pub const AGGREGATED_MODEL_SUBMITTED: &str = "AGGREGATED_MODEL_SUBMITTED";
/// Event name for a reputation change.
pub const REPUTATION_UPDATED: &str = "REPUTATION_UPDATED";
/// Event name for recorded quality metrics.
pub const QUALITY_RECORDED: &str = "QUALITY_RECORDED";
/// `event` field of the aggregation-start message.
pub const START_AGGREGATION: &str = "START_AGGREGATION";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundStarted {
    pub round_id: String,
    #[serde(default)]
    pub initiator: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelUploaded {
    pub round_id: String,
    pub bank_id: String,
    #[serde(default)]
    pub weight_hash: String,
    pub model_uri: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregatedModelSubmitted {
    pub round_id: String,
    pub weight_hash: String,
    pub model_uri: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReputationUpdated {
    pub participant_id: String,
    pub old_score: f64,
    pub new_score: f64,
    pub reason: String,
    pub round_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityRecorded {
    pub round_id: String,
    pub threshold: f64,
    pub average_quality: f64,
    pub accepted_count: u32,
    pub rejected_count: u32,
}

/// Typed ledger event.
#[derive(Debug, Clone, PartialEq)]
pub enum LedgerEvent {
    RoundStarted(RoundStarted),
    ModelUploaded(ModelUploaded),
    AggregatedModelSubmitted(AggregatedModelSubmitted),
    ReputationUpdated(ReputationUpdated),
    QualityRecorded(QualityRecorded),
}

/// Errors decoding a raw event into a [`LedgerEvent`].
#[derive(Debug, Error)]
pub enum EventDecodeError {
    /// Name is not one the ledger emits.
    #[error("unknown event name: {0}")]
    UnknownName(String),

    /// Payload does not match the named event.
    #[error("malformed {name} payload: {source}")]
    Payload {
        /// Event name.
        name: String,
        /// JSON error.
        #[source]
        source: serde_json::Error,
    },
}

impl LedgerEvent {
    /// Wire name of the event.
    pub fn name(&self) -> &'static str {
        match self {
            LedgerEvent::RoundStarted(_) => ROUND_STARTED,
            LedgerEvent::ModelUploaded(_) => MODEL_UPLOADED,
            LedgerEvent::AggregatedModelSubmitted(_) => AGGREGATED_MODEL_SUBMITTED,
            LedgerEvent::ReputationUpdated(_) => REPUTATION_UPDATED,
            LedgerEvent::QualityRecorded(_) => QUALITY_RECORDED,
        }
    }

    /// Round the event refers to, if any.
    pub fn round_id(&self) -> Option<&str> {
        match self {
            LedgerEvent::RoundStarted(e) => Some(&e.round_id),
            LedgerEvent::ModelUploaded(e) => Some(&e.round_id),
            LedgerEvent::AggregatedModelSubmitted(e) => Some(&e.round_id),
            LedgerEvent::QualityRecorded(e) => Some(&e.round_id),
            LedgerEvent::ReputationUpdated(e) if !e.round_id.is_empty() => Some(&e.round_id),
            LedgerEvent::ReputationUpdated(_) => None,
        }
    }

    /// JSON payload bytes.
    pub fn encode_payload(&self) -> Result<Vec<u8>, serde_json::Error> {
        match self {
            LedgerEvent::RoundStarted(e) => serde_json::to_vec(e),
            LedgerEvent::ModelUploaded(e) => serde_json::to_vec(e),
            LedgerEvent::AggregatedModelSubmitted(e) => serde_json::to_vec(e),
            LedgerEvent::ReputationUpdated(e) => serde_json::to_vec(e),
            LedgerEvent::QualityRecorded(e) => serde_json::to_vec(e),
        }
    }

    /// Decode a raw `(name, payload)` pair.
    pub fn decode(name: &str, payload: &[u8]) -> Result<Self, EventDecodeError> {
        let wrap = |source| EventDecodeError::Payload {
            name: name.to_string(),
            source,
        };
        let event = match name {
            ROUND_STARTED => LedgerEvent::RoundStarted(serde_json::from_slice(payload).map_err(wrap)?),
            MODEL_UPLOADED => {
                LedgerEvent::ModelUploaded(serde_json::from_slice(payload).map_err(wrap)?)
            }
            AGGREGATED_MODEL_SUBMITTED => {
                LedgerEvent::AggregatedModelSubmitted(serde_json::from_slice(payload).map_err(wrap)?)
            }
            REPUTATION_UPDATED => {
                LedgerEvent::ReputationUpdated(serde_json::from_slice(payload).map_err(wrap)?)
            }
            QUALITY_RECORDED => {
                LedgerEvent::QualityRecorded(serde_json::from_slice(payload).map_err(wrap)?)
            }
            other => return Err(EventDecodeError::UnknownName(other.to_string())),
        };
        Ok(event)
    }
}

/// Raw event as delivered to subscribers, in commit order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChaincodeEvent {
    /// Sequence number of the committing transaction.
    pub tx_seq: u64,
    /// Event name.
    pub event_name: String,
    /// JSON payload.
    pub payload: Vec<u8>,
}

impl ChaincodeEvent {
    /// Decode into a typed event.
    pub fn decode(&self) -> Result<LedgerEvent, EventDecodeError> {
        LedgerEvent::decode(&self.event_name, &self.payload)
    }
}

/// Message published to the aggregation collaborator once a round has quorum.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregationRequest {
    /// Always [`START_AGGREGATION`].
    pub event: String,
    pub round_id: String,
    /// Participant ID -> model URI
    pub submissions: BTreeMap<String, String>,
}

impl AggregationRequest {
    /// Build a start-aggregation message for a round.
    pub fn new(round_id: impl Into<String>, submissions: BTreeMap<String, String>) -> Self {
        Self {
            event: START_AGGREGATION.to_string(),
            round_id: round_id.into(),
            submissions,
        }
    }

    /// Encode as the JSON text sent to listeners.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_model_uploaded() {
        let payload = br#"{"round_id":"round1","bank_id":"dbs","weight_hash":"abc","model_uri":"s3://round1/dbs.weights"}"#;
        let event = LedgerEvent::decode(MODEL_UPLOADED, payload).unwrap();

        match event {
            LedgerEvent::ModelUploaded(e) => {
                assert_eq!(e.round_id, "round1");
                assert_eq!(e.bank_id, "dbs");
                assert_eq!(e.model_uri, "s3://round1/dbs.weights");
            }
            other => panic!("Expected ModelUploaded, got {:?}", other),
        }
    }

    #[test]
    fn test_round_started_accepts_id_only_payload() {
        let event = LedgerEvent::decode(ROUND_STARTED, br#"{"round_id":"r9"}"#).unwrap();
        assert_eq!(event.round_id(), Some("r9"));
        assert_eq!(event.name(), ROUND_STARTED);
    }

    #[test]
    fn test_decode_errors() {
        assert!(matches!(
            LedgerEvent::decode("SOMETHING_ELSE", b"{}"),
            Err(EventDecodeError::UnknownName(_))
        ));
        assert!(matches!(
            LedgerEvent::decode(MODEL_UPLOADED, b"not json"),
            Err(EventDecodeError::Payload { .. })
        ));
    }

    #[test]
    fn test_reputation_payload_keys() {
        let event = LedgerEvent::ReputationUpdated(ReputationUpdated {
            participant_id: "dbs".to_string(),
            old_score: 0.5,
            new_score: 0.7,
            reason: "good model".to_string(),
            round_id: "round1".to_string(),
        });
        let json: serde_json::Value =
            serde_json::from_slice(&event.encode_payload().unwrap()).unwrap();
        assert_eq!(json["participant_id"], "dbs");
        assert_eq!(json["old_score"], 0.5);
        assert_eq!(json["new_score"], 0.7);
    }

    #[test]
    fn test_aggregation_request_json() {
        let mut submissions = BTreeMap::new();
        submissions.insert("dbs".to_string(), "s3://a".to_string());
        let request = AggregationRequest::new("round1", submissions);

        let json: serde_json::Value = serde_json::from_str(&request.to_json().unwrap()).unwrap();
        assert_eq!(json["event"], "START_AGGREGATION");
        assert_eq!(json["round_id"], "round1");
        assert_eq!(json["submissions"]["dbs"], "s3://a");
    }
}

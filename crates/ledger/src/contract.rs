//! Name-based transaction dispatch.
//!
//! Clients invoke transactions by name with string arguments; complex values
//! travel as JSON text. Every response is JSON.

use crate::audit;
use crate::context::TxContext;
use crate::contributions::{self, ContributionSubmission};
use crate::error::{LedgerError, LedgerResult};
use crate::participation::{self, ParticipationResponse};
use crate::quality::{self, QualityReport};
use crate::quorum;
use crate::reputation;
use crate::rounds;
use fedchain_types::RoundStatus;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeMap;
use std::str::FromStr;

/// Round seeded by `InitLedger`.
pub const SEED_ROUND_ID: &str = "round0";
/// Audit event seeded by `InitLedger`.
pub const SEED_EVENT_ID: &str = "event0";
/// Audit event type of the seed entry.
pub const SYSTEM_INIT: &str = "SYSTEM_INIT";

/// Every transaction name the contract answers to.
pub const TRANSACTIONS: &[&str] = &[
    "InitLedger",
    "CreateTrainingRound",
    "GetTrainingRound",
    "GetAllTrainingRounds",
    "UpdateTrainingRoundStatus",
    "UpdateRoundParticipants",
    "OptInParticipant",
    "OptOutParticipant",
    "RecordModelContribution",
    "GetContributionsByRound",
    "RecordAggregatedModel",
    "RecordParticipation",
    "GetParticipationRecordsByRound",
    "GetParticipantReputation",
    "UpdateParticipantReputation",
    "GetAllReputations",
    "RecordQualityMetrics",
    "GetQualityMetricsForRound",
    "GetParticipantQualityData",
    "GetParticipantQualitySummary",
    "GetRoundQualitySnapshot",
    "CheckReadyForAggregation",
    "GetRoundParticipationStatus",
    "RecordEvent",
    "GetEvents",
];

/// The federated round contract.
pub struct Contract;

impl Contract {
    /// Run the named transaction inside `ctx`.
    pub fn invoke(ctx: &mut TxContext<'_>, name: &str, args: &[&str]) -> LedgerResult<Vec<u8>> {
        let args = Args::new(name, args);
        match name {
            "InitLedger" => {
                args.arity(0)?;
                respond(&init_ledger(ctx)?)
            }
            "CreateTrainingRound" => {
                args.arity(3)?;
                respond(&rounds::create_round(ctx, args.str(0), args.str(1), args.str(2))?)
            }
            "GetTrainingRound" => {
                args.arity(1)?;
                respond(&rounds::get_round(ctx, args.str(0))?)
            }
            "GetAllTrainingRounds" => {
                args.arity(0)?;
                respond(&rounds::list_rounds(ctx)?)
            }
            "UpdateTrainingRoundStatus" => {
                args.arity(2)?;
                let status: RoundStatus = args.parse(1)?;
                respond(&rounds::update_status(ctx, args.str(0), status)?)
            }
            "UpdateRoundParticipants" => {
                args.arity(2)?;
                let participants: Vec<String> = args.json(1)?;
                respond(&rounds::update_participants(ctx, args.str(0), participants)?)
            }
            "OptInParticipant" => {
                args.arity(2)?;
                respond(&rounds::opt_in(ctx, args.str(0), args.str(1))?)
            }
            "OptOutParticipant" => {
                args.arity(2)?;
                respond(&rounds::opt_out(ctx, args.str(0), args.str(1))?)
            }
            "RecordModelContribution" => {
                args.arity(7)?;
                let submission = ContributionSubmission {
                    id: args.string(0),
                    round_id: args.string(1),
                    participant_id: args.string(2),
                    weight_hash: args.string(3),
                    model_uri: args.string(4),
                    accuracy_metrics: args.json(5)?,
                    training_stats: args.json(6)?,
                };
                respond(&contributions::record_contribution(ctx, submission)?)
            }
            "GetContributionsByRound" => {
                args.arity(1)?;
                respond(&contributions::list_by_round(ctx, args.str(0))?)
            }
            "RecordAggregatedModel" => {
                args.arity(3)?;
                respond(&rounds::record_aggregated_model(
                    ctx,
                    args.str(0),
                    args.str(1),
                    args.str(2),
                )?)
            }
            "RecordParticipation" => {
                args.arity(6)?;
                let response = ParticipationResponse {
                    id: args.string(0),
                    round_id: args.string(1),
                    participant_id: args.string(2),
                    invited_at: args.parse(3)?,
                    has_accepted: args.parse(4)?,
                    reason: args.string(5),
                };
                respond(&participation::record_participation(ctx, response)?)
            }
            "GetParticipationRecordsByRound" => {
                args.arity(1)?;
                respond(&participation::participation_by_round(ctx, args.str(0))?)
            }
            "GetParticipantReputation" => {
                args.arity(1)?;
                let record = reputation::get_or_create(ctx, args.str(0))?;
                respond(record.get())
            }
            "UpdateParticipantReputation" => {
                args.arity(4)?;
                let score: f64 = args.parse(1)?;
                respond(&reputation::update_reputation(
                    ctx,
                    args.str(0),
                    score,
                    args.str(2),
                    args.str(3),
                )?)
            }
            "GetAllReputations" => {
                args.arity(0)?;
                respond(&reputation::all_reputations(ctx)?)
            }
            "RecordQualityMetrics" => {
                args.arity(7)?;
                let report = QualityReport {
                    id: args.string(0),
                    round_id: args.string(1),
                    threshold: args.parse(2)?,
                    average_quality: args.parse(3)?,
                    accepted_count: args.parse(4)?,
                    rejected_count: args.parse(5)?,
                    participant_scores: args.json(6)?,
                };
                respond(&quality::record_quality_metrics(ctx, report)?)
            }
            "GetQualityMetricsForRound" => {
                args.arity(1)?;
                respond(&quality::quality_for_round(ctx, args.str(0))?)
            }
            "GetParticipantQualityData" => {
                args.arity(1)?;
                respond(&quality::participant_quality(ctx, args.str(0))?)
            }
            "GetParticipantQualitySummary" => {
                args.arity(1)?;
                respond(&quality::participant_quality_summary(ctx, args.str(0))?)
            }
            "GetRoundQualitySnapshot" => {
                args.arity(1)?;
                respond(&quality::round_quality_snapshot(ctx, args.str(0))?)
            }
            "CheckReadyForAggregation" => {
                args.arity(0)?;
                respond(&quorum::check_ready_for_aggregation(ctx)?)
            }
            "GetRoundParticipationStatus" => {
                args.arity(1)?;
                respond(&quorum::round_participation_status(ctx, args.str(0))?)
            }
            "RecordEvent" => {
                args.arity(6)?;
                let metadata: BTreeMap<String, String> = args.json_or_default(5)?;
                respond(&audit::record_event(
                    ctx,
                    args.str(0),
                    args.str(1),
                    args.str(2),
                    args.str(3),
                    args.str(4),
                    metadata,
                )?)
            }
            "GetEvents" => {
                args.arity(1)?;
                respond(&audit::events_by_type(ctx, args.str(0))?)
            }
            other => Err(LedgerError::UnknownTransaction(other.to_string())),
        }
    }
}

/// Seed the demo round and the initialization audit entry.
pub fn init_ledger(ctx: &mut TxContext<'_>) -> LedgerResult<fedchain_types::TrainingRound> {
    let round = rounds::create_round(ctx, SEED_ROUND_ID, "system", "Initial demo training round")?;
    audit::record_event(
        ctx,
        SEED_EVENT_ID,
        SYSTEM_INIT,
        "system",
        "",
        "Federated learning ledger initialized",
        BTreeMap::new(),
    )?;
    Ok(round)
}

fn respond<T: Serialize + ?Sized>(value: &T) -> LedgerResult<Vec<u8>> {
    Ok(serde_json::to_vec(value)?)
}

/// Positional transaction arguments.
struct Args<'a> {
    name: &'a str,
    values: &'a [&'a str],
}

impl<'a> Args<'a> {
    fn new(name: &'a str, values: &'a [&'a str]) -> Self {
        Self { name, values }
    }

    fn arity(&self, expected: usize) -> LedgerResult<()> {
        if self.values.len() != expected {
            return Err(LedgerError::MalformedInput(format!(
                "{} takes {} argument(s), got {}",
                self.name,
                expected,
                self.values.len()
            )));
        }
        Ok(())
    }

    // Callers check arity first.
    fn str(&self, index: usize) -> &'a str {
        self.values.get(index).copied().unwrap_or_default()
    }

    fn string(&self, index: usize) -> String {
        self.str(index).to_string()
    }

    fn parse<T>(&self, index: usize) -> LedgerResult<T>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        let raw = self.str(index);
        raw.trim().parse().map_err(|e: T::Err| {
            LedgerError::MalformedInput(format!(
                "{} argument {}: cannot parse {:?}: {}",
                self.name, index, raw, e
            ))
        })
    }

    fn json<T: DeserializeOwned>(&self, index: usize) -> LedgerResult<T> {
        serde_json::from_str(self.str(index)).map_err(|e| {
            LedgerError::MalformedInput(format!(
                "{} argument {}: invalid JSON: {}",
                self.name, index, e
            ))
        })
    }

    fn json_or_default<T: DeserializeOwned + Default>(&self, index: usize) -> LedgerResult<T> {
        if self.str(index).trim().is_empty() {
            return Ok(T::default());
        }
        self.json(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::LedgerConfig;
    use crate::state::MemoryWorldState;

    fn invoke(ctx: &mut TxContext<'_>, name: &str, args: &[&str]) -> LedgerResult<serde_json::Value> {
        let bytes = Contract::invoke(ctx, name, args)?;
        Ok(serde_json::from_slice(&bytes).unwrap())
    }

    #[test]
    fn test_unknown_transaction() {
        let store = MemoryWorldState::new();
        let config = LedgerConfig::default();
        let mut ctx = TxContext::new(&store, &config, 0);

        let err = invoke(&mut ctx, "DeleteEverything", &[]).unwrap_err();
        assert!(matches!(err, LedgerError::UnknownTransaction(_)));
    }

    #[test]
    fn test_arity_and_scalar_errors() {
        let store = MemoryWorldState::new();
        let config = LedgerConfig::default();
        let mut ctx = TxContext::new(&store, &config, 0);

        let err = invoke(&mut ctx, "GetTrainingRound", &[]).unwrap_err();
        assert!(matches!(err, LedgerError::MalformedInput(_)));

        invoke(&mut ctx, "CreateTrainingRound", &["r1", "dbs", ""]).unwrap();
        let err = invoke(&mut ctx, "UpdateTrainingRoundStatus", &["r1", "DONE"]).unwrap_err();
        assert!(matches!(err, LedgerError::MalformedInput(_)));

        let err = invoke(&mut ctx, "UpdateParticipantReputation", &["dbs", "high", "", ""])
            .unwrap_err();
        assert!(matches!(err, LedgerError::MalformedInput(_)));
    }

    #[test]
    fn test_bad_contribution_json_is_malformed() {
        let store = MemoryWorldState::new();
        let config = LedgerConfig::default();
        let mut ctx = TxContext::new(&store, &config, 0);
        invoke(&mut ctx, "CreateTrainingRound", &["r1", "dbs", ""]).unwrap();

        let err = invoke(
            &mut ctx,
            "RecordModelContribution",
            &["c1", "r1", "dbs", "h", "r1/dbs.weights", "{not json", "{}"],
        )
        .unwrap_err();
        assert!(matches!(err, LedgerError::MalformedInput(_)));
        let contributions = invoke(&mut ctx, "GetContributionsByRound", &["r1"]).unwrap();
        assert_eq!(contributions, serde_json::json!([]));
    }

    #[test]
    fn test_init_ledger_seeds_once() {
        let store = MemoryWorldState::new();
        let config = LedgerConfig::default();
        let mut ctx = TxContext::new(&store, &config, 0);

        let round = invoke(&mut ctx, "InitLedger", &[]).unwrap();
        assert_eq!(round["ID"], SEED_ROUND_ID);
        assert_eq!(round["initiator"], "system");

        let events = invoke(&mut ctx, "GetEvents", &[SYSTEM_INIT]).unwrap();
        assert_eq!(events[0]["ID"], SEED_EVENT_ID);

        let err = invoke(&mut ctx, "InitLedger", &[]).unwrap_err();
        assert!(matches!(err, LedgerError::AlreadyExists { .. }));
    }

    #[test]
    fn test_every_listed_transaction_is_dispatched() {
        let store = MemoryWorldState::new();
        let config = LedgerConfig::default();
        for name in TRANSACTIONS {
            let mut ctx = TxContext::new(&store, &config, 0);
            let result = Contract::invoke(&mut ctx, name, &[]);
            assert!(
                !matches!(result, Err(LedgerError::UnknownTransaction(_))),
                "{name} is not dispatched"
            );
        }
    }
}

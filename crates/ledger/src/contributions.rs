//! Contribution ledger.

use crate::context::TxContext;
use crate::error::{LedgerError, LedgerResult};
use crate::{keys, rounds};
use fedchain_types::{LedgerEvent, ModelContribution, ModelUploaded};
use std::collections::{BTreeMap, BTreeSet};
use tracing::info;

/// A model submission as supplied by a participant.
#[derive(Debug, Clone, Default)]
pub struct ContributionSubmission {
    pub id: String,
    pub round_id: String,
    pub participant_id: String,
    pub weight_hash: String,
    pub model_uri: String,
    pub accuracy_metrics: BTreeMap<String, f64>,
    pub training_stats: BTreeMap<String, String>,
}

/// Record a contribution and announce the upload.
///
/// Contribution ids are write-once. The same participant may contribute
/// more than once to a round under different ids.
pub fn record_contribution(
    ctx: &mut TxContext<'_>,
    submission: ContributionSubmission,
) -> LedgerResult<ModelContribution> {
    if !rounds::round_exists(ctx, &submission.round_id)? {
        return Err(LedgerError::not_found(rounds::KIND, submission.round_id));
    }
    let key = keys::contribution(&submission.id);
    if ctx.exists(&key)? {
        return Err(LedgerError::already_exists("contribution", submission.id));
    }

    let contribution = ModelContribution {
        id: submission.id,
        round_id: submission.round_id,
        participant_id: submission.participant_id,
        submitted_at: ctx.timestamp(),
        weight_hash: submission.weight_hash,
        model_uri: submission.model_uri,
        accuracy_metrics: submission.accuracy_metrics,
        training_stats: submission.training_stats,
    };
    ctx.put_json(key, &contribution)?;
    ctx.set_event(LedgerEvent::ModelUploaded(ModelUploaded {
        round_id: contribution.round_id.clone(),
        bank_id: contribution.participant_id.clone(),
        weight_hash: contribution.weight_hash.clone(),
        model_uri: contribution.model_uri.clone(),
    }));

    info!(
        round_id = %contribution.round_id,
        participant = %contribution.participant_id,
        contribution_id = %contribution.id,
        "Model contribution recorded"
    );
    Ok(contribution)
}

/// Contributions of one round, in key order.
pub fn list_by_round(ctx: &TxContext<'_>, round_id: &str) -> LedgerResult<Vec<ModelContribution>> {
    Ok(ctx
        .scan_json::<ModelContribution>(keys::CONTRIBUTION_PREFIX)?
        .into_iter()
        .filter(|c| c.round_id == round_id)
        .collect())
}

/// Distinct contributing participants per round.
pub fn contributors_by_round(
    ctx: &TxContext<'_>,
) -> LedgerResult<BTreeMap<String, BTreeSet<String>>> {
    let mut grouped: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    for contribution in ctx.scan_json::<ModelContribution>(keys::CONTRIBUTION_PREFIX)? {
        grouped
            .entry(contribution.round_id)
            .or_default()
            .insert(contribution.participant_id);
    }
    Ok(grouped)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::LedgerConfig;
    use crate::state::MemoryWorldState;

    fn submission(id: &str, round_id: &str, participant: &str) -> ContributionSubmission {
        ContributionSubmission {
            id: id.to_string(),
            round_id: round_id.to_string(),
            participant_id: participant.to_string(),
            weight_hash: format!("hash-{id}"),
            model_uri: format!("{round_id}/{participant}.weights"),
            ..Default::default()
        }
    }

    #[test]
    fn test_record_requires_round() {
        let store = MemoryWorldState::new();
        let config = LedgerConfig::default();
        let mut ctx = TxContext::new(&store, &config, 7);

        let err = record_contribution(&mut ctx, submission("c1", "missing", "dbs")).unwrap_err();
        assert!(err.is_not_found());
        assert!(ctx.events().is_empty());
    }

    #[test]
    fn test_duplicates_per_participant_but_not_per_id() {
        let store = MemoryWorldState::new();
        let config = LedgerConfig::default();
        let mut ctx = TxContext::new(&store, &config, 7);
        rounds::create_round(&mut ctx, "r1", "dbs", "").unwrap();
        rounds::create_round(&mut ctx, "r2", "dbs", "").unwrap();

        let recorded = record_contribution(&mut ctx, submission("c1", "r1", "dbs")).unwrap();
        assert_eq!(recorded.submitted_at, 7);
        record_contribution(&mut ctx, submission("c2", "r1", "dbs")).unwrap();
        record_contribution(&mut ctx, submission("c3", "r2", "ing")).unwrap();

        let err = record_contribution(&mut ctx, submission("c1", "r1", "ing")).unwrap_err();
        assert!(matches!(err, LedgerError::AlreadyExists { .. }));

        assert_eq!(list_by_round(&ctx, "r1").unwrap().len(), 2);
        let grouped = contributors_by_round(&ctx).unwrap();
        assert_eq!(grouped["r1"].len(), 1);
        assert!(grouped["r2"].contains("ing"));
    }
}

//! Quorum detection.
//!
//! A round with an explicit participant list is ready once every listed
//! participant has contributed. A round without one falls back to counting
//! distinct contributors against the configured legacy threshold.

use crate::context::TxContext;
use crate::error::LedgerResult;
use crate::{contributions, rounds};
use fedchain_types::{AggregationReadiness, RoundParticipationStatus, TrainingRound};
use std::collections::BTreeSet;
use tracing::debug;

/// Quorum rule that applies to a round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuorumPolicy {
    /// Every listed participant must contribute.
    Explicit(Vec<String>),
    /// At least this many distinct participants must contribute.
    Legacy(usize),
}

impl QuorumPolicy {
    /// Policy for a round given the legacy threshold.
    pub fn for_round(round: &TrainingRound, legacy_threshold: usize) -> Self {
        if round.participants.is_empty() {
            QuorumPolicy::Legacy(legacy_threshold)
        } else {
            QuorumPolicy::Explicit(round.participants.clone())
        }
    }

    /// Evaluate against the distinct contributors of the round.
    pub fn evaluate(&self, contributors: &BTreeSet<String>) -> QuorumOutcome {
        let ready = match self {
            QuorumPolicy::Explicit(expected) => {
                expected.iter().all(|p| contributors.contains(p))
            }
            QuorumPolicy::Legacy(threshold) => contributors.len() >= *threshold,
        };
        QuorumOutcome {
            ready,
            submitted: contributors.iter().cloned().collect(),
        }
    }

    /// Participants the policy names; empty for the legacy rule.
    pub fn expected(&self) -> &[String] {
        match self {
            QuorumPolicy::Explicit(expected) => expected,
            QuorumPolicy::Legacy(_) => &[],
        }
    }
}

/// Result of evaluating a [`QuorumPolicy`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuorumOutcome {
    pub ready: bool,
    /// Distinct contributors in sorted order.
    pub submitted: Vec<String>,
}

/// First active round, in key order, that has reached quorum.
pub fn check_ready_for_aggregation(ctx: &TxContext<'_>) -> LedgerResult<AggregationReadiness> {
    let threshold = ctx.config().legacy_quorum_threshold;
    let contributors = contributions::contributors_by_round(ctx)?;
    let empty = BTreeSet::new();

    for round in rounds::list_rounds(ctx)? {
        if !round.status.is_active() {
            continue;
        }
        let submitted = contributors.get(&round.id).unwrap_or(&empty);
        let outcome = QuorumPolicy::for_round(&round, threshold).evaluate(submitted);
        if outcome.ready {
            debug!(round_id = %round.id, uploaded = outcome.submitted.len(), "Round ready for aggregation");
            return Ok(AggregationReadiness {
                ready: true,
                round_id: Some(round.id),
                uploaded_count: Some(outcome.submitted.len()),
                participants: Some(outcome.submitted),
            });
        }
    }
    Ok(AggregationReadiness::not_ready())
}

pub fn round_participation_status(
    ctx: &TxContext<'_>,
    round_id: &str,
) -> LedgerResult<RoundParticipationStatus> {
    let round = rounds::get_round(ctx, round_id)?;
    let submitted: BTreeSet<String> = contributions::list_by_round(ctx, round_id)?
        .into_iter()
        .map(|c| c.participant_id)
        .collect();

    let policy = QuorumPolicy::for_round(&round, ctx.config().legacy_quorum_threshold);
    let outcome = policy.evaluate(&submitted);

    Ok(RoundParticipationStatus {
        round_id: round.id,
        status: round.status,
        ready: outcome.ready,
        uploaded_count: outcome.submitted.len(),
        expected: policy.expected().to_vec(),
        submitted: outcome.submitted,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contributions::{record_contribution, ContributionSubmission};
    use crate::host::LedgerConfig;
    use crate::state::MemoryWorldState;
    use fedchain_types::RoundStatus;

    fn contributors(ids: &[&str]) -> BTreeSet<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    fn contribute(ctx: &mut TxContext<'_>, id: &str, round_id: &str, participant: &str) {
        record_contribution(
            ctx,
            ContributionSubmission {
                id: id.to_string(),
                round_id: round_id.to_string(),
                participant_id: participant.to_string(),
                model_uri: format!("{round_id}/{participant}.weights"),
                ..Default::default()
            },
        )
        .unwrap();
    }

    #[test]
    fn test_explicit_policy_needs_superset() {
        let policy = QuorumPolicy::Explicit(vec!["dbs".into(), "ing".into()]);
        assert!(!policy.evaluate(&contributors(&["dbs"])).ready);
        assert!(policy.evaluate(&contributors(&["ing", "dbs"])).ready);
        assert!(policy.evaluate(&contributors(&["ing", "dbs", "ocbc"])).ready);
    }

    #[test]
    fn test_legacy_policy_counts_distinct() {
        let policy = QuorumPolicy::Legacy(3);
        assert!(!policy.evaluate(&contributors(&["a", "b"])).ready);
        assert!(policy.evaluate(&contributors(&["a", "b", "c"])).ready);
        assert!(policy.expected().is_empty());
    }

    #[test]
    fn test_legacy_duplicates_do_not_count() {
        let store = MemoryWorldState::new();
        let config = LedgerConfig::default();
        let mut ctx = TxContext::new(&store, &config, 0);
        rounds::create_round(&mut ctx, "old", "dbs", "").unwrap();
        contribute(&mut ctx, "c1", "old", "dbs");
        contribute(&mut ctx, "c2", "old", "dbs");
        contribute(&mut ctx, "c3", "old", "ing");

        let status = round_participation_status(&ctx, "old").unwrap();
        assert!(!status.ready);
        assert_eq!(status.uploaded_count, 2);

        contribute(&mut ctx, "c4", "old", "ocbc");
        assert!(round_participation_status(&ctx, "old").unwrap().ready);
    }

    #[test]
    fn test_readiness_skips_inactive_and_picks_first() {
        let store = MemoryWorldState::new();
        let config = LedgerConfig {
            legacy_quorum_threshold: 1,
        };
        let mut ctx = TxContext::new(&store, &config, 0);
        assert_eq!(
            check_ready_for_aggregation(&ctx).unwrap(),
            AggregationReadiness::not_ready()
        );

        for id in ["a", "b", "c"] {
            rounds::create_round(&mut ctx, id, "dbs", "").unwrap();
        }
        contribute(&mut ctx, "c1", "a", "dbs");
        contribute(&mut ctx, "c2", "b", "ing");
        contribute(&mut ctx, "c3", "c", "ocbc");
        rounds::update_status(&mut ctx, "a", RoundStatus::Failed).unwrap();

        let readiness = check_ready_for_aggregation(&ctx).unwrap();
        assert!(readiness.ready);
        assert_eq!(readiness.round_id.as_deref(), Some("b"));
        assert_eq!(readiness.participants, Some(vec!["ing".to_string()]));
    }
}

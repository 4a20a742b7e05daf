//! Reputation ledger.

use crate::context::TxContext;
use crate::error::{LedgerError, LedgerResult};
use crate::keys;
use crate::state::Upsert;
use fedchain_types::{LedgerEvent, ReputationRecord, ReputationUpdated};
use tracing::{info, warn};

/// Read a participant's reputation, creating it with the default score on first read.
pub fn get_or_create(
    ctx: &mut TxContext<'_>,
    participant_id: &str,
) -> LedgerResult<Upsert<ReputationRecord>> {
    let key = keys::reputation(participant_id);
    if let Some(record) = ctx.get_json(&key)? {
        return Ok(Upsert::Existing(record));
    }

    let record = ReputationRecord::new(participant_id, ctx.timestamp());
    ctx.put_json(key, &record)?;
    Ok(Upsert::Created(record))
}

/// Set a participant's score and append the change to its history.
pub fn update_reputation(
    ctx: &mut TxContext<'_>,
    participant_id: &str,
    new_score: f64,
    reason: &str,
    round_id: &str,
) -> LedgerResult<ReputationRecord> {
    if !new_score.is_finite() {
        return Err(LedgerError::MalformedInput(format!(
            "reputation score must be finite, got {new_score}"
        )));
    }

    let mut record = get_or_create(ctx, participant_id)?.into_inner();
    let change = record.apply(new_score, reason, round_id, ctx.timestamp());
    ctx.put_json(keys::reputation(participant_id), &record)?;

    ctx.set_event(LedgerEvent::ReputationUpdated(ReputationUpdated {
        participant_id: participant_id.to_string(),
        old_score: change.old_score,
        new_score: change.new_score,
        reason: change.reason,
        round_id: change.round_id,
    }));

    info!(
        participant = %participant_id,
        old_score = change.old_score,
        new_score,
        "Reputation updated"
    );
    Ok(record)
}

/// Every reputation record. Undecodable entries are skipped.
pub fn all_reputations(ctx: &TxContext<'_>) -> LedgerResult<Vec<ReputationRecord>> {
    let mut records = Vec::new();
    for (key, bytes) in ctx.scan_prefix(keys::REPUTATION_PREFIX)? {
        match serde_json::from_slice::<ReputationRecord>(&bytes) {
            Ok(record) => records.push(record),
            Err(e) => warn!(key = %key, error = %e, "Skipping undecodable reputation record"),
        }
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::LedgerConfig;
    use crate::state::MemoryWorldState;
    use fedchain_types::{DEFAULT_REPUTATION_SCORE, REPUTATION_HISTORY_CAP};

    #[test]
    fn test_first_read_creates_default() {
        let store = MemoryWorldState::new();
        let config = LedgerConfig::default();
        let mut ctx = TxContext::new(&store, &config, 5);

        let first = get_or_create(&mut ctx, "dbs").unwrap();
        assert!(first.was_created());
        assert_eq!(first.get().score, DEFAULT_REPUTATION_SCORE);

        let second = get_or_create(&mut ctx, "dbs").unwrap();
        assert!(!second.was_created());
    }

    #[test]
    fn test_first_update_for_unknown_participant() {
        let store = MemoryWorldState::new();
        let config = LedgerConfig::default();
        let mut ctx = TxContext::new(&store, &config, 9);

        let record = update_reputation(&mut ctx, "newbank", 0.8, "good model", "round1").unwrap();
        assert_eq!(record.score, 0.8);
        assert_eq!(record.history.len(), 1);
        let change = record.history.latest().unwrap();
        assert_eq!(change.old_score, DEFAULT_REPUTATION_SCORE);
        assert_eq!(change.new_score, 0.8);

        match &ctx.events()[0] {
            LedgerEvent::ReputationUpdated(e) => {
                assert_eq!(e.old_score, 0.5);
                assert_eq!(e.round_id, "round1");
            }
            other => panic!("Expected ReputationUpdated, got {:?}", other),
        }
    }

    #[test]
    fn test_history_is_capped_fifo() {
        let store = MemoryWorldState::new();
        let config = LedgerConfig::default();
        let mut ctx = TxContext::new(&store, &config, 0);

        for i in 0..12 {
            update_reputation(&mut ctx, "ing", i as f64 / 100.0, "step", "").unwrap();
        }
        let record = get_or_create(&mut ctx, "ing").unwrap().into_inner();
        assert_eq!(record.history.len(), REPUTATION_HISTORY_CAP);
        let oldest = record.history.iter().next().unwrap();
        assert_eq!(oldest.new_score, 0.02);
        assert_eq!(record.score, 0.11);
    }

    #[test]
    fn test_non_finite_score_rejected() {
        let store = MemoryWorldState::new();
        let config = LedgerConfig::default();
        let mut ctx = TxContext::new(&store, &config, 0);

        let err = update_reputation(&mut ctx, "dbs", f64::NAN, "", "").unwrap_err();
        assert!(matches!(err, LedgerError::MalformedInput(_)));
        assert!(ctx.into_parts().0.is_empty());
    }

    #[test]
    fn test_all_reputations_skips_garbage() {
        let store = MemoryWorldState::new();
        let config = LedgerConfig::default();
        let mut ctx = TxContext::new(&store, &config, 0);
        get_or_create(&mut ctx, "dbs").unwrap();
        ctx.put_state(keys::reputation("broken"), b"not json".to_vec());

        let all = all_reputations(&ctx).unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].participant_id, "dbs");
    }
}

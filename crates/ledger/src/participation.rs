//! Participation ledger. Append-only invitation responses.

use crate::context::TxContext;
use crate::error::{LedgerError, LedgerResult};
use crate::{keys, rounds};
use fedchain_types::{ParticipationRecord, Timestamp};
use tracing::debug;

/// A participant's answer to a round invitation.
#[derive(Debug, Clone, Default)]
pub struct ParticipationResponse {
    pub id: String,
    pub round_id: String,
    pub participant_id: String,
    pub invited_at: Timestamp,
    pub has_accepted: bool,
    pub reason: String,
}

pub fn record_participation(
    ctx: &mut TxContext<'_>,
    response: ParticipationResponse,
) -> LedgerResult<ParticipationRecord> {
    if !rounds::round_exists(ctx, &response.round_id)? {
        return Err(LedgerError::not_found(rounds::KIND, response.round_id));
    }
    let key = keys::participation(&response.id);
    if ctx.exists(&key)? {
        return Err(LedgerError::already_exists("participation record", response.id));
    }

    let record = ParticipationRecord {
        id: response.id,
        round_id: response.round_id,
        participant_id: response.participant_id,
        invited_at: response.invited_at,
        responded_at: ctx.timestamp(),
        has_accepted: response.has_accepted,
        reason: response.reason,
    };
    ctx.put_json(key, &record)?;

    debug!(
        round_id = %record.round_id,
        participant = %record.participant_id,
        accepted = record.has_accepted,
        "Participation recorded"
    );
    Ok(record)
}

pub fn participation_by_round(
    ctx: &TxContext<'_>,
    round_id: &str,
) -> LedgerResult<Vec<ParticipationRecord>> {
    Ok(ctx
        .scan_json::<ParticipationRecord>(keys::PARTICIPATION_PREFIX)?
        .into_iter()
        .filter(|r| r.round_id == round_id)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::LedgerConfig;
    use crate::state::MemoryWorldState;

    #[test]
    fn test_record_and_filter_by_round() {
        let store = MemoryWorldState::new();
        let config = LedgerConfig::default();
        let mut ctx = TxContext::new(&store, &config, 200);
        rounds::create_round(&mut ctx, "r1", "dbs", "").unwrap();

        let record = record_participation(
            &mut ctx,
            ParticipationResponse {
                id: "p1".to_string(),
                round_id: "r1".to_string(),
                participant_id: "ing".to_string(),
                invited_at: 100,
                has_accepted: false,
                reason: "maintenance window".to_string(),
            },
        )
        .unwrap();
        assert_eq!(record.responded_at, 200);

        let records = participation_by_round(&ctx, "r1").unwrap();
        assert_eq!(records, vec![record]);
        assert!(participation_by_round(&ctx, "r2").unwrap().is_empty());
    }

    #[test]
    fn test_missing_round_is_rejected() {
        let store = MemoryWorldState::new();
        let config = LedgerConfig::default();
        let mut ctx = TxContext::new(&store, &config, 0);
        let err = record_participation(
            &mut ctx,
            ParticipationResponse {
                id: "p1".to_string(),
                round_id: "ghost".to_string(),
                ..Default::default()
            },
        )
        .unwrap_err();
        assert!(err.is_not_found());
    }
}

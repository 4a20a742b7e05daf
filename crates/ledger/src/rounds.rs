//! Round ledger.
//!
//! Rounds are created once, mutated by participant changes and final-model
//! recording, and never deleted.

use crate::context::TxContext;
use crate::error::{LedgerError, LedgerResult};
use crate::keys;
use fedchain_types::{
    AggregatedModelSubmitted, LedgerEvent, RoundStarted, RoundStatus, TrainingRound,
};
use tracing::{debug, info};

pub(crate) const KIND: &str = "training round";

/// Create a round in INITIATED state and announce it.
pub fn create_round(
    ctx: &mut TxContext<'_>,
    id: &str,
    initiator: &str,
    description: &str,
) -> LedgerResult<TrainingRound> {
    if id.is_empty() {
        return Err(LedgerError::MalformedInput("round id is empty".to_string()));
    }
    let key = keys::round(id);
    if ctx.exists(&key)? {
        return Err(LedgerError::already_exists(KIND, id));
    }

    let round = TrainingRound::new(id, initiator, description, ctx.timestamp());
    ctx.put_json(key, &round)?;
    ctx.set_event(LedgerEvent::RoundStarted(RoundStarted {
        round_id: id.to_string(),
        initiator: initiator.to_string(),
        description: description.to_string(),
    }));

    info!(round_id = %id, initiator = %initiator, "Training round created");
    Ok(round)
}

pub fn get_round(ctx: &TxContext<'_>, id: &str) -> LedgerResult<TrainingRound> {
    ctx.get_json(&keys::round(id))?
        .ok_or_else(|| LedgerError::not_found(KIND, id))
}

pub fn round_exists(ctx: &TxContext<'_>, id: &str) -> LedgerResult<bool> {
    ctx.exists(&keys::round(id))
}

/// Set a round's status. No transition order is enforced.
pub fn update_status(
    ctx: &mut TxContext<'_>,
    id: &str,
    status: RoundStatus,
) -> LedgerResult<TrainingRound> {
    let mut round = get_round(ctx, id)?;
    round.set_status(status, ctx.timestamp());
    ctx.put_json(keys::round(id), &round)?;

    debug!(round_id = %id, status = %status, "Round status updated");
    Ok(round)
}

/// All rounds in key order.
pub fn list_rounds(ctx: &TxContext<'_>) -> LedgerResult<Vec<TrainingRound>> {
    ctx.scan_json(keys::ROUND_PREFIX)
}

/// Replace the participant list wholesale. Last writer wins until the
/// round completes.
pub fn update_participants(
    ctx: &mut TxContext<'_>,
    id: &str,
    participants: Vec<String>,
) -> LedgerResult<TrainingRound> {
    let mut round = mutable_round(ctx, id)?;
    round.participants = participants;
    ctx.put_json(keys::round(id), &round)?;

    debug!(round_id = %id, participants = round.participants.len(), "Round participants replaced");
    Ok(round)
}

/// Add a participant to a round. Adding an existing participant is a no-op.
pub fn opt_in(
    ctx: &mut TxContext<'_>,
    id: &str,
    participant_id: &str,
) -> LedgerResult<TrainingRound> {
    let mut round = mutable_round(ctx, id)?;
    if !round.has_participant(participant_id) {
        round.participants.push(participant_id.to_string());
        ctx.put_json(keys::round(id), &round)?;
        info!(round_id = %id, participant = %participant_id, "Participant opted in");
    }
    Ok(round)
}

/// Remove a participant from a round. Removing an absent participant is a no-op.
pub fn opt_out(
    ctx: &mut TxContext<'_>,
    id: &str,
    participant_id: &str,
) -> LedgerResult<TrainingRound> {
    let mut round = mutable_round(ctx, id)?;
    if round.has_participant(participant_id) {
        round.participants.retain(|p| p != participant_id);
        ctx.put_json(keys::round(id), &round)?;
        info!(round_id = %id, participant = %participant_id, "Participant opted out");
    }
    Ok(round)
}

/// Record the aggregated model and complete the round.
pub fn record_aggregated_model(
    ctx: &mut TxContext<'_>,
    round_id: &str,
    weight_hash: &str,
    model_uri: &str,
) -> LedgerResult<TrainingRound> {
    let mut round = get_round(ctx, round_id)?;
    round.model_weight_hash = Some(weight_hash.to_string());
    round.model_uri = Some(model_uri.to_string());
    round.set_status(RoundStatus::Completed, ctx.timestamp());
    ctx.put_json(keys::round(round_id), &round)?;

    ctx.set_event(LedgerEvent::AggregatedModelSubmitted(
        AggregatedModelSubmitted {
            round_id: round_id.to_string(),
            weight_hash: weight_hash.to_string(),
            model_uri: model_uri.to_string(),
        },
    ));

    info!(round_id = %round_id, model_uri = %model_uri, "Aggregated model recorded");
    Ok(round)
}

fn mutable_round(ctx: &TxContext<'_>, id: &str) -> LedgerResult<TrainingRound> {
    let round = get_round(ctx, id)?;
    if round.status == RoundStatus::Completed {
        return Err(LedgerError::InvalidState(format!(
            "round {id} is completed; participants are frozen"
        )));
    }
    Ok(round)
}

//! Quality ledger.
//!
//! One `RecordQualityMetrics` call touches the metrics record, the round
//! snapshot and every scored participant's rolling history. All of it lands
//! in a single write set.

use crate::context::TxContext;
use crate::error::{LedgerError, LedgerResult};
use crate::{keys, rounds};
use fedchain_types::{
    LedgerEvent, ParticipantQualityData, ParticipantQualitySummary, QualityMetrics,
    QualityRecorded, RoundQualitySnapshot,
};
use std::collections::BTreeMap;
use tracing::{info, warn};

/// Quality evaluation of one round as supplied by the evaluator.
#[derive(Debug, Clone, Default)]
pub struct QualityReport {
    pub id: String,
    pub round_id: String,
    pub threshold: f64,
    pub average_quality: f64,
    pub accepted_count: u32,
    pub rejected_count: u32,
    pub participant_scores: BTreeMap<String, f64>,
}

impl QualityReport {
    /// Non-finite values would be stored as JSON `null` and poison later reads.
    fn check_finite(&self) -> LedgerResult<()> {
        let scalars = [
            ("threshold", self.threshold),
            ("average quality", self.average_quality),
        ];
        let scores = self
            .participant_scores
            .iter()
            .map(|(participant, score)| (participant.as_str(), *score));
        for (field, value) in scalars.into_iter().chain(scores) {
            if !value.is_finite() {
                return Err(LedgerError::MalformedInput(format!(
                    "{field} must be finite, got {value}"
                )));
            }
        }
        Ok(())
    }
}

pub fn record_quality_metrics(
    ctx: &mut TxContext<'_>,
    report: QualityReport,
) -> LedgerResult<QualityMetrics> {
    if !rounds::round_exists(ctx, &report.round_id)? {
        return Err(LedgerError::not_found(rounds::KIND, report.round_id));
    }
    let key = keys::quality(&report.id);
    if ctx.exists(&key)? {
        return Err(LedgerError::already_exists("quality metrics", report.id));
    }
    report.check_finite()?;
    let now = ctx.timestamp();

    for (participant_id, score) in &report.participant_scores {
        let pq_key = keys::participant_quality(participant_id);
        let mut data = ctx
            .get_json::<ParticipantQualityData>(&pq_key)?
            .unwrap_or_else(|| ParticipantQualityData::new(participant_id.as_str(), now));
        data.record(*score, report.threshold, now);
        ctx.put_json(pq_key, &data)?;
    }

    let snapshot = RoundQualitySnapshot {
        quality_threshold: report.threshold,
        average_quality: report.average_quality,
        accepted_count: report.accepted_count,
        rejected_count: report.rejected_count,
    };
    ctx.put_json(keys::quality_snapshot(&report.round_id), &snapshot)?;

    let metrics = QualityMetrics {
        id: report.id,
        round_id: report.round_id,
        timestamp: now,
        threshold: report.threshold,
        average_quality: report.average_quality,
        accepted_count: report.accepted_count,
        rejected_count: report.rejected_count,
        participants: report.participant_scores,
    };
    ctx.put_json(key, &metrics)?;

    ctx.set_event(LedgerEvent::QualityRecorded(QualityRecorded {
        round_id: metrics.round_id.clone(),
        threshold: metrics.threshold,
        average_quality: metrics.average_quality,
        accepted_count: metrics.accepted_count,
        rejected_count: metrics.rejected_count,
    }));

    info!(
        round_id = %metrics.round_id,
        average_quality = metrics.average_quality,
        participants = metrics.participants.len(),
        "Quality metrics recorded"
    );
    Ok(metrics)
}

/// First metrics record of the round in key order. Undecodable entries are skipped.
pub fn quality_for_round(ctx: &TxContext<'_>, round_id: &str) -> LedgerResult<QualityMetrics> {
    for (key, bytes) in ctx.scan_prefix(keys::QUALITY_PREFIX)? {
        match serde_json::from_slice::<QualityMetrics>(&bytes) {
            Ok(metrics) if metrics.round_id == round_id => return Ok(metrics),
            Ok(_) => {}
            Err(e) => warn!(key = %key, error = %e, "Skipping undecodable quality record"),
        }
    }
    Err(LedgerError::not_found("quality metrics for round", round_id))
}

pub fn participant_quality(
    ctx: &TxContext<'_>,
    participant_id: &str,
) -> LedgerResult<ParticipantQualityData> {
    ctx.get_json(&keys::participant_quality(participant_id))?
        .ok_or_else(|| LedgerError::not_found("participant quality data", participant_id))
}

/// Quality history with the derived current score. Unknown participants
/// get an empty summary.
pub fn participant_quality_summary(
    ctx: &TxContext<'_>,
    participant_id: &str,
) -> LedgerResult<ParticipantQualitySummary> {
    let data = match participant_quality(ctx, participant_id) {
        Ok(data) => data,
        Err(e) if e.is_not_found() => ParticipantQualityData::new(participant_id, 0),
        Err(e) => return Err(e),
    };
    Ok(data.into())
}

pub fn round_quality_snapshot(
    ctx: &TxContext<'_>,
    round_id: &str,
) -> LedgerResult<RoundQualitySnapshot> {
    ctx.get_json(&keys::quality_snapshot(round_id))?
        .ok_or_else(|| LedgerError::not_found("round quality snapshot", round_id))
}

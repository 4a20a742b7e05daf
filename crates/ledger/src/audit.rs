//! Audit trail.

use crate::context::TxContext;
use crate::error::{LedgerError, LedgerResult};
use crate::keys;
use fedchain_types::AuditEvent;
use std::collections::BTreeMap;
use tracing::debug;

/// Append an audit entry stamped with the transaction time.
pub fn record_event(
    ctx: &mut TxContext<'_>,
    id: &str,
    event_type: &str,
    actor_id: &str,
    related_id: &str,
    description: &str,
    metadata: BTreeMap<String, String>,
) -> LedgerResult<AuditEvent> {
    let key = keys::event(id);
    if ctx.exists(&key)? {
        return Err(LedgerError::already_exists("audit event", id));
    }

    let event = AuditEvent {
        id: id.to_string(),
        event_type: event_type.to_string(),
        timestamp: ctx.timestamp(),
        actor_id: actor_id.to_string(),
        related_id: related_id.to_string(),
        description: description.to_string(),
        metadata,
    };
    ctx.put_json(key, &event)?;

    debug!(event_id = %id, event_type = %event_type, actor = %actor_id, "Audit event recorded");
    Ok(event)
}

/// Audit entries of one type, or all of them when `event_type` is empty.
pub fn events_by_type(ctx: &TxContext<'_>, event_type: &str) -> LedgerResult<Vec<AuditEvent>> {
    Ok(ctx
        .scan_json::<AuditEvent>(keys::EVENT_PREFIX)?
        .into_iter()
        .filter(|e| event_type.is_empty() || e.event_type == event_type)
        .collect())
}

//! World state key layout.

pub const ROUND_PREFIX: &str = "ROUND_";
pub const CONTRIBUTION_PREFIX: &str = "CONTRIBUTION_";
pub const PARTICIPATION_PREFIX: &str = "PARTICIPATION_";
pub const REPUTATION_PREFIX: &str = "REPUTATION_";
pub const QUALITY_PREFIX: &str = "QUALITY_";
pub const PARTICIPANT_QUALITY_PREFIX: &str = "PARTICIPANT_QUALITY_";
pub const QUALITY_SNAPSHOT_PREFIX: &str = "QUALITYMETA_";
pub const EVENT_PREFIX: &str = "EVENT_";

pub fn round(id: &str) -> String {
    format!("{ROUND_PREFIX}{id}")
}

pub fn contribution(id: &str) -> String {
    format!("{CONTRIBUTION_PREFIX}{id}")
}

pub fn participation(id: &str) -> String {
    format!("{PARTICIPATION_PREFIX}{id}")
}

pub fn reputation(participant_id: &str) -> String {
    format!("{REPUTATION_PREFIX}{participant_id}")
}

pub fn quality(id: &str) -> String {
    format!("{QUALITY_PREFIX}{id}")
}

pub fn participant_quality(participant_id: &str) -> String {
    format!("{PARTICIPANT_QUALITY_PREFIX}{participant_id}")
}

pub fn quality_snapshot(round_id: &str) -> String {
    format!("{QUALITY_SNAPSHOT_PREFIX}{round_id}")
}

pub fn event(id: &str) -> String {
    format!("{EVENT_PREFIX}{id}")
}

use serde::Serialize;

use crate::model::ClaimRecord;
use crate::similarity::{SCORE_FLOOR, overlap_count};

pub const DEFAULT_REVIEW_DATE_TOLERANCE_DAYS: i64 = 1;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PruneReason {
    ClaimDate,
    ReviewDate,
    Author,
    EntityOverlap,
    EntityPresence,
}

impl PruneReason {
    pub const ALL: [PruneReason; 5] = [
        Self::ClaimDate,
        Self::ReviewDate,
        Self::Author,
        Self::EntityOverlap,
        Self::EntityPresence,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::ClaimDate => "claim_date",
            Self::ReviewDate => "review_date",
            Self::Author => "author",
            Self::EntityOverlap => "entity_overlap",
            Self::EntityPresence => "entity_presence",
        }
    }
}

pub fn should_prune(left: &ClaimRecord, right: &ClaimRecord) -> bool {
    prune_reason(left, right, DEFAULT_REVIEW_DATE_TOLERANCE_DAYS).is_some()
}

// Rules are checked in order and the first match wins.
pub fn prune_reason(
    left: &ClaimRecord,
    right: &ClaimRecord,
    review_date_tolerance_days: i64,
) -> Option<PruneReason> {
    if let (Some(left_date), Some(right_date)) = (left.claim_date, right.claim_date) {
        if left_date != right_date {
            return Some(PruneReason::ClaimDate);
        }
    }

    if let (Some(left_date), Some(right_date)) = (left.review_date, right.review_date) {
        if (left_date - right_date).num_days().abs() > review_date_tolerance_days {
            return Some(PruneReason::ReviewDate);
        }
    }

    if left.author != right.author {
        return Some(PruneReason::Author);
    }

    let left_has_entities = !left.entities.is_empty();
    let right_has_entities = !right.entities.is_empty();
    if left_has_entities
        && right_has_entities
        && (overlap_count(&left.entities, &right.entities) as f64) <= SCORE_FLOOR
    {
        return Some(PruneReason::EntityOverlap);
    }

    if left_has_entities != right_has_entities {
        return Some(PruneReason::EntityPresence);
    }

    None
}

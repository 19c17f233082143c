//! Append-only audit trail of reviewer and worker actions.

use serde::Serialize;

use crate::entity::EntityKind;
use crate::types::{EntityId, ReviewerId};

define_lookup_enum! {
    /// Action recorded in `activity_logs`, matching `activity_types` seed data.
    ActivityType {
        Viewed = 1 => "viewed",
        Lookup = 2 => "lookup",
        Confirmed = 3 => "confirmed",
        Cleared = 4 => "cleared",
        Skipped = 5 => "skipped",
        Rechecked = 6 => "rechecked",
        TrainingUpvote = 7 => "training_upvote",
        TrainingDownvote = 8 => "training_downvote",
        Removed = 9 => "removed",
        AutoFlagged = 10 => "auto_flagged",
    }
}

/// Activity row to append. `reviewer_id` is `None` for worker actions.
#[derive(Debug, Clone, Serialize)]
pub struct NewActivity {
    pub kind: EntityKind,
    pub entity_id: EntityId,
    pub reviewer_id: Option<ReviewerId>,
    pub activity_type: ActivityType,
    pub details: serde_json::Value,
}

impl NewActivity {
    pub fn by_reviewer(
        kind: EntityKind,
        entity_id: EntityId,
        reviewer_id: ReviewerId,
        activity_type: ActivityType,
    ) -> Self {
        Self {
            kind,
            entity_id,
            reviewer_id: Some(reviewer_id),
            activity_type,
            details: serde_json::json!({}),
        }
    }

    pub fn by_system(kind: EntityKind, entity_id: EntityId, activity_type: ActivityType) -> Self {
        Self {
            kind,
            entity_id,
            reviewer_id: None,
            activity_type,
            details: serde_json::json!({}),
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = details;
        self
    }
}

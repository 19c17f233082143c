//! Entity kinds, moderation statuses and review ordering policies.
//!
//! Users and groups share one state machine. Each kind lives in its own
//! table with a `status_id` column; an entity with no row is `Unflagged`.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Soft lease applied by review claims: a row viewed less than this long ago
/// is invisible to other reviewers.
pub const DEFAULT_REVIEW_COOLDOWN: Duration = Duration::from_secs(10 * 60);

/// Which of the two parallel entity tables an operation targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    User,
    Group,
}

impl EntityKind {
    /// Table holding every non-unflagged entity of this kind.
    pub fn table(self) -> &'static str {
        match self {
            EntityKind::User => "users",
            EntityKind::Group => "groups",
        }
    }

    /// Entity name used in `CoreError::NotFound` and log fields.
    pub fn entity_name(self) -> &'static str {
        match self {
            EntityKind::User => "User",
            EntityKind::Group => "Group",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            EntityKind::User => "user",
            EntityKind::Group => "group",
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for EntityKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "user" | "users" => Ok(EntityKind::User),
            "group" | "groups" => Ok(EntityKind::Group),
            other => Err(CoreError::Validation(format!(
                "Unknown entity kind '{other}'. Must be 'user' or 'group'"
            ))),
        }
    }
}

define_lookup_enum! {
    /// Moderation status, matching `entity_statuses` seed data.
    ///
    /// `Banned` means banned for users and locked for groups.
    EntityStatus {
        Flagged = 1 => "flagged",
        Confirmed = 2 => "confirmed",
        Cleared = 3 => "cleared",
        Banned = 4 => "banned",
    }
}

impl EntityStatus {
    /// Kind-specific label: groups are "locked" rather than "banned".
    pub fn label_for(self, kind: EntityKind) -> &'static str {
        match (self, kind) {
            (EntityStatus::Banned, EntityKind::Group) => "locked",
            (status, _) => status.as_str(),
        }
    }
}

/// Result of looking an ID up across the status table: either a stored
/// status or no row at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ModerationState {
    Unflagged,
    Stored(EntityStatus),
}

impl ModerationState {
    pub fn status(self) -> Option<EntityStatus> {
        match self {
            ModerationState::Unflagged => None,
            ModerationState::Stored(status) => Some(status),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ModerationState::Unflagged => "unflagged",
            ModerationState::Stored(status) => status.as_str(),
        }
    }
}

define_lookup_enum! {
    /// Ordering applied when pulling the next entity to review.
    ReviewSortBy {
        Confidence = 1 => "confidence",
        LastUpdated = 2 => "last_updated",
        Reputation = 3 => "reputation",
        Random = 4 => "random",
    }
}

impl Default for ReviewSortBy {
    fn default() -> Self {
        ReviewSortBy::Confidence
    }
}

define_lookup_enum! {
    /// The status a reviewer primarily wants to work through.
    ReviewTargetMode {
        Flagged = 1 => "flagged",
        Confirmed = 2 => "confirmed",
        Cleared = 3 => "cleared",
        Banned = 4 => "banned",
    }
}

impl Default for ReviewTargetMode {
    fn default() -> Self {
        ReviewTargetMode::Flagged
    }
}

impl ReviewTargetMode {
    /// Built-in fallback order for this target mode.
    ///
    /// The primary status comes first, then the remaining ones.
    pub fn default_priority(self) -> StatusPriority {
        use EntityStatus::*;
        let order = match self {
            ReviewTargetMode::Flagged => vec![Flagged, Confirmed, Cleared, Banned],
            ReviewTargetMode::Confirmed => vec![Confirmed, Flagged, Cleared, Banned],
            ReviewTargetMode::Cleared => vec![Cleared, Flagged, Confirmed, Banned],
            ReviewTargetMode::Banned => vec![Banned, Flagged, Confirmed, Cleared],
        };
        StatusPriority(order)
    }

    pub fn primary_status(self) -> EntityStatus {
        match self {
            ReviewTargetMode::Flagged => EntityStatus::Flagged,
            ReviewTargetMode::Confirmed => EntityStatus::Confirmed,
            ReviewTargetMode::Cleared => EntityStatus::Cleared,
            ReviewTargetMode::Banned => EntityStatus::Banned,
        }
    }
}

/// Ordered list of statuses a review claim walks through until it finds an
/// eligible row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<EntityStatus>", into = "Vec<EntityStatus>")]
pub struct StatusPriority(Vec<EntityStatus>);

impl StatusPriority {
    /// Build a priority list. Must be non-empty and free of duplicates.
    pub fn new(order: Vec<EntityStatus>) -> Result<Self, CoreError> {
        if order.is_empty() {
            return Err(CoreError::Configuration(
                "Review priority list must not be empty".to_string(),
            ));
        }
        for (i, status) in order.iter().enumerate() {
            if order[..i].contains(status) {
                return Err(CoreError::Configuration(format!(
                    "Review priority list contains '{status}' twice"
                )));
            }
        }
        Ok(Self(order))
    }

    pub fn statuses(&self) -> &[EntityStatus] {
        &self.0
    }
}

impl TryFrom<Vec<EntityStatus>> for StatusPriority {
    type Error = CoreError;

    fn try_from(value: Vec<EntityStatus>) -> Result<Self, Self::Error> {
        StatusPriority::new(value)
    }
}

impl From<StatusPriority> for Vec<EntityStatus> {
    fn from(value: StatusPriority) -> Self {
        value.0
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn status_ids_match_seed_data() {
        assert_eq!(EntityStatus::Flagged.id(), 1);
        assert_eq!(EntityStatus::Confirmed.id(), 2);
        assert_eq!(EntityStatus::Cleared.id(), 3);
        assert_eq!(EntityStatus::Banned.id(), 4);
        assert_eq!(EntityStatus::from_id(3), Some(EntityStatus::Cleared));
        assert_eq!(EntityStatus::from_id(9), None);
    }

    #[test]
    fn banned_groups_are_labelled_locked() {
        assert_eq!(EntityStatus::Banned.label_for(EntityKind::User), "banned");
        assert_eq!(EntityStatus::Banned.label_for(EntityKind::Group), "locked");
        assert_eq!(EntityStatus::Flagged.label_for(EntityKind::Group), "flagged");
    }

    #[test]
    fn sort_policy_parses_case_insensitively() {
        assert_eq!("Confidence".parse::<ReviewSortBy>().unwrap(), ReviewSortBy::Confidence);
        assert_eq!("last_updated".parse::<ReviewSortBy>().unwrap(), ReviewSortBy::LastUpdated);
        assert_eq!(" RANDOM ".parse::<ReviewSortBy>().unwrap(), ReviewSortBy::Random);
    }

    #[test]
    fn unknown_sort_policy_is_a_configuration_error() {
        assert_matches!(
            "oldest".parse::<ReviewSortBy>(),
            Err(CoreError::Configuration(msg)) if msg.contains("oldest")
        );
    }

    #[test]
    fn every_target_mode_starts_with_its_own_status() {
        for mode in ReviewTargetMode::ALL {
            let priority = mode.default_priority();
            assert_eq!(priority.statuses()[0], mode.primary_status());
            assert_eq!(priority.statuses().len(), 4);
        }
    }

    #[test]
    fn flagged_target_falls_back_in_fixed_order() {
        let priority = ReviewTargetMode::Flagged.default_priority();
        assert_eq!(
            priority.statuses(),
            &[
                EntityStatus::Flagged,
                EntityStatus::Confirmed,
                EntityStatus::Cleared,
                EntityStatus::Banned
            ]
        );
    }

    #[test]
    fn priority_rejects_duplicates_and_empty() {
        assert_matches!(StatusPriority::new(vec![]), Err(CoreError::Configuration(_)));
        assert_matches!(
            StatusPriority::new(vec![EntityStatus::Flagged, EntityStatus::Flagged]),
            Err(CoreError::Configuration(_))
        );
        assert!(StatusPriority::new(vec![EntityStatus::Cleared]).is_ok());
    }

    #[test]
    fn priority_deserializes_from_json_list() {
        let priority: StatusPriority =
            serde_json::from_str(r#"["confirmed","flagged"]"#).unwrap();
        assert_eq!(
            priority.statuses(),
            &[EntityStatus::Confirmed, EntityStatus::Flagged]
        );
        assert!(serde_json::from_str::<StatusPriority>(r#"["flagged","flagged"]"#).is_err());
    }

    #[test]
    fn entity_kind_accepts_plural_path_segments() {
        assert_eq!("users".parse::<EntityKind>().unwrap(), EntityKind::User);
        assert_eq!("Group".parse::<EntityKind>().unwrap(), EntityKind::Group);
        assert!("channel".parse::<EntityKind>().is_err());
    }
}

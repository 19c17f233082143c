//! Profile snapshots gathered by the fetchers and the flag records built
//! from them.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::entity::EntityKind;
use crate::types::{EntityId, Timestamp};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FriendRef {
    pub id: EntityId,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupMembership {
    pub group_id: EntityId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub role: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameRef {
    pub id: EntityId,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutfitRef {
    pub id: EntityId,
    #[serde(default)]
    pub name: String,
}

/// Basic account fields returned by a single profile request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserInfo {
    pub id: EntityId,
    pub name: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub description: String,
    pub created_at: Timestamp,
    #[serde(default)]
    pub is_banned: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FollowCounts {
    pub followers: i64,
    pub following: i64,
}

/// A fully loaded user profile, the unit of work flowing through checkers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileInfo {
    pub id: EntityId,
    pub name: String,
    pub display_name: String,
    pub description: String,
    pub created_at: Timestamp,
    pub friends: Vec<FriendRef>,
    pub groups: Vec<GroupMembership>,
    pub games: Vec<GameRef>,
    pub outfits: Vec<OutfitRef>,
    pub follower_count: i64,
    pub following_count: i64,
    pub thumbnail_url: Option<String>,
    pub fetched_at: Timestamp,
}

impl ProfileInfo {
    /// Profile with only basic info; list fields start empty.
    pub fn from_basic(info: UserInfo, fetched_at: Timestamp) -> Self {
        Self {
            id: info.id,
            name: info.name,
            display_name: info.display_name,
            description: info.description,
            created_at: info.created_at,
            friends: Vec::new(),
            groups: Vec::new(),
            games: Vec::new(),
            outfits: Vec::new(),
            follower_count: 0,
            following_count: 0,
            thumbnail_url: None,
            fetched_at,
        }
    }

    /// Account age relative to `now`; clock skew yields zero.
    pub fn account_age(&self, now: Timestamp) -> Duration {
        (now - self.created_at).to_std().unwrap_or(Duration::ZERO)
    }

    pub fn friend_ids(&self) -> Vec<EntityId> {
        self.friends.iter().map(|f| f.id).collect()
    }

    pub fn group_ids(&self) -> Vec<EntityId> {
        self.groups.iter().map(|g| g.group_id).collect()
    }

    /// Kind-specific payload stored in the entity's `details` column.
    pub fn details(&self) -> serde_json::Value {
        serde_json::json!({
            "friends": self.friends,
            "groups": self.groups,
            "games": self.games,
            "outfits": self.outfits,
        })
    }
}

/// Group snapshot returned by the profile fetcher.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupInfo {
    pub id: EntityId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub owner_id: Option<EntityId>,
    #[serde(default)]
    pub member_count: i64,
    #[serde(default)]
    pub is_locked: bool,
}

/// Entity row to insert or refresh as Flagged.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlagRecord {
    pub kind: EntityKind,
    pub id: EntityId,
    pub name: String,
    pub display_name: String,
    pub description: String,
    pub created_at: Option<Timestamp>,
    pub reason: String,
    pub confidence: f64,
    pub follower_count: i64,
    pub following_count: i64,
    pub thumbnail_url: Option<String>,
    pub details: serde_json::Value,
}

impl FlagRecord {
    pub fn user(profile: &ProfileInfo, reason: String, confidence: f64) -> Self {
        Self {
            kind: EntityKind::User,
            id: profile.id,
            name: profile.name.clone(),
            display_name: profile.display_name.clone(),
            description: profile.description.clone(),
            created_at: Some(profile.created_at),
            reason,
            confidence: confidence.clamp(0.0, 1.0),
            follower_count: profile.follower_count,
            following_count: profile.following_count,
            thumbnail_url: profile.thumbnail_url.clone(),
            details: profile.details(),
        }
    }

    /// Group flagged because enough tracked users share it.
    pub fn group(info: &GroupInfo, tracked_users: &[EntityId], reason: String) -> Self {
        let confidence = if info.member_count > 0 {
            (tracked_users.len() as f64 / info.member_count as f64).min(1.0)
        } else {
            1.0
        };
        Self {
            kind: EntityKind::Group,
            id: info.id,
            name: info.name.clone(),
            display_name: info.name.clone(),
            description: info.description.clone(),
            created_at: None,
            reason,
            confidence: (confidence * 100.0).round() / 100.0,
            follower_count: 0,
            following_count: 0,
            thumbnail_url: None,
            details: serde_json::json!({
                "owner_id": info.owner_id,
                "member_count": info.member_count,
                "tracked_users": tracked_users,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration as ChronoDuration, Utc};

    use super::*;

    fn basic(id: EntityId) -> UserInfo {
        UserInfo {
            id,
            name: format!("user{id}"),
            display_name: String::new(),
            description: String::new(),
            created_at: Utc::now() - ChronoDuration::days(10),
            is_banned: false,
        }
    }

    #[test]
    fn account_age_is_clamped_at_zero() {
        let now = Utc::now();
        let mut profile = ProfileInfo::from_basic(basic(1), now);
        profile.created_at = now + ChronoDuration::hours(1);
        assert_eq!(profile.account_age(now), Duration::ZERO);
    }

    #[test]
    fn account_age_in_days() {
        let now = Utc::now();
        let profile = ProfileInfo::from_basic(basic(1), now);
        assert_eq!(profile.account_age(now).as_secs() / 86_400, 10);
    }

    #[test]
    fn group_confidence_is_tracked_share_of_members() {
        let info = GroupInfo {
            id: 9,
            name: "g".into(),
            description: String::new(),
            owner_id: Some(1),
            member_count: 20,
            is_locked: false,
        };
        let record = FlagRecord::group(&info, &[1, 2, 3, 4, 5], "tracked".into());
        assert_eq!(record.confidence, 0.25);
        assert_eq!(record.kind, EntityKind::Group);
    }
}

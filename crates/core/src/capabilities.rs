//! External capabilities consumed by the pipeline.
//!
//! Implementations live in the worker crate (HTTP gateway clients); tests
//! provide in-memory fakes.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::entity::EntityKind;
use crate::error::CoreError;
use crate::profile::{
    FollowCounts, FriendRef, GameRef, GroupInfo, GroupMembership, OutfitRef, ProfileInfo,
    UserInfo,
};
use crate::types::EntityId;

/// Per-field profile lookups. Each call may fail independently.
#[async_trait]
pub trait ProfileFetcher: Send + Sync {
    async fn fetch_user_info(&self, user_id: EntityId) -> Result<UserInfo, CoreError>;

    async fn fetch_friends(&self, user_id: EntityId) -> Result<Vec<FriendRef>, CoreError>;

    async fn fetch_groups(&self, user_id: EntityId) -> Result<Vec<GroupMembership>, CoreError>;

    async fn fetch_games(&self, user_id: EntityId) -> Result<Vec<GameRef>, CoreError>;

    async fn fetch_outfits(&self, user_id: EntityId) -> Result<Vec<OutfitRef>, CoreError>;

    async fn fetch_follow_counts(&self, user_id: EntityId) -> Result<FollowCounts, CoreError>;

    async fn fetch_group_info(&self, group_id: EntityId) -> Result<GroupInfo, CoreError>;

    /// Subset of `ids` the platform has banned, deleted or locked.
    async fn fetch_removed(
        &self,
        kind: EntityKind,
        ids: &[EntityId],
    ) -> Result<Vec<EntityId>, CoreError>;
}

/// One page of a group's member listing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MemberPage {
    pub members: Vec<EntityId>,
    /// Cursor for the next page; `None` when the listing is exhausted.
    pub next_cursor: Option<String>,
}

#[async_trait]
pub trait MembershipLister: Send + Sync {
    async fn list_group_members(
        &self,
        group_id: EntityId,
        cursor: Option<&str>,
    ) -> Result<MemberPage, CoreError>;
}

#[async_trait]
pub trait ThumbnailFetcher: Send + Sync {
    /// Batch lookup. IDs without a thumbnail are absent from the map.
    async fn thumbnail_urls(
        &self,
        kind: EntityKind,
        ids: &[EntityId],
    ) -> Result<HashMap<EntityId, String>, CoreError>;
}

/// Decision returned by the content classifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub should_flag: bool,
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub confidence: f64,
}

#[async_trait]
pub trait Classifier: Send + Sync {
    async fn classify(&self, profile: &ProfileInfo) -> Result<Classification, CoreError>;
}

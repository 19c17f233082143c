#![allow(dead_code)]

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use warden_core::capabilities::{Classification, Classifier, ProfileFetcher, ThumbnailFetcher};
use warden_core::entity::{EntityKind, EntityStatus};
use warden_core::error::CoreError;
use warden_core::profile::{
    FlagRecord, FollowCounts, FriendRef, GameRef, GroupInfo, GroupMembership, OutfitRef,
    ProfileInfo, UserInfo,
};
use warden_core::types::EntityId;
use warden_db::models::entity::UpsertSummary;
use warden_pipeline::store::{ModerationStore, Signals};
use warden_pipeline::PipelineError;

/// In-memory stand-in for the database.
#[derive(Default)]
pub struct MemoryStore {
    pub statuses: Mutex<HashMap<(EntityKind, EntityId), EntityStatus>>,
    pub tracking: Mutex<BTreeMap<EntityId, BTreeSet<EntityId>>>,
    pub latched: Mutex<HashSet<EntityId>>,
    pub saved: Mutex<Vec<FlagRecord>>,
    /// Lookups that include any of these IDs fail.
    pub failing_lookups: Mutex<HashSet<EntityId>>,
    pub fail_affiliation_writes: Mutex<u32>,
    /// Number of upcoming qualified-group saves that fail.
    pub fail_group_saves: Mutex<u32>,
}

impl MemoryStore {
    pub fn set(&self, kind: EntityKind, id: EntityId, status: EntityStatus) {
        self.statuses.lock().unwrap().insert((kind, id), status);
    }

    pub fn status(&self, kind: EntityKind, id: EntityId) -> Option<EntityStatus> {
        self.statuses.lock().unwrap().get(&(kind, id)).copied()
    }

    pub fn fail_lookups_including(&self, id: EntityId) {
        self.failing_lookups.lock().unwrap().insert(id);
    }

    pub fn tracked(&self, group_id: EntityId) -> Vec<EntityId> {
        self.tracking
            .lock()
            .unwrap()
            .get(&group_id)
            .map(|users| users.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn saved_ids(&self) -> Vec<EntityId> {
        let mut ids: Vec<_> = self.saved.lock().unwrap().iter().map(|r| r.id).collect();
        ids.sort_unstable();
        ids
    }
}

#[async_trait]
impl ModerationStore for MemoryStore {
    async fn statuses(
        &self,
        kind: EntityKind,
        ids: &[EntityId],
    ) -> Result<HashMap<EntityId, EntityStatus>, PipelineError> {
        let failing = self.failing_lookups.lock().unwrap();
        if ids.iter().any(|id| failing.contains(id)) {
            return Err(PipelineError::Core(CoreError::TransientFetch(
                "lookup unavailable".into(),
            )));
        }
        let statuses = self.statuses.lock().unwrap();
        Ok(ids
            .iter()
            .filter_map(|id| statuses.get(&(kind, *id)).map(|s| (*id, *s)))
            .collect())
    }

    async fn record_affiliations(&self, signals: &Signals) -> Result<(), PipelineError> {
        {
            let mut failures = self.fail_affiliation_writes.lock().unwrap();
            if *failures > 0 {
                *failures -= 1;
                return Err(PipelineError::Store(sqlx::Error::PoolTimedOut));
            }
        }
        let statuses = self.statuses.lock().unwrap();
        let mut tracking = self.tracking.lock().unwrap();
        for (group_id, users) in signals {
            if matches!(
                statuses.get(&(EntityKind::Group, *group_id)),
                Some(s) if *s != EntityStatus::Flagged
            ) {
                continue;
            }
            tracking
                .entry(*group_id)
                .or_default()
                .extend(users.iter().copied());
        }
        Ok(())
    }

    async fn save_flagged(
        &self,
        kind: EntityKind,
        records: &[FlagRecord],
    ) -> Result<UpsertSummary, PipelineError> {
        let mut summary = UpsertSummary::default();
        let mut statuses = self.statuses.lock().unwrap();
        for record in records {
            match statuses.get(&(kind, record.id)) {
                None => {
                    statuses.insert((kind, record.id), EntityStatus::Flagged);
                    summary.inserted.push(record.id);
                }
                Some(EntityStatus::Flagged) => summary.refreshed.push(record.id),
                Some(_) => {
                    summary.skipped.push(record.id);
                    continue;
                }
            }
            self.saved.lock().unwrap().push(record.clone());
        }
        Ok(summary)
    }

    async fn qualified_groups(
        &self,
        min_users: i32,
    ) -> Result<BTreeMap<EntityId, Vec<EntityId>>, PipelineError> {
        let tracking = self.tracking.lock().unwrap();
        let latched = self.latched.lock().unwrap();
        Ok(tracking
            .iter()
            .filter(|(id, users)| !latched.contains(id) && users.len() >= min_users as usize)
            .map(|(id, users)| (*id, users.iter().copied().collect()))
            .collect())
    }

    async fn flag_qualified_groups(
        &self,
        min_users: i32,
        records: &[FlagRecord],
    ) -> Result<UpsertSummary, PipelineError> {
        {
            let mut failures = self.fail_group_saves.lock().unwrap();
            if *failures > 0 {
                *failures -= 1;
                return Err(PipelineError::Store(sqlx::Error::PoolTimedOut));
            }
        }
        let qualified = self.qualified_groups(min_users).await?;
        let owned: Vec<FlagRecord> = records
            .iter()
            .filter(|r| qualified.contains_key(&r.id))
            .cloned()
            .collect();
        self.latched
            .lock()
            .unwrap()
            .extend(owned.iter().map(|r| r.id));
        self.save_flagged(EntityKind::Group, &owned).await
    }
}

pub fn profile(id: EntityId, friends: &[EntityId], groups: &[EntityId]) -> ProfileInfo {
    let now = Utc::now();
    let mut profile = ProfileInfo::from_basic(
        UserInfo {
            id,
            name: format!("user{id}"),
            display_name: format!("User {id}"),
            description: String::new(),
            created_at: now - Duration::days(10),
            is_banned: false,
        },
        now,
    );
    profile.friends = friends
        .iter()
        .map(|&id| FriendRef {
            id,
            name: format!("user{id}"),
        })
        .collect();
    profile.groups = groups
        .iter()
        .map(|&group_id| GroupMembership {
            group_id,
            name: format!("group{group_id}"),
            role: "Member".into(),
        })
        .collect();
    profile
}

/// Profile fetcher serving canned profiles.
#[derive(Default)]
pub struct FakeFetcher {
    pub profiles: HashMap<EntityId, ProfileInfo>,
    pub banned: HashSet<EntityId>,
    pub unreachable: HashSet<EntityId>,
    pub broken_friend_lists: HashSet<EntityId>,
    pub groups: HashMap<EntityId, GroupInfo>,
}

impl FakeFetcher {
    pub fn with_profiles(profiles: impl IntoIterator<Item = ProfileInfo>) -> Self {
        Self {
            profiles: profiles.into_iter().map(|p| (p.id, p)).collect(),
            ..Default::default()
        }
    }

    fn get(&self, id: EntityId) -> Result<&ProfileInfo, CoreError> {
        if self.unreachable.contains(&id) {
            return Err(CoreError::TransientFetch(format!("user {id} timed out")));
        }
        self.profiles.get(&id).ok_or(CoreError::NotFound {
            entity: "User",
            id,
        })
    }
}

#[async_trait]
impl ProfileFetcher for FakeFetcher {
    async fn fetch_user_info(&self, user_id: EntityId) -> Result<UserInfo, CoreError> {
        let p = self.get(user_id)?;
        Ok(UserInfo {
            id: p.id,
            name: p.name.clone(),
            display_name: p.display_name.clone(),
            description: p.description.clone(),
            created_at: p.created_at,
            is_banned: self.banned.contains(&user_id),
        })
    }

    async fn fetch_friends(&self, user_id: EntityId) -> Result<Vec<FriendRef>, CoreError> {
        if self.broken_friend_lists.contains(&user_id) {
            return Err(CoreError::TransientFetch("friends endpoint down".into()));
        }
        Ok(self.get(user_id)?.friends.clone())
    }

    async fn fetch_groups(&self, user_id: EntityId) -> Result<Vec<GroupMembership>, CoreError> {
        Ok(self.get(user_id)?.groups.clone())
    }

    async fn fetch_games(&self, user_id: EntityId) -> Result<Vec<GameRef>, CoreError> {
        Ok(self.get(user_id)?.games.clone())
    }

    async fn fetch_outfits(&self, user_id: EntityId) -> Result<Vec<OutfitRef>, CoreError> {
        Ok(self.get(user_id)?.outfits.clone())
    }

    async fn fetch_follow_counts(&self, user_id: EntityId) -> Result<FollowCounts, CoreError> {
        let p = self.get(user_id)?;
        Ok(FollowCounts {
            followers: p.follower_count,
            following: p.following_count,
        })
    }

    async fn fetch_group_info(&self, group_id: EntityId) -> Result<GroupInfo, CoreError> {
        self.groups
            .get(&group_id)
            .cloned()
            .ok_or(CoreError::TransientFetch(format!("group {group_id} unavailable")))
    }

    async fn fetch_removed(
        &self,
        _kind: EntityKind,
        ids: &[EntityId],
    ) -> Result<Vec<EntityId>, CoreError> {
        Ok(ids.iter().copied().filter(|id| self.banned.contains(id)).collect())
    }
}

#[derive(Default)]
pub struct FakeThumbnails {
    pub fail: bool,
}

#[async_trait]
impl ThumbnailFetcher for FakeThumbnails {
    async fn thumbnail_urls(
        &self,
        _kind: EntityKind,
        ids: &[EntityId],
    ) -> Result<HashMap<EntityId, String>, CoreError> {
        if self.fail {
            return Err(CoreError::TransientFetch("thumbnails down".into()));
        }
        Ok(ids
            .iter()
            .map(|id| (*id, format!("https://cdn.test/{id}.png")))
            .collect())
    }
}

/// Flags the listed users; errors on `broken`.
#[derive(Default)]
pub struct FakeClassifier {
    pub flag: HashSet<EntityId>,
    pub broken: HashSet<EntityId>,
}

#[async_trait]
impl Classifier for FakeClassifier {
    async fn classify(&self, profile: &ProfileInfo) -> Result<Classification, CoreError> {
        if self.broken.contains(&profile.id) {
            return Err(CoreError::TransientFetch("classifier timeout".into()));
        }
        Ok(Classification {
            should_flag: self.flag.contains(&profile.id),
            reason: if self.flag.contains(&profile.id) {
                "Inappropriate description".into()
            } else {
                String::new()
            },
            confidence: 0.85,
        })
    }
}

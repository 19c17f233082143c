//! Reviewer-facing operations on the entity store.
//!
//! Every operation writes an activity record. Confirm and clear also score
//! outstanding training votes against the decision, in the same transaction
//! as the status change.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use sqlx::PgPool;
use warden_core::activity::{ActivityType, NewActivity};
use warden_core::entity::{EntityKind, EntityStatus, ReviewSortBy, ReviewTargetMode};
use warden_core::error::CoreError;
use warden_core::settings::ModerationSettings;
use warden_core::types::EntityId;
use warden_db::models::activity::ActivityLog;
use warden_db::models::entity::{ClaimOutcome, Entity, TransitionFields, TransitionOutcome};
use warden_db::models::tracking::GroupTracking;
use warden_db::models::vote::{Vote, VoteOutcome};
use warden_db::repositories::{ActivityRepo, EntityRepo, TrackingRepo, VoteRepo};

use crate::error::{AppError, AppResult};
use crate::extract::Reviewer;

/// Activity entries returned with a lookup.
const LOOKUP_ACTIVITY_LIMIT: i64 = 20;

/// An entity as shown to a reviewer.
#[derive(Debug, Clone, Serialize)]
pub struct ReviewItem {
    pub kind: EntityKind,
    /// Kind-specific label: groups read "locked" where users read "banned".
    pub status: &'static str,
    #[serde(flatten)]
    pub entity: Entity,
}

impl ReviewItem {
    fn new(kind: EntityKind, entity: Entity) -> Self {
        let status = entity
            .status()
            .map(|s| s.label_for(kind))
            .unwrap_or("unknown");
        Self {
            kind,
            status,
            entity,
        }
    }
}

/// Read-only view returned by [`ReviewService::lookup`].
#[derive(Debug, Serialize)]
pub struct LookupView {
    pub item: ReviewItem,
    pub votes: Vec<Vote>,
    pub activity: Vec<ActivityLog>,
    /// Affiliation record, groups only.
    pub tracking: Option<GroupTracking>,
}

/// Review operations scoped to one request's settings snapshot.
pub struct ReviewService<'a> {
    pool: &'a PgPool,
    settings: Arc<ModerationSettings>,
}

impl<'a> ReviewService<'a> {
    pub fn new(pool: &'a PgPool, settings: Arc<ModerationSettings>) -> Self {
        Self { pool, settings }
    }

    /// Claim the next entity for `reviewer`.
    ///
    /// `sort` falls back to the kind's default sort and `target` to
    /// Flagged; the target selects the status priority list. Returns `None`
    /// when nothing is eligible.
    pub async fn next_to_review(
        &self,
        kind: EntityKind,
        sort: Option<ReviewSortBy>,
        target: Option<ReviewTargetMode>,
        reviewer: Reviewer,
    ) -> AppResult<Option<ReviewItem>> {
        let sort = sort.unwrap_or_else(|| self.settings.default_sort(kind));
        let priority = self.settings.priority_for(target.unwrap_or_default());

        let claimed = EntityRepo::get_for_review(
            self.pool,
            kind,
            sort,
            &priority,
            self.settings.review_cooldown(),
            Utc::now(),
        )
        .await?;

        let Some(entity) = claimed else {
            tracing::debug!(%kind, %sort, reviewer = reviewer.id, "Nothing to review");
            return Ok(None);
        };

        self.log(kind, entity.id, reviewer, ActivityType::Viewed).await?;
        tracing::info!(%kind, id = entity.id, reviewer = reviewer.id, "Assigned for review");
        Ok(Some(ReviewItem::new(kind, entity)))
    }

    /// Claim one specific entity under the same cooldown rules.
    pub async fn claim(
        &self,
        kind: EntityKind,
        id: EntityId,
        reviewer: Reviewer,
    ) -> AppResult<ReviewItem> {
        let outcome = EntityRepo::claim_by_id(
            self.pool,
            kind,
            id,
            self.settings.review_cooldown(),
            Utc::now(),
        )
        .await?;

        match outcome {
            ClaimOutcome::Claimed(entity) => {
                self.log(kind, id, reviewer, ActivityType::Viewed).await?;
                Ok(ReviewItem::new(kind, entity))
            }
            ClaimOutcome::Busy => Err(CoreError::AlreadyLocked {
                entity: kind.entity_name(),
                id,
            }
            .into()),
            ClaimOutcome::NotFound => Err(not_found(kind, id)),
        }
    }

    /// Flagged → Confirmed.
    pub async fn confirm(
        &self,
        kind: EntityKind,
        id: EntityId,
        reviewer: Reviewer,
        reason: Option<String>,
    ) -> AppResult<ReviewItem> {
        let reason = reason
            .map(|r| r.trim().to_string())
            .filter(|r| !r.is_empty());
        self.decide(
            kind,
            id,
            reviewer,
            &[EntityStatus::Flagged],
            EntityStatus::Confirmed,
            reason,
        )
        .await
    }

    /// Flagged or Confirmed → Cleared.
    pub async fn clear(
        &self,
        kind: EntityKind,
        id: EntityId,
        reviewer: Reviewer,
    ) -> AppResult<ReviewItem> {
        self.decide(
            kind,
            id,
            reviewer,
            &[EntityStatus::Flagged, EntityStatus::Confirmed],
            EntityStatus::Cleared,
            None,
        )
        .await
    }

    /// Record that the reviewer passed. The cooldown from the claim stays in
    /// force, so the entity goes to someone else next.
    pub async fn skip(&self, kind: EntityKind, id: EntityId, reviewer: Reviewer) -> AppResult<()> {
        if EntityRepo::find_by_id(self.pool, kind, id).await?.is_none() {
            return Err(not_found(kind, id));
        }
        self.log(kind, id, reviewer, ActivityType::Skipped).await
    }

    /// Training-mode vote. One per reviewer per entity.
    pub async fn vote(
        &self,
        kind: EntityKind,
        id: EntityId,
        reviewer: Reviewer,
        upvote: bool,
    ) -> AppResult<ReviewItem> {
        match VoteRepo::record_vote(self.pool, kind, id, reviewer.id, upvote).await? {
            VoteOutcome::Recorded(entity) => {
                let activity = if upvote {
                    ActivityType::TrainingUpvote
                } else {
                    ActivityType::TrainingDownvote
                };
                self.log(kind, id, reviewer, activity).await?;
                Ok(ReviewItem::new(kind, entity))
            }
            VoteOutcome::AlreadyVoted => Err(AppError::Conflict(format!(
                "Reviewer {} already voted on {kind} {id}",
                reviewer.id
            ))),
            VoteOutcome::NotVotable => match EntityRepo::find_by_id(self.pool, kind, id).await? {
                None => Err(not_found(kind, id)),
                Some(_) => Err(CoreError::Validation(format!(
                    "Only flagged or confirmed {}s accept training votes",
                    kind.as_str()
                ))
                .into()),
            },
        }
    }

    /// Plain read with votes and recent activity. Does not claim.
    pub async fn lookup(
        &self,
        kind: EntityKind,
        id: EntityId,
        reviewer: Reviewer,
    ) -> AppResult<LookupView> {
        let entity = EntityRepo::find_by_id(self.pool, kind, id)
            .await?
            .ok_or_else(|| not_found(kind, id))?;
        self.log(kind, id, reviewer, ActivityType::Lookup).await?;

        let votes = VoteRepo::list_for_entity(self.pool, kind, id).await?;
        let activity =
            ActivityRepo::list_for_entity(self.pool, kind, id, LOOKUP_ACTIVITY_LIMIT).await?;
        let tracking = match kind {
            EntityKind::Group => TrackingRepo::find(self.pool, id).await?,
            EntityKind::User => None,
        };

        Ok(LookupView {
            item: ReviewItem::new(kind, entity),
            votes,
            activity,
            tracking,
        })
    }

    /// Move `id` from any of `from` to `to`, verifying training votes in the
    /// same transaction.
    ///
    /// The first source status is tried first; a mismatch naming another
    /// allowed source retries from that status.
    async fn decide(
        &self,
        kind: EntityKind,
        id: EntityId,
        reviewer: Reviewer,
        from: &[EntityStatus],
        to: EntityStatus,
        reason: Option<String>,
    ) -> AppResult<ReviewItem> {
        let activity_type = match to {
            EntityStatus::Confirmed => ActivityType::Confirmed,
            _ => ActivityType::Cleared,
        };
        let activity = NewActivity::by_reviewer(kind, id, reviewer.id, activity_type)
            .with_details(serde_json::json!({ "reason": reason }));
        let fields = TransitionFields {
            reason,
            confidence: None,
        };

        let Some(mut source) = from.first().copied() else {
            return Err(AppError::InternalError("decision without a source status".into()));
        };
        let mut tx = self.pool.begin().await?;

        for _ in 0..from.len() {
            match EntityRepo::transition_in(&mut *tx, kind, id, source, to, &fields, &activity)
                .await?
            {
                TransitionOutcome::Moved(entity) => {
                    let verified =
                        VoteRepo::verify_in(&mut *tx, kind, id, to == EntityStatus::Confirmed)
                            .await?;
                    tx.commit().await?;
                    tracing::info!(
                        %kind,
                        id,
                        reviewer = reviewer.id,
                        status = %to,
                        verified_votes = verified,
                        "Review decision recorded",
                    );
                    return Ok(ReviewItem::new(kind, entity));
                }
                TransitionOutcome::NotFound => return Err(not_found(kind, id)),
                TransitionOutcome::StatusMismatch(actual)
                    if actual != source && from.contains(&actual) =>
                {
                    source = actual;
                }
                TransitionOutcome::StatusMismatch(actual) => {
                    return Err(CoreError::InvariantViolation {
                        kind,
                        id,
                        expected: source,
                        actual,
                    }
                    .into());
                }
            }
        }

        // The row kept changing status between attempts.
        Err(CoreError::AlreadyLocked {
            entity: kind.entity_name(),
            id,
        }
        .into())
    }

    async fn log(
        &self,
        kind: EntityKind,
        id: EntityId,
        reviewer: Reviewer,
        activity_type: ActivityType,
    ) -> AppResult<()> {
        let activity = NewActivity::by_reviewer(kind, id, reviewer.id, activity_type);
        ActivityRepo::insert(self.pool, &activity).await?;
        Ok(())
    }
}

fn not_found(kind: EntityKind, id: EntityId) -> AppError {
    CoreError::NotFound {
        entity: kind.entity_name(),
        id,
    }
    .into()
}

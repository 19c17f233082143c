//! Integration tests for training votes, hourly stats and settings storage.

use assert_matches::assert_matches;
use chrono::{DurationRound, Utc};
use sqlx::PgPool;
use warden_core::activity::{ActivityType, NewActivity};
use warden_core::entity::{EntityKind, EntityStatus};
use warden_core::profile::FlagRecord;
use warden_core::settings::ModerationSettings;
use warden_db::models::vote::VoteOutcome;
use warden_db::repositories::{
    ActivityRepo, EntityRepo, SettingsRepo, StatsRepo, VoteRepo,
};

async fn seed_user(pool: &PgPool, id: i64) {
    let record = FlagRecord {
        kind: EntityKind::User,
        id,
        name: "u".into(),
        display_name: "u".into(),
        description: String::new(),
        created_at: None,
        reason: "seed".into(),
        confidence: 0.5,
        follower_count: 0,
        following_count: 0,
        thumbnail_url: None,
        details: serde_json::json!({}),
    };
    EntityRepo::bulk_upsert_flagged(pool, EntityKind::User, &[record])
        .await
        .unwrap();
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn one_vote_per_reviewer(pool: PgPool) {
    seed_user(&pool, 1).await;

    let first = VoteRepo::record_vote(&pool, EntityKind::User, 1, 10, true).await.unwrap();
    assert_matches!(first, VoteOutcome::Recorded(e) if e.upvotes == 1);

    let again = VoteRepo::record_vote(&pool, EntityKind::User, 1, 10, false).await.unwrap();
    assert_matches!(again, VoteOutcome::AlreadyVoted);

    let entity = EntityRepo::find_by_id(&pool, EntityKind::User, 1).await.unwrap().unwrap();
    assert_eq!((entity.upvotes, entity.downvotes), (1, 0));

    let missing = VoteRepo::record_vote(&pool, EntityKind::User, 2, 10, true).await.unwrap();
    assert_matches!(missing, VoteOutcome::NotVotable);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn votes_are_verified_exactly_once(pool: PgPool) {
    seed_user(&pool, 1).await;
    VoteRepo::record_vote(&pool, EntityKind::User, 1, 10, true).await.unwrap();
    VoteRepo::record_vote(&pool, EntityKind::User, 1, 11, false).await.unwrap();

    let mut conn = pool.acquire().await.unwrap();
    let verified = VoteRepo::verify_in(&mut conn, EntityKind::User, 1, true).await.unwrap();
    assert_eq!(verified, 2);
    let again = VoteRepo::verify_in(&mut conn, EntityKind::User, 1, false).await.unwrap();
    assert_eq!(again, 0);
    drop(conn);

    let right = VoteRepo::reviewer_accuracy(&pool, 10).await.unwrap();
    assert_eq!((right.total, right.correct), (1, 1));
    assert_eq!(right.accuracy, 1.0);
    let wrong = VoteRepo::reviewer_accuracy(&pool, 11).await.unwrap();
    assert_eq!((wrong.total, wrong.correct), (1, 0));

    let votes = VoteRepo::list_for_entity(&pool, EntityKind::User, 1).await.unwrap();
    assert!(votes.iter().all(|v| v.is_verified));
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn hourly_snapshot_counts_each_status(pool: PgPool) {
    seed_user(&pool, 1).await;
    seed_user(&pool, 2).await;
    let hour = Utc::now().duration_trunc(chrono::Duration::hours(1)).unwrap();

    StatsRepo::snapshot_hour(&pool, hour).await.unwrap();
    // Re-running the same hour overwrites rather than duplicates.
    StatsRepo::snapshot_hour(&pool, hour).await.unwrap();

    let stats = StatsRepo::list_since(&pool, hour).await.unwrap();
    assert_eq!(stats.len(), 1);
    assert_eq!(stats[0].entity_kind, "user");
    assert_eq!(stats[0].status_id, EntityStatus::Flagged.id());
    assert_eq!(stats[0].total, 2);
    assert_eq!(StatsRepo::latest_hour(&pool).await.unwrap(), Some(hour));

    let purged = StatsRepo::purge_before(&pool, hour + chrono::Duration::hours(1))
        .await
        .unwrap();
    assert_eq!(purged, 1);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn settings_document_round_trips(pool: PgPool) {
    assert!(SettingsRepo::load(&pool).await.unwrap().is_none());

    let settings = ModerationSettings {
        affiliation_min_users: 8,
        ..Default::default()
    };
    SettingsRepo::save(&pool, &serde_json::to_value(&settings).unwrap())
        .await
        .unwrap();

    let (document, _) = SettingsRepo::load(&pool).await.unwrap().unwrap();
    let loaded: ModerationSettings = serde_json::from_value(document).unwrap();
    assert_eq!(loaded, settings);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn future_month_partitions_receive_rows(pool: PgPool) {
    let next_month = Utc::now() + chrono::Duration::days(40);
    let name = ActivityRepo::ensure_month_partition(&pool, next_month).await.unwrap();
    // Idempotent.
    ActivityRepo::ensure_month_partition(&pool, next_month).await.unwrap();

    let exists: bool = sqlx::query_scalar("SELECT to_regclass($1) IS NOT NULL")
        .bind(&name)
        .fetch_one(&pool)
        .await
        .unwrap();
    assert!(exists);

    ActivityRepo::insert(
        &pool,
        &NewActivity::by_system(EntityKind::User, 1, ActivityType::Rechecked),
    )
    .await
    .unwrap();
    let log = ActivityRepo::list_for_entity(&pool, EntityKind::User, 1, 5).await.unwrap();
    assert_eq!(log.len(), 1);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn current_month_partition_adopts_rows_from_the_default(pool: PgPool) {
    for id in [1, 2] {
        ActivityRepo::insert(
            &pool,
            &NewActivity::by_system(EntityKind::User, id, ActivityType::Rechecked),
        )
        .await
        .unwrap();
    }

    let name = ActivityRepo::ensure_month_partition(&pool, Utc::now()).await.unwrap();

    let in_partition: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {name}"))
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(in_partition, 2);
    let log = ActivityRepo::list_for_entity(&pool, EntityKind::User, 2, 5).await.unwrap();
    assert_eq!(log.len(), 1);
}

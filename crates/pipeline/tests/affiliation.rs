mod common;

use std::sync::Arc;
use std::time::Duration;

use warden_core::entity::{EntityKind, EntityStatus};
use warden_core::profile::GroupInfo;
use warden_pipeline::loader::ProfileLoader;
use warden_pipeline::qualifier::GroupQualifier;
use warden_pipeline::recorder::{AffiliationRecorder, RecorderConfig};

use common::{profile, FakeFetcher, MemoryStore};

fn quiet_config() -> RecorderConfig {
    RecorderConfig {
        channel_capacity: 8,
        max_pending: 1_000,
        flush_interval: Duration::from_secs(3600),
    }
}

#[tokio::test]
async fn recorder_deduplicates_and_flushes_on_demand() {
    let store = Arc::new(MemoryStore::default());
    let (recorder, _task) = AffiliationRecorder::spawn(store.clone(), quiet_config());

    for user in [3, 1, 2, 1, 3] {
        recorder.record(42, user).await.unwrap();
    }
    recorder.flush().await.unwrap();

    assert_eq!(store.tracked(42), vec![1, 2, 3]);
}

#[tokio::test]
async fn recorder_keeps_signals_after_failed_flush() {
    let store = Arc::new(MemoryStore::default());
    *store.fail_affiliation_writes.lock().unwrap() = 1;
    let (recorder, _task) = AffiliationRecorder::spawn(store.clone(), quiet_config());

    recorder.record(7, 1).await.unwrap();
    assert!(recorder.flush().await.is_err());
    assert!(store.tracked(7).is_empty());

    recorder.flush().await.unwrap();
    assert_eq!(store.tracked(7), vec![1]);
}

#[tokio::test]
async fn recorder_flushes_when_last_sender_drops() {
    let store = Arc::new(MemoryStore::default());
    let (recorder, task) = AffiliationRecorder::spawn(store.clone(), quiet_config());

    recorder.record(9, 5).await.unwrap();
    drop(recorder);
    task.await.unwrap();

    assert_eq!(store.tracked(9), vec![5]);
}

#[tokio::test]
async fn sixth_user_does_not_requalify_a_flagged_group() {
    let store = Arc::new(MemoryStore::default());
    let mut fetcher = FakeFetcher::default();
    fetcher.groups.insert(
        77,
        GroupInfo {
            id: 77,
            name: "Hangout".into(),
            description: String::new(),
            owner_id: Some(1),
            member_count: 50,
            is_locked: false,
        },
    );
    let (recorder, _task) = AffiliationRecorder::spawn(store.clone(), quiet_config());
    let qualifier = GroupQualifier::new(store.clone(), Arc::new(fetcher), 4);

    for user in 1..=5 {
        recorder.record(77, user).await.unwrap();
    }
    recorder.flush().await.unwrap();
    let first = qualifier.flag_qualified(5).await.unwrap();
    assert_eq!(first.inserted, vec![77]);
    assert_eq!(store.status(EntityKind::Group, 77), Some(EntityStatus::Flagged));
    assert_eq!(store.saved.lock().unwrap()[0].confidence, 0.1);

    recorder.record(77, 6).await.unwrap();
    recorder.flush().await.unwrap();
    let second = qualifier.flag_qualified(5).await.unwrap();
    assert!(second.inserted.is_empty() && second.refreshed.is_empty());
    assert_eq!(store.tracked(77).len(), 6);
}

#[tokio::test]
async fn qualified_group_is_flagged_even_without_group_info() {
    let store = Arc::new(MemoryStore::default());
    for user in 1..=5 {
        store.tracking.lock().unwrap().entry(88).or_default().insert(user);
    }
    let qualifier = GroupQualifier::new(store.clone(), Arc::new(FakeFetcher::default()), 4);

    let summary = qualifier.flag_qualified(5).await.unwrap();

    assert_eq!(summary.inserted, vec![88]);
}

#[tokio::test]
async fn failed_group_save_leaves_the_group_qualified() {
    let store = Arc::new(MemoryStore::default());
    for user in 1..=5 {
        store.tracking.lock().unwrap().entry(88).or_default().insert(user);
    }
    *store.fail_group_saves.lock().unwrap() = 1;
    let qualifier = GroupQualifier::new(store.clone(), Arc::new(FakeFetcher::default()), 4);

    assert!(qualifier.flag_qualified(5).await.is_err());
    assert!(store.latched.lock().unwrap().is_empty());
    assert_eq!(store.status(EntityKind::Group, 88), None);

    let retry = qualifier.flag_qualified(5).await.unwrap();
    assert_eq!(retry.inserted, vec![88]);
    assert_eq!(store.status(EntityKind::Group, 88), Some(EntityStatus::Flagged));
}

#[tokio::test]
async fn signals_for_reviewed_groups_are_dropped() {
    let store = Arc::new(MemoryStore::default());
    store.set(EntityKind::Group, 90, EntityStatus::Confirmed);
    let (recorder, _task) = AffiliationRecorder::spawn(store.clone(), quiet_config());

    recorder.record(90, 1).await.unwrap();
    recorder.record(91, 1).await.unwrap();
    recorder.flush().await.unwrap();

    assert!(store.tracked(90).is_empty());
    assert_eq!(store.tracked(91), vec![1]);
}

#[tokio::test]
async fn qualification_leaves_reviewed_groups_alone() {
    let store = Arc::new(MemoryStore::default());
    store.set(EntityKind::Group, 89, EntityStatus::Cleared);
    for user in 1..=5 {
        store.tracking.lock().unwrap().entry(89).or_default().insert(user);
    }
    let qualifier = GroupQualifier::new(store.clone(), Arc::new(FakeFetcher::default()), 4);

    let summary = qualifier.flag_qualified(5).await.unwrap();

    assert_eq!(summary.skipped, vec![89]);
    assert_eq!(store.status(EntityKind::Group, 89), Some(EntityStatus::Cleared));
}

#[tokio::test]
async fn loader_tolerates_field_failures() {
    let mut fetcher = FakeFetcher::with_profiles([
        profile(1, &[10, 11], &[20]),
        profile(2, &[12], &[]),
        profile(3, &[], &[]),
        profile(4, &[], &[]),
    ]);
    fetcher.broken_friend_lists.insert(2);
    fetcher.unreachable.insert(3);
    fetcher.banned.insert(4);
    let loader = ProfileLoader::new(Arc::new(fetcher), 3);

    let mut outcome = loader.load_many(&[1, 2, 3, 4]).await;
    outcome.profiles.sort_by_key(|p| p.id);

    assert_eq!(outcome.profiles.len(), 2);
    assert_eq!(outcome.profiles[0].friend_ids(), vec![10, 11]);
    assert_eq!(outcome.profiles[0].group_ids(), vec![20]);
    assert!(outcome.profiles[1].friends.is_empty());
    assert_eq!(outcome.failed, vec![3]);
    assert_eq!(outcome.skipped, vec![4]);
}

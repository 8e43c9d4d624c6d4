// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Activity lifecycle tests against the in-memory store.

use sportlink::error::AppError;
use sportlink::models::{ActivityPatch, ActivityStatus};
use std::sync::Arc;

mod common;
use common::{memory_repository, new_activity, user};

#[tokio::test]
async fn test_join_until_full() {
    let repo = memory_repository();
    let creator = user("creator");
    let created = repo
        .create(Some(&creator), new_activity("Doubles night", 2))
        .await
        .unwrap();

    let first = repo.join(Some(&user("a")), &created.id).await.unwrap();
    assert_eq!(first.current_joined, 1);
    let second = repo.join(Some(&user("b")), &created.id).await.unwrap();
    assert_eq!(second.current_joined, 2);
    assert!(second.is_full());

    let err = repo.join(Some(&user("c")), &created.id).await.unwrap_err();
    assert!(matches!(err, AppError::Full));
    assert_eq!(err.user_message(), "活動已額滿！");
    assert_eq!(repo.get(&created.id).await.unwrap().current_joined, 2);
}

#[tokio::test]
async fn test_only_creator_closes_then_joins_rejected() {
    let repo = memory_repository();
    let creator = user("creator");
    let other = user("other");
    let created = repo
        .create(Some(&creator), new_activity("Hill repeats", 5))
        .await
        .unwrap();

    let err = repo.close(Some(&other), &created.id).await.unwrap_err();
    assert!(matches!(err, AppError::Forbidden("close")));

    let closed = repo.close(Some(&creator), &created.id).await.unwrap();
    assert_eq!(closed.status, ActivityStatus::Closed);

    let err = repo.join(Some(&other), &created.id).await.unwrap_err();
    assert!(matches!(err, AppError::Closed));
    assert_eq!(repo.get(&created.id).await.unwrap().current_joined, 0);
}

#[tokio::test]
async fn test_close_is_idempotent() {
    let repo = memory_repository();
    let creator = user("creator");
    let created = repo
        .create(Some(&creator), new_activity("Spin class", 5))
        .await
        .unwrap();

    let once = repo.close(Some(&creator), &created.id).await.unwrap();
    let twice = repo.close(Some(&creator), &created.id).await.unwrap();
    assert_eq!(once, twice);
    assert_eq!(twice.status, ActivityStatus::Closed);
}

#[tokio::test]
async fn test_edit_preserves_counters_and_status() {
    let repo = memory_repository();
    let creator = user("creator");
    let created = repo
        .create(Some(&creator), new_activity("Pickup game", 4))
        .await
        .unwrap();
    repo.join(Some(&user("a")), &created.id).await.unwrap();
    repo.join(Some(&user("b")), &created.id).await.unwrap();

    let patch = ActivityPatch {
        title: Some("Pickup game (indoor)".to_string()),
        location: Some("Gym B".to_string()),
        max_spots: Some(6),
        ..Default::default()
    };
    let updated = repo
        .update(Some(&creator), &created.id, patch)
        .await
        .unwrap();

    assert_eq!(updated.title, "Pickup game (indoor)");
    assert_eq!(updated.location, "Gym B");
    assert_eq!(updated.max_spots, 6);
    assert_eq!(updated.current_joined, 2);
    assert_eq!(updated.status, ActivityStatus::Active);
    assert_eq!(updated.creator_id, "creator");
    assert_eq!(updated.created_at, created.created_at);
}

#[tokio::test]
async fn test_edit_cannot_drop_capacity_below_joined() {
    let repo = memory_repository();
    let creator = user("creator");
    let created = repo
        .create(Some(&creator), new_activity("Pickup game", 4))
        .await
        .unwrap();
    repo.join(Some(&user("a")), &created.id).await.unwrap();
    repo.join(Some(&user("b")), &created.id).await.unwrap();

    let patch = ActivityPatch {
        max_spots: Some(1),
        ..Default::default()
    };
    let err = repo
        .update(Some(&creator), &created.id, patch)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));
    assert_eq!(repo.get(&created.id).await.unwrap().max_spots, 4);
}

#[tokio::test]
async fn test_only_creator_edits_and_deletes() {
    let repo = memory_repository();
    let creator = user("creator");
    let other = user("other");
    let created = repo
        .create(Some(&creator), new_activity("Yoga", 3))
        .await
        .unwrap();

    let patch = ActivityPatch {
        fee: Some(0),
        ..Default::default()
    };
    assert!(matches!(
        repo.update(Some(&other), &created.id, patch).await,
        Err(AppError::Forbidden("update"))
    ));
    assert!(matches!(
        repo.delete(Some(&other), &created.id).await,
        Err(AppError::Forbidden("delete"))
    ));

    repo.delete(Some(&creator), &created.id).await.unwrap();
    assert!(matches!(
        repo.get(&created.id).await,
        Err(AppError::NotFound(_))
    ));
    assert!(matches!(
        repo.join(Some(&other), &created.id).await,
        Err(AppError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_feed_lists_newest_first() {
    let repo = memory_repository();
    let creator = user("creator");
    let mut feed = repo.open_feed().await.unwrap();
    assert!(feed.take_latest().unwrap().activities.is_empty());

    for title in ["first", "second", "third"] {
        repo.create(Some(&creator), new_activity(title, 3))
            .await
            .unwrap();
    }

    let snapshot = feed.changed().await.unwrap();
    let titles: Vec<_> = snapshot
        .activities
        .iter()
        .map(|a| a.title.as_str())
        .collect();
    assert_eq!(titles, ["third", "second", "first"]);
    assert!(snapshot
        .activities
        .windows(2)
        .all(|pair| pair[0].created_at > pair[1].created_at));
}

#[tokio::test]
async fn test_feed_reflects_join_and_delete() {
    let repo = memory_repository();
    let creator = user("creator");
    let created = repo
        .create(Some(&creator), new_activity("Badminton", 3))
        .await
        .unwrap();
    let mut feed = repo.open_feed().await.unwrap();
    feed.take_latest();

    repo.join(Some(&user("a")), &created.id).await.unwrap();
    let snapshot = feed.changed().await.unwrap();
    assert_eq!(snapshot.activities[0].current_joined, 1);

    repo.delete(Some(&creator), &created.id).await.unwrap();
    let snapshot = feed.changed().await.unwrap();
    assert!(snapshot.activities.is_empty());
}

/// N concurrent joins on K spots: exactly K succeed, the rest see Full.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_joins_never_exceed_capacity() {
    const RACERS: usize = 12;
    const SPOTS: u32 = 5;

    let repo = Arc::new(memory_repository());
    let creator = user("creator");
    let created = repo
        .create(Some(&creator), new_activity("Popular run", SPOTS))
        .await
        .unwrap();

    let barrier = Arc::new(tokio::sync::Barrier::new(RACERS));
    let handles: Vec<_> = (0..RACERS)
        .map(|i| {
            let repo = repo.clone();
            let barrier = barrier.clone();
            let id = created.id.clone();
            tokio::spawn(async move {
                let racer = user(&format!("racer-{}", i));
                barrier.wait().await;
                repo.join(Some(&racer), &id).await
            })
        })
        .collect();

    let mut joined = 0;
    let mut full = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(activity) => {
                assert!(activity.current_joined <= SPOTS);
                joined += 1;
            }
            Err(AppError::Full) => full += 1,
            Err(e) => panic!("unexpected join error: {e}"),
        }
    }

    assert_eq!(joined, SPOTS as usize);
    assert_eq!(full, RACERS - SPOTS as usize);
    assert_eq!(repo.get(&created.id).await.unwrap().current_joined, SPOTS);
}

/// Joins for a ceiling-sized activity racing against creator edits all end
/// in a commit or `Full`, never in exhausted retries.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_joins_and_edits_race_at_ceiling() {
    use sportlink::db::MAX_TRANSACTION_ATTEMPTS;
    use sportlink::services::DEFAULT_MAX_SPOTS_CEILING;

    assert!(MAX_TRANSACTION_ATTEMPTS > DEFAULT_MAX_SPOTS_CEILING);

    const RACERS: usize = 80;
    const EDITORS: usize = 4;
    let spots = DEFAULT_MAX_SPOTS_CEILING;

    let repo = Arc::new(memory_repository());
    let creator = user("creator");
    let created = repo
        .create(Some(&creator), new_activity("League night", spots))
        .await
        .unwrap();

    let barrier = Arc::new(tokio::sync::Barrier::new(RACERS + EDITORS));
    let mut joins = Vec::new();
    for i in 0..RACERS {
        let repo = repo.clone();
        let barrier = barrier.clone();
        let id = created.id.clone();
        joins.push(tokio::spawn(async move {
            barrier.wait().await;
            repo.join(Some(&user(&format!("player-{}", i))), &id).await
        }));
    }
    let mut edits = Vec::new();
    for i in 0..EDITORS {
        let repo = repo.clone();
        let barrier = barrier.clone();
        let id = created.id.clone();
        let creator = creator.clone();
        edits.push(tokio::spawn(async move {
            barrier.wait().await;
            let patch = ActivityPatch {
                location: Some(format!("Court {}", i)),
                ..Default::default()
            };
            repo.update(Some(&creator), &id, patch).await
        }));
    }

    let mut joined = 0;
    for handle in joins {
        match handle.await.unwrap() {
            Ok(_) => joined += 1,
            Err(AppError::Full) => {}
            Err(e) => panic!("unexpected join error: {e}"),
        }
    }
    for handle in edits {
        handle.await.unwrap().unwrap();
    }

    assert_eq!(joined, spots as usize);
    assert_eq!(repo.get(&created.id).await.unwrap().current_joined, spots);
}

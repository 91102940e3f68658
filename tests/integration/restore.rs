use pretty_assertions::assert_eq;
use serenity::model::id::UserId;
use tokio_test::{assert_err, assert_ok};

use melody::commands::music::utils::lavalink_rest::LoadResult;
use melody::commands::music::utils::music_manager::{MusicError, saved_track_query};
use melody::commands::music::utils::queue_manager::{LoopMode, QueueSnapshot, Track};
use melody::utils::database::Database;

use crate::common::fixtures::{GUILD, TEXT, VOICE};
use crate::common::mocks::{MockNode, fresh_voice, idle_backend, online_node};
use crate::common::{init_tracing, manager, track};

fn saved_snapshot() -> QueueSnapshot {
    let requester = UserId::new(9);
    QueueSnapshot {
        current: Some(track("a").with_requester(requester)),
        upcoming: vec![track("b").with_requester(requester), track("gone")],
        loop_mode: LoopMode::Queue,
        volume: 100,
        text_channel: Some(TEXT),
        ..Default::default()
    }
}

/// Answers every lookup with a freshly encoded copy, except for `gone`.
fn resolving_node() -> MockNode {
    let mut node = online_node();
    node.expect_load().returning(|query| {
        if query == "gone" {
            return Ok(LoadResult::Empty);
        }
        Ok(LoadResult::Track(Track {
            encoded: format!("fresh-{}", query),
            ..track(query)
        }))
    });
    node
}

#[tokio::test]
async fn saved_queue_is_resolved_again_and_cleared() {
    init_tracing();
    let database = Database::open_in_memory().unwrap();
    database.save_queue(GUILD, &saved_snapshot()).unwrap();

    let mut backend = idle_backend();
    backend
        .expect_play()
        .withf(|_, track| track.encoded == "fresh-a")
        .times(1)
        .returning(|_, _| Ok(()));
    let music = manager(backend, fresh_voice(), resolving_node(), Some(database.clone()));

    let restored = assert_ok!(music.restore_saved_queue(GUILD, VOICE, Some(TEXT)).await);
    assert_eq!(restored.restored, 2);
    assert_eq!(restored.skipped, 1);
    assert_eq!(restored.queue_len, 1);

    let first = restored.first.unwrap();
    assert_eq!(first.identifier, "a");
    assert_eq!(first.requester, Some(UserId::new(9)));

    let queue = music.queue(GUILD).await.unwrap();
    assert_eq!(queue.loop_mode, LoopMode::Queue);
    assert_eq!(music.saved_queue(GUILD).unwrap(), None);
}

#[tokio::test]
async fn nothing_saved_means_no_results() {
    init_tracing();
    let music = manager(
        idle_backend(),
        fresh_voice(),
        online_node(),
        Some(Database::open_in_memory().unwrap()),
    );

    let err = assert_err!(music.restore_saved_queue(GUILD, VOICE, None).await);
    assert_eq!(err, MusicError::NoResults);
    assert!(!music.is_active(GUILD).await);
}

#[tokio::test]
async fn unresolvable_queue_leaves_and_keeps_the_save() {
    init_tracing();
    let database = Database::open_in_memory().unwrap();
    let snapshot = QueueSnapshot {
        current: Some(track("gone")),
        ..Default::default()
    };
    database.save_queue(GUILD, &snapshot).unwrap();

    let music = manager(
        idle_backend(),
        fresh_voice(),
        resolving_node(),
        Some(database.clone()),
    );

    let err = assert_err!(music.restore_saved_queue(GUILD, VOICE, None).await);
    assert_eq!(err, MusicError::NoResults);
    assert!(!music.is_active(GUILD).await);
    assert_eq!(music.saved_queue(GUILD).unwrap(), Some(snapshot));
}

#[test]
fn saved_tracks_prefer_their_uri() {
    let mut linked = track("a");
    linked.uri = Some("https://youtu.be/a".to_string());
    assert_eq!(saved_track_query(&linked), "https://youtu.be/a");
    assert_eq!(saved_track_query(&track("b")), "b");
}

use assert_matches::assert_matches;
use pretty_assertions::assert_eq;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_test::{assert_err, assert_ok};

use melody::commands::music::utils::backend::PlayerSnapshot;
use melody::commands::music::utils::music_manager::{EndOutcome, MusicError, ReconnectPlan};
use melody::commands::music::utils::queue_manager::{EndReason, QueueSnapshot, Track};
use melody::utils::database::Database;

use crate::common::fixtures::{GUILD, TEXT, VOICE};
use crate::common::mocks::{fresh_voice, idle_backend, online_node};
use crate::common::{init_tracing, manager, track};

type Played = Arc<Mutex<Vec<String>>>;

fn record_plays(backend: &mut crate::common::mocks::MockBackend) -> Played {
    let played: Played = Arc::default();
    let log = Arc::clone(&played);
    backend.expect_play().returning(move |_, track: &Track| {
        log.lock().unwrap().push(track.identifier.clone());
        Ok(())
    });
    played
}

#[tokio::test]
async fn queue_survives_skip_to_and_is_saved_on_stop() {
    init_tracing();
    let database = Database::open_in_memory().unwrap();

    let mut backend = idle_backend();
    let played = record_plays(&mut backend);
    backend.expect_stop().times(1).returning(|_| Ok(()));
    let music = manager(backend, fresh_voice(), online_node(), Some(database.clone()));

    let plan = assert_ok!(music.ensure_active_player(GUILD, VOICE, Some(TEXT)).await);
    assert_eq!(plan, ReconnectPlan::Connect);
    assert_eq!(music.text_channel(GUILD).await, Some(TEXT));
    assert_eq!(music.voice_channel(GUILD).await, Some(VOICE));

    let enqueued = assert_ok!(
        music
            .play_or_enqueue(GUILD, vec![track("a"), track("b"), track("c")], None)
            .await
    );
    assert_eq!(enqueued.started.map(|t| t.identifier), Some("a".to_string()));
    assert_eq!(enqueued.first_position, 0);
    assert_eq!(enqueued.added, 3);
    assert_eq!(enqueued.queue_len, 2);

    // Jumping to #2 drops "b"; the stop makes the node report the end of "a".
    let target = assert_ok!(music.skip_to(GUILD, 2).await);
    assert_eq!(target.identifier, "c");

    let outcome = music
        .handle_track_end(GUILD, track("a"), EndReason::Stopped)
        .await;
    assert_matches!(
        outcome,
        EndOutcome::Continued { next, clear_message: true } if next.identifier == "c"
    );
    assert_eq!(*played.lock().unwrap(), vec!["a".to_string(), "c".to_string()]);

    let queued = assert_ok!(music.play_or_enqueue(GUILD, vec![track("d")], None).await);
    assert_eq!(queued.started, None);
    assert_eq!(queued.first_position, 1);
    assert_eq!(queued.eta, Duration::from_secs(180));

    let snapshot = assert_ok!(music.stop(GUILD).await).unwrap();
    assert!(!music.is_active(GUILD).await);

    let saved: QueueSnapshot = music.saved_queue(GUILD).unwrap().unwrap();
    assert_eq!(saved, snapshot);
    assert_eq!(
        saved.tracks().map(|t| t.identifier.as_str()).collect::<Vec<_>>(),
        vec!["c", "d"]
    );
    assert_eq!(saved.text_channel, Some(TEXT));
}

#[tokio::test]
async fn finishing_the_last_track_ends_the_queue() {
    init_tracing();
    let mut backend = idle_backend();
    let played = record_plays(&mut backend);
    let music = manager(backend, fresh_voice(), online_node(), None);

    assert_ok!(music.ensure_active_player(GUILD, VOICE, None).await);
    assert_ok!(music.play_or_enqueue(GUILD, vec![track("only")], None).await);

    let outcome = music
        .handle_track_end(GUILD, track("only"), EndReason::Finished)
        .await;
    assert_matches!(outcome, EndOutcome::Finished { clear_message: true });
    assert_eq!(music.current_track(GUILD).await, None);
    assert_eq!(played.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn eta_counts_remaining_time_of_the_current_track() {
    init_tracing();
    let mut backend = crate::common::mocks::MockBackend::new();
    backend.expect_connect().returning(|_, _| Ok(()));
    backend.expect_play().returning(|_, _| Ok(()));
    backend.expect_player_state().returning(|_| {
        Ok(Some(PlayerSnapshot {
            position: Duration::from_secs(30),
            connected: true,
            ..Default::default()
        }))
    });
    let music = manager(backend, fresh_voice(), online_node(), None);

    assert_ok!(music.ensure_active_player(GUILD, VOICE, None).await);
    assert_ok!(music.play_or_enqueue(GUILD, vec![track("now")], None).await);

    let mut stream = track("radio");
    stream.is_stream = true;
    let queued = assert_ok!(
        music
            .play_or_enqueue(GUILD, vec![stream, track("later")], None)
            .await
    );
    assert_eq!(queued.first_position, 1);
    assert_eq!(queued.eta, Duration::from_secs(150));

    let last = assert_ok!(music.play_or_enqueue(GUILD, vec![track("last")], None).await);
    assert_eq!(last.first_position, 3);
    assert_eq!(last.eta, Duration::from_secs(150 + 180));
}

#[tokio::test]
async fn stopping_when_not_connected_is_an_error() {
    init_tracing();
    let music = manager(idle_backend(), fresh_voice(), online_node(), None);

    let err = assert_err!(music.stop(GUILD).await);
    assert_eq!(err, MusicError::NotConnected);
}

use super::*;
use tokio::sync::mpsc;

fn track(id: &str, title: &str, artist: &str) -> Track {
    Track { id: id.to_owned(), title: title.to_owned(), artist: artist.to_owned() }
}

async fn player_with_capture() -> (Player, mpsc::UnboundedReceiver<Frame>) {
    let (conn, rx) = Connection::test_connected("u1").await;
    let player = Player::new(ActivityBroadcaster::new(conn, "u1"));
    (player, rx)
}

fn drain_labels(rx: &mut mpsc::UnboundedReceiver<Frame>) -> Vec<String> {
    let mut labels = Vec::new();
    while let Ok(frame) = rx.try_recv() {
        assert_eq!(frame.event, "activity:update");
        assert_eq!(frame.data.get("peer_id").and_then(|v| v.as_str()), Some("u1"));
        labels.push(
            frame
                .data
                .get("activity")
                .and_then(|v| v.as_str())
                .expect("activity label present")
                .to_owned(),
        );
    }
    labels
}

#[tokio::test]
async fn play_pause_play_stop_emits_exactly_four_updates() {
    let (mut player, mut rx) = player_with_capture().await;

    player.play_album(vec![track("1", "A", "X")], 0).await;
    player.toggle_play().await;
    player.set_current(track("2", "B", "Y")).await;
    player.stop().await;

    let labels = drain_labels(&mut rx);
    assert_eq!(labels, vec!["Playing A by X", "Idle", "Playing B by Y", "Idle"]);
}

#[tokio::test]
async fn advance_to_next_track_reemits() {
    let (mut player, mut rx) = player_with_capture().await;

    player.play_album(vec![track("1", "A", "X"), track("2", "B", "X")], 0).await;
    player.play_next().await;

    let labels = drain_labels(&mut rx);
    assert_eq!(labels, vec!["Playing A by X", "Playing B by X"]);
    assert_eq!(player.current().map(|t| t.id.as_str()), Some("2"));
    assert!(player.is_playing());
}

#[tokio::test]
async fn queue_exhaustion_is_identical_to_stop() {
    let (mut player, mut rx) = player_with_capture().await;

    player.play_album(vec![track("1", "A", "X")], 0).await;
    player.play_next().await;

    let labels = drain_labels(&mut rx);
    assert_eq!(labels, vec!["Playing A by X", "Idle"]);
    assert!(player.current().is_none());
    assert!(!player.is_playing());
}

#[tokio::test]
async fn previous_off_the_head_is_identical_to_stop() {
    let (mut player, mut rx) = player_with_capture().await;

    player.play_album(vec![track("1", "A", "X"), track("2", "B", "X")], 0).await;
    player.play_previous().await;

    let labels = drain_labels(&mut rx);
    assert_eq!(labels, vec!["Playing A by X", "Idle"]);
}

#[tokio::test]
async fn previous_steps_back_within_queue() {
    let (mut player, mut rx) = player_with_capture().await;

    player.play_album(vec![track("1", "A", "X"), track("2", "B", "X")], 1).await;
    player.play_previous().await;

    let labels = drain_labels(&mut rx);
    assert_eq!(labels, vec!["Playing B by X", "Playing A by X"]);
}

#[tokio::test]
async fn duplicate_label_is_not_elided() {
    let (mut player, mut rx) = player_with_capture().await;

    player.play_album(vec![track("1", "A", "X")], 0).await;
    player.set_current(track("1", "A", "X")).await;

    let labels = drain_labels(&mut rx);
    assert_eq!(labels, vec!["Playing A by X", "Playing A by X"]);
}

#[tokio::test]
async fn toggle_with_no_current_track_emits_idle() {
    let (mut player, mut rx) = player_with_capture().await;

    player.toggle_play().await;

    assert_eq!(drain_labels(&mut rx), vec!["Idle"]);
    assert!(player.is_playing(), "the flag still flips without a track");
}

#[tokio::test]
async fn initialize_queue_seeds_without_emitting() {
    let (mut player, mut rx) = player_with_capture().await;

    player.initialize_queue(vec![track("1", "A", "X")]);

    assert!(drain_labels(&mut rx).is_empty());
    assert_eq!(player.current().map(|t| t.id.as_str()), Some("1"));
    assert!(!player.is_playing());
}

#[tokio::test]
async fn play_album_with_bad_start_index_is_a_guarded_noop() {
    let (mut player, mut rx) = player_with_capture().await;

    player.play_album(vec![track("1", "A", "X")], 5).await;
    player.play_album(Vec::new(), 0).await;

    assert!(drain_labels(&mut rx).is_empty());
    assert!(player.current().is_none());
}

#[tokio::test]
async fn broadcast_failure_does_not_block_the_transition() {
    // Disconnected connection: every emit fails, playback must not care.
    let conn = Connection::new();
    let mut player = Player::new(ActivityBroadcaster::new(conn, "u1"));

    player.play_album(vec![track("1", "A", "X")], 0).await;

    assert!(player.is_playing());
    assert_eq!(player.current().map(|t| t.title.as_str()), Some("A"));
}

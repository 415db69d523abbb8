use super::*;
use crate::state::test_helpers;

fn request_json(frame: &Frame) -> String {
    serde_json::to_string(frame).expect("serialize request")
}

fn chat_send_frame(receiver: &str, sender: &str, content: &str) -> Frame {
    Frame::request("chat:send", Data::new())
        .with_data("receiver_id", receiver)
        .with_data("sender_id", sender)
        .with_data("content", content)
}

// =============================================================================
// PRESENCE
// =============================================================================

#[tokio::test]
async fn announce_replies_roster_and_snapshot() {
    let state = AppState::new();
    let mut rx_u1 = test_helpers::seed_peer(&state, "u1").await;
    let _rx_u2 = test_helpers::seed_peer(&state, "u2").await;
    state
        .activities
        .write()
        .await
        .insert("u2".to_owned(), "Idle".to_owned());

    let req = Frame::request("presence:announce", Data::new()).with_data("peer_id", "u1");
    let replies = process_inbound_text(&state, "u1", &request_json(&req)).await;

    assert_eq!(replies.len(), 2);
    assert_eq!(replies[0].event, "presence:roster");
    let peers: Vec<String> = replies[0]
        .data
        .get("peers")
        .and_then(|v| serde_json::from_value(v.clone()).ok())
        .expect("roster peers");
    assert!(peers.contains(&"u1".to_owned()));
    assert!(peers.contains(&"u2".to_owned()));

    assert_eq!(replies[1].event, "activity:snapshot");
    let pairs: Vec<(String, String)> = replies[1]
        .data
        .get("activities")
        .and_then(|v| serde_json::from_value(v.clone()).ok())
        .expect("snapshot pairs");
    assert!(pairs.contains(&("u2".to_owned(), "Idle".to_owned())));

    // The announcer gets no join broadcast of itself.
    assert!(rx_u1.try_recv().is_err());
}

#[tokio::test]
async fn announce_broadcasts_join_to_other_peers() {
    let state = AppState::new();
    let _rx_u1 = test_helpers::seed_peer(&state, "u1").await;
    let mut rx_u2 = test_helpers::seed_peer(&state, "u2").await;

    let req = Frame::request("presence:announce", Data::new());
    process_inbound_text(&state, "u1", &request_json(&req)).await;

    let join = rx_u2.try_recv().expect("peer u2 should see the join");
    assert_eq!(join.event, "presence:join");
    assert_eq!(join.data.get("peer_id").and_then(|v| v.as_str()), Some("u1"));
}

// =============================================================================
// ACTIVITY
// =============================================================================

#[tokio::test]
async fn activity_update_upserts_and_broadcasts() {
    let state = AppState::new();
    let mut rx_u1 = test_helpers::seed_peer(&state, "u1").await;
    let mut rx_u2 = test_helpers::seed_peer(&state, "u2").await;

    let req = Frame::request("activity:update", Data::new())
        .with_data("peer_id", "u1")
        .with_data("activity", "Playing Lateralus by Tool");
    let replies = process_inbound_text(&state, "u1", &request_json(&req)).await;

    assert!(replies.is_empty(), "activity updates carry no ack");
    assert_eq!(
        state.activities.read().await.get("u1").map(String::as_str),
        Some("Playing Lateralus by Tool")
    );

    let update = rx_u2.try_recv().expect("peer u2 should see the update");
    assert_eq!(update.event, "activity:update");
    assert_eq!(update.from.as_deref(), Some("u1"));
    assert_eq!(
        update.data.get("activity").and_then(|v| v.as_str()),
        Some("Playing Lateralus by Tool")
    );
    assert!(rx_u1.try_recv().is_err(), "sender must not echo its own update");
}

#[tokio::test]
async fn activity_update_without_label_errors() {
    let state = AppState::new();
    let req = Frame::request("activity:update", Data::new());
    let replies = process_inbound_text(&state, "u1", &request_json(&req)).await;

    assert_eq!(replies.len(), 1);
    assert_eq!(replies[0].status, Status::Error);
    assert_eq!(replies[0].data.get("code").and_then(|v| v.as_str()), Some("E_BAD_REQUEST"));
    assert!(state.activities.read().await.is_empty());
}

// =============================================================================
// CHAT
// =============================================================================

#[tokio::test]
async fn chat_send_acks_stores_and_forwards() {
    let state = AppState::new();
    let _rx_u1 = test_helpers::seed_peer(&state, "u1").await;
    let mut rx_u2 = test_helpers::seed_peer(&state, "u2").await;

    let req = chat_send_frame("u2", "u1", "hi");
    let replies = process_inbound_text(&state, "u1", &request_json(&req)).await;

    assert_eq!(replies.len(), 1);
    let ack = &replies[0];
    assert_eq!(ack.status, Status::Done);
    assert_eq!(ack.parent_id, Some(req.id));
    assert!(ack.data.contains_key("id"));
    assert!(ack.data.contains_key("ts"));

    let stored = state.messages.read().await;
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].sender_id, "u1");
    assert_eq!(stored[0].receiver_id, "u2");
    assert_eq!(stored[0].content, "hi");

    let forwarded = rx_u2.try_recv().expect("receiver should get chat:receive");
    assert_eq!(forwarded.event, "chat:receive");
    assert_eq!(forwarded.data.get("content").and_then(|v| v.as_str()), Some("hi"));
    assert_eq!(forwarded.data.get("sender_id").and_then(|v| v.as_str()), Some("u1"));
}

#[tokio::test]
async fn chat_send_to_offline_receiver_still_acks() {
    let state = AppState::new();
    let _rx_u1 = test_helpers::seed_peer(&state, "u1").await;

    let req = chat_send_frame("ghost", "u1", "anyone there?");
    let replies = process_inbound_text(&state, "u1", &request_json(&req)).await;

    assert_eq!(replies.len(), 1);
    assert_eq!(replies[0].status, Status::Done);
    assert_eq!(state.messages.read().await.len(), 1);
}

#[tokio::test]
async fn chat_send_without_content_errors_and_stores_nothing() {
    let state = AppState::new();
    let req = Frame::request("chat:send", Data::new()).with_data("receiver_id", "u2");
    let replies = process_inbound_text(&state, "u1", &request_json(&req)).await;

    assert_eq!(replies.len(), 1);
    assert_eq!(replies[0].status, Status::Error);
    assert_eq!(replies[0].error_message(), Some("content required"));
    assert!(state.messages.read().await.is_empty());
}

// =============================================================================
// DISPATCH EDGES
// =============================================================================

#[tokio::test]
async fn unknown_prefix_returns_error_frame() {
    let state = AppState::new();
    let req = Frame::request("video:play", Data::new());
    let replies = process_inbound_text(&state, "u1", &request_json(&req)).await;

    assert_eq!(replies.len(), 1);
    assert_eq!(replies[0].status, Status::Error);
    assert_eq!(replies[0].data.get("code").and_then(|v| v.as_str()), Some("E_UNKNOWN_EVENT"));
}

#[tokio::test]
async fn invalid_json_returns_session_error() {
    let state = AppState::new();
    let replies = process_inbound_text(&state, "u1", "{not json").await;

    assert_eq!(replies.len(), 1);
    assert_eq!(replies[0].event, "session:error");
    assert!(replies[0].data.get("message").is_some());
}

use super::*;
use crate::frame::{Data, Frame};

#[test]
fn ws_url_derivation() {
    assert_eq!(ws_url_for("http://localhost:3000"), "ws://localhost:3000/api/ws");
    assert_eq!(ws_url_for("https://tunes.example"), "wss://tunes.example/api/ws");
}

#[tokio::test]
async fn new_client_starts_with_empty_projections() {
    let client = RealtimeClient::new("http://127.0.0.1:9", "u1");
    assert_eq!(client.peer_id(), "u1");
    assert_eq!(client.connection().status().await, ConnectionStatus::Disconnected);
    assert!(client.presence().snapshot().await.is_empty());
    assert!(client.activity().snapshot().await.is_empty());
    assert!(client.chat().log().await.is_empty());
}

#[tokio::test]
async fn teardown_resets_every_projection() {
    let client = RealtimeClient::new("http://127.0.0.1:9", "u1");
    client.presence.attach(&client.connection).await;
    client.activity.attach(&client.connection).await;
    client.chat.attach().await;

    client
        .connection
        .test_dispatch(Frame::request("presence:join", Data::new()).with_data("peer_id", "u2"))
        .await;
    client
        .connection
        .test_dispatch(
            Frame::request("activity:update", Data::new())
                .with_data("peer_id", "u2")
                .with_data("activity", "Idle"),
        )
        .await;
    client
        .connection
        .test_dispatch(
            Frame::request("chat:receive", Data::new())
                .with_data("id", "m1")
                .with_data("sender_id", "u2")
                .with_data("receiver_id", "u1")
                .with_data("content", "yo")
                .with_data("ts", 1),
        )
        .await;

    assert!(!client.presence().snapshot().await.is_empty());

    client.teardown().await;

    assert!(client.presence().snapshot().await.is_empty());
    assert!(client.activity().snapshot().await.is_empty());
    assert!(client.chat().log().await.is_empty());
}

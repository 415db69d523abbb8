use super::*;
use crate::state::test_helpers;
use axum::http::HeaderValue;

#[tokio::test]
async fn me_returns_header_identity() {
    let mut headers = HeaderMap::new();
    headers.insert("x-peer-id", HeaderValue::from_static("u1"));

    let Json(identity) = me(headers).await.expect("identity");
    assert_eq!(identity.id, "u1");
}

#[tokio::test]
async fn me_without_header_is_unauthorized() {
    let result = me(HeaderMap::new()).await;
    assert!(matches!(result, Err(StatusCode::UNAUTHORIZED)));
}

#[tokio::test]
async fn history_filters_conversation_both_directions() {
    let state = AppState::new();
    {
        let mut messages = state.messages.write().await;
        messages.push(test_helpers::dummy_message("u1", "u2", "hi"));
        messages.push(test_helpers::dummy_message("u2", "u1", "yo"));
        messages.push(test_helpers::dummy_message("u1", "u3", "unrelated"));
    }

    let Json(conversation) = conversation_history(
        State(state),
        Path("u2".to_owned()),
        Query(HistoryQuery { me: "u1".to_owned() }),
    )
    .await;

    assert_eq!(conversation.len(), 2);
    assert_eq!(conversation[0].content, "hi");
    assert_eq!(conversation[1].content, "yo");
}

#[tokio::test]
async fn history_for_unknown_peer_is_empty() {
    let state = AppState::new();
    let Json(conversation) = conversation_history(
        State(state),
        Path("nobody".to_owned()),
        Query(HistoryQuery { me: "u1".to_owned() }),
    )
    .await;
    assert!(conversation.is_empty());
}

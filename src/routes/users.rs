//! HTTP boundary routes — caller identity and conversation history.
//!
//! These are the two request/response collaborators the realtime client
//! consumes outside the websocket: who am I (before connect), and what was
//! said in a conversation (wholesale log replacement).

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::Json;
use serde::{Deserialize, Serialize};

use crate::state::{AppState, StoredMessage};

/// Identity of the authenticated caller.
#[derive(Debug, Serialize, Deserialize)]
pub struct Identity {
    pub id: String,
}

/// Query parameters for the history endpoint.
#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    /// Peer id of the caller's side of the conversation.
    pub me: String,
}

/// `GET /api/auth/me` — return the caller's peer identity.
///
/// Stands in for the upstream auth provider: the identity arrives in the
/// `x-peer-id` header the way a session cookie normally would.
pub async fn me(headers: HeaderMap) -> Result<Json<Identity>, StatusCode> {
    let peer_id = headers
        .get("x-peer-id")
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .ok_or(StatusCode::UNAUTHORIZED)?;

    Ok(Json(Identity { id: peer_id.to_owned() }))
}

/// `GET /api/users/{peer_id}/messages?me=` — conversation history between
/// the caller and one peer, both directions, in relay receipt order.
pub async fn conversation_history(
    State(state): State<AppState>,
    Path(peer_id): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> Json<Vec<StoredMessage>> {
    let messages = state.messages.read().await;
    let conversation: Vec<StoredMessage> = messages
        .iter()
        .filter(|m| {
            (m.sender_id == query.me && m.receiver_id == peer_id)
                || (m.sender_id == peer_id && m.receiver_id == query.me)
        })
        .cloned()
        .collect();

    Json(conversation)
}

#[cfg(test)]
#[path = "users_test.rs"]
mod tests;

//! WebSocket handler — presence, activity, and chat relay.
//!
//! DESIGN
//! ======
//! On upgrade, registers the peer and enters a `select!` loop:
//! - Incoming client frames → parse + dispatch by event prefix
//! - Frames queued by other peers → forward to this client
//!
//! Handler functions are pure business logic — they validate, mutate state,
//! and return an `Outcome`. The dispatch layer owns all outbound concerns:
//! acks to the sender, broadcasts to peers, forwards to a single receiver.
//!
//! LIFECYCLE
//! =========
//! 1. Upgrade with `?peer_id=` → peer registered in `AppState`
//! 2. Client sends `presence:announce` → roster + activity snapshot to the
//!    announcer, `presence:join` to everyone else
//! 3. `activity:update` / `chat:send` frames → dispatch → Outcome
//! 4. Close → deregister → broadcast `presence:leave`. The client never
//!    announces its own departure; the relay is the authority for that.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use std::collections::HashMap;
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::frame::{Data, ErrorCode, Frame, Status, now_ms};
use crate::state::{AppState, StoredMessage};

// =============================================================================
// OUTCOME
// =============================================================================

/// Result returned by handler functions. The dispatch layer uses this to
/// decide who receives what — handlers never send frames directly.
enum Outcome {
    /// Send done+data to sender only.
    Ack(Data),
    /// Unsolicited event frames to the sender plus one frame broadcast to
    /// all other peers. No ack. Used for the announce exchange.
    EventsAndBroadcast { events: Vec<Frame>, broadcast: Frame },
    /// Broadcast one frame to all peers except the sender. No reply.
    BroadcastExcludeSender(Frame),
    /// Ack the sender and forward one frame to a single peer, if online.
    AckAndForward { ack: Data, receiver: String, forward: Frame },
}

// =============================================================================
// ERRORS
// =============================================================================

#[derive(Debug, thiserror::Error)]
enum RelayError {
    #[error("{0} required")]
    MissingField(&'static str),
    #[error("unknown event: {0}")]
    UnknownEvent(String),
}

impl ErrorCode for RelayError {
    fn error_code(&self) -> &'static str {
        match self {
            RelayError::MissingField(_) => "E_BAD_REQUEST",
            RelayError::UnknownEvent(_) => "E_UNKNOWN_EVENT",
        }
    }
}

// =============================================================================
// UPGRADE
// =============================================================================

pub async fn handle_ws(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
    ws: WebSocketUpgrade,
) -> Response {
    let Some(peer_id) = params.get("peer_id").cloned() else {
        return (StatusCode::UNAUTHORIZED, "peer_id required").into_response();
    };
    if peer_id.is_empty() {
        return (StatusCode::UNAUTHORIZED, "peer_id required").into_response();
    }

    ws.on_upgrade(move |socket| run_ws(socket, state, peer_id))
}

// =============================================================================
// CONNECTION
// =============================================================================

async fn run_ws(mut socket: WebSocket, state: AppState, peer_id: String) {
    // Per-connection channel for frames queued by other peers.
    let (client_tx, mut client_rx) = mpsc::channel::<Frame>(256);
    state.peers.write().await.insert(peer_id.clone(), client_tx);

    info!(%peer_id, "ws: peer connected");

    loop {
        tokio::select! {
            msg = socket.recv() => {
                let Some(msg) = msg else { break };
                let Ok(msg) = msg else { break };
                match msg {
                    Message::Text(text) => {
                        let replies = process_inbound_text(&state, &peer_id, &text).await;
                        for frame in replies {
                            if send_frame(&mut socket, &frame).await.is_err() {
                                break;
                            }
                        }
                    }
                    Message::Close(_) => break,
                    _ => {}
                }
            }
            Some(frame) = client_rx.recv() => {
                if send_frame(&mut socket, &frame).await.is_err() {
                    break;
                }
            }
        }
    }

    // Deregister BEFORE the leave broadcast so the departed peer is already
    // absent from any roster built afterwards.
    state.peers.write().await.remove(&peer_id);
    state.activities.write().await.remove(&peer_id);

    let leave = Frame::request("presence:leave", Data::new()).with_data("peer_id", peer_id.clone());
    state.broadcast(&leave, Some(&peer_id)).await;

    info!(%peer_id, "ws: peer disconnected");
}

// =============================================================================
// FRAME DISPATCH
// =============================================================================

/// Parse and process one inbound text frame and return frames for the sender.
///
/// This keeps the websocket transport concerns separate from frame handling,
/// so tests can exercise dispatch and relay behavior without a socket.
pub(crate) async fn process_inbound_text(state: &AppState, peer_id: &str, text: &str) -> Vec<Frame> {
    let mut req: Frame = match serde_json::from_str(text) {
        Ok(r) => r,
        Err(e) => {
            warn!(%peer_id, error = %e, "ws: invalid inbound frame");
            let err = Frame::request("session:error", Data::new())
                .with_data("message", format!("invalid json: {e}"));
            return vec![err];
        }
    };

    // Stamp the authenticated peer id as `from`.
    req.from = Some(peer_id.to_owned());

    info!(%peer_id, id = %req.id, event = %req.event, status = ?req.status, "ws: recv frame");

    // Dispatch to handler — returns Outcome or error Frame.
    let result = match req.prefix() {
        "presence" => handle_presence(state, peer_id, &req).await,
        "activity" => handle_activity(state, peer_id, &req).await,
        "chat" => handle_chat(state, peer_id, &req).await,
        _ => Err(req.error_from(&RelayError::UnknownEvent(req.event.clone()))),
    };

    // Apply outcome — the dispatch layer owns all outbound logic.
    match result {
        Ok(Outcome::Ack(data)) => vec![req.done_with(data)],
        Ok(Outcome::EventsAndBroadcast { events, broadcast }) => {
            state.broadcast(&broadcast, Some(peer_id)).await;
            events
        }
        Ok(Outcome::BroadcastExcludeSender(frame)) => {
            state.broadcast(&frame, Some(peer_id)).await;
            vec![]
        }
        Ok(Outcome::AckAndForward { ack, receiver, forward }) => {
            if !state.forward(&receiver, forward).await {
                info!(%receiver, "ws: receiver offline, message stored only");
            }
            vec![req.done_with(ack)]
        }
        Err(err_frame) => vec![err_frame],
    }
}

// =============================================================================
// PRESENCE HANDLER
// =============================================================================

async fn handle_presence(state: &AppState, peer_id: &str, req: &Frame) -> Result<Outcome, Frame> {
    let op = req.event.split_once(':').map_or("", |(_, op)| op);

    match op {
        "announce" => {
            let roster = state.roster().await;
            let pairs = state.activity_pairs().await;

            let roster_frame = Frame::request("presence:roster", Data::new())
                .with_data("peers", serde_json::json!(roster));
            let snapshot_frame = Frame::request("activity:snapshot", Data::new())
                .with_data("activities", serde_json::json!(pairs));
            let join = Frame::request("presence:join", Data::new())
                .with_data("peer_id", peer_id.to_owned());

            Ok(Outcome::EventsAndBroadcast {
                events: vec![roster_frame, snapshot_frame],
                broadcast: join,
            })
        }
        _ => Err(req.error_from(&RelayError::UnknownEvent(req.event.clone()))),
    }
}

// =============================================================================
// ACTIVITY HANDLER
// =============================================================================

async fn handle_activity(state: &AppState, peer_id: &str, req: &Frame) -> Result<Outcome, Frame> {
    let op = req.event.split_once(':').map_or("", |(_, op)| op);

    match op {
        "update" => {
            let Some(activity) = req.data.get("activity").and_then(|v| v.as_str()) else {
                return Err(req.error_from(&RelayError::MissingField("activity")));
            };
            // Subject of the update; defaults to the authenticated sender
            // when the payload names none.
            let subject = req
                .data
                .get("peer_id")
                .and_then(|v| v.as_str())
                .unwrap_or(peer_id);

            state
                .activities
                .write()
                .await
                .insert(subject.to_owned(), activity.to_owned());

            let update = Frame::request("activity:update", Data::new())
                .with_from(peer_id)
                .with_data("peer_id", subject.to_owned())
                .with_data("activity", activity.to_owned());

            Ok(Outcome::BroadcastExcludeSender(update))
        }
        _ => Err(req.error_from(&RelayError::UnknownEvent(req.event.clone()))),
    }
}

// =============================================================================
// CHAT HANDLER
// =============================================================================

async fn handle_chat(state: &AppState, peer_id: &str, req: &Frame) -> Result<Outcome, Frame> {
    let op = req.event.split_once(':').map_or("", |(_, op)| op);

    match op {
        "send" => {
            let Some(receiver_id) = req.data.get("receiver_id").and_then(|v| v.as_str()) else {
                return Err(req.error_from(&RelayError::MissingField("receiver_id")));
            };
            let Some(content) = req.data.get("content").and_then(|v| v.as_str()) else {
                return Err(req.error_from(&RelayError::MissingField("content")));
            };
            let sender_id = req
                .data
                .get("sender_id")
                .and_then(|v| v.as_str())
                .unwrap_or(peer_id);

            let stored = StoredMessage {
                id: Uuid::new_v4(),
                sender_id: sender_id.to_owned(),
                receiver_id: receiver_id.to_owned(),
                content: content.to_owned(),
                ts: now_ms(),
            };

            let mut ack = Data::new();
            ack.insert("id".into(), serde_json::json!(stored.id));
            ack.insert("ts".into(), serde_json::json!(stored.ts));

            let forward = Frame::request("chat:receive", Data::new())
                .with_from(sender_id)
                .with_data("id", stored.id.to_string())
                .with_data("sender_id", stored.sender_id.clone())
                .with_data("receiver_id", stored.receiver_id.clone())
                .with_data("content", stored.content.clone())
                .with_data("ts", stored.ts);

            state.messages.write().await.push(stored);

            Ok(Outcome::AckAndForward { ack, receiver: receiver_id.to_owned(), forward })
        }
        _ => Err(req.error_from(&RelayError::UnknownEvent(req.event.clone()))),
    }
}

// =============================================================================
// HELPERS
// =============================================================================

async fn send_frame(socket: &mut WebSocket, frame: &Frame) -> Result<(), ()> {
    let json = match serde_json::to_string(frame) {
        Ok(j) => j,
        Err(e) => {
            warn!(error = %e, "ws: failed to serialize frame");
            return Err(());
        }
    };
    if frame.status == Status::Error {
        warn!(id = %frame.id, event = %frame.event, message = frame.error_message().unwrap_or("-"), "ws: send frame status=Error");
    } else {
        info!(id = %frame.id, event = %frame.event, status = ?frame.status, "ws: send frame");
    }
    socket.send(Message::Text(json.into())).await.map_err(|_| ())
}

#[cfg(test)]
#[path = "ws_test.rs"]
mod tests;

//! Message channel — acked sends, inbound receives, one append-only log.
//!
//! DESIGN
//! ======
//! The log is ordered by local arrival: a send is appended when its
//! acknowledgment resolves, an inbound message when its event arrives. No
//! global interleaving is attempted, and no FIFO ordering is assumed across
//! the two paths — an inbound message may land before an earlier send's ack.
//! The only operation that can shrink the log is a wholesale history fetch.
//!
//! Failures never unwind across the event loop; they land in this
//! component's error slot and in the return value.

use std::sync::Arc;

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::warn;

use crate::client::connection::{Connection, ConnectionStatus};
use crate::client::error::ClientError;
use crate::frame::{Data, Frame, Status};

// =============================================================================
// MESSAGE
// =============================================================================

/// An immutable chat message as the client logs it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Relay-assigned identifier.
    pub id: String,
    pub sender_id: String,
    pub receiver_id: String,
    pub content: String,
    /// Relay-assigned milliseconds since Unix epoch.
    pub ts: i64,
}

// =============================================================================
// MESSAGE CHANNEL
// =============================================================================

/// Owner of the local message log.
#[derive(Clone)]
pub struct MessageChannel {
    conn: Connection,
    http: reqwest::Client,
    base_url: String,
    log: Arc<RwLock<Vec<Message>>>,
    last_error: Arc<RwLock<Option<ClientError>>>,
}

impl MessageChannel {
    #[must_use]
    pub fn new(conn: Connection, base_url: impl Into<String>) -> Self {
        Self {
            conn,
            http: reqwest::Client::new(),
            base_url: base_url.into(),
            log: Arc::new(RwLock::new(Vec::new())),
            last_error: Arc::new(RwLock::new(None)),
        }
    }

    /// Register the inbound-message handler on the connection.
    ///
    /// Inbound messages append unconditionally: sent and received are
    /// disjoint directions, a sender never receives its own send back.
    pub async fn attach(&self) {
        let log = Arc::clone(&self.log);
        self.conn
            .on(
                "chat:receive",
                Arc::new(move |frame: Frame| {
                    let log = Arc::clone(&log);
                    Box::pin(async move {
                        match parse_message(&frame) {
                            Some(msg) => log.write().await.push(msg),
                            None => warn!(id = %frame.id, "chat: undecodable inbound message"),
                        }
                    }) as BoxFuture<'static, ()>
                }),
            )
            .await;
    }

    /// Send one message and suspend until the relay acknowledges it.
    ///
    /// On a success ack the sender's own copy is appended to the log — the
    /// relay does not echo it back. On a rejection nothing is appended and
    /// the relay's reason lands in the error slot.
    ///
    /// # Errors
    ///
    /// `NotConnected` when the channel is not open (no transport action is
    /// taken), `DeliveryFailed` on rejection, `TransportError` when the
    /// channel dies mid-flight.
    pub async fn send(&self, receiver_id: &str, sender_id: &str, content: &str) -> Result<(), ClientError> {
        if self.conn.status().await != ConnectionStatus::Connected {
            warn!("chat: send attempted while disconnected");
            return Err(self.record(ClientError::NotConnected).await);
        }

        let req = Frame::request("chat:send", Data::new())
            .with_from(sender_id)
            .with_data("receiver_id", receiver_id)
            .with_data("sender_id", sender_id)
            .with_data("content", content);

        let reply = match self.conn.request(req).await {
            Ok(reply) => reply,
            Err(e) => return Err(self.record(e).await),
        };

        if reply.status == Status::Done {
            let id = reply
                .data
                .get("id")
                .and_then(|v| v.as_str())
                .map_or_else(|| reply.id.to_string(), ToOwned::to_owned);
            let ts = reply.data.get("ts").and_then(serde_json::Value::as_i64).unwrap_or(reply.ts);
            self.log.write().await.push(Message {
                id,
                sender_id: sender_id.to_owned(),
                receiver_id: receiver_id.to_owned(),
                content: content.to_owned(),
                ts,
            });
            Ok(())
        } else {
            let reason = reply.error_message().unwrap_or("message rejected").to_owned();
            warn!(%reason, "chat: send rejected by relay");
            Err(self.record(ClientError::DeliveryFailed(reason)).await)
        }
    }

    /// Replace the log wholesale with the relay's stored conversation
    /// between `me` and `peer_id`.
    ///
    /// The only path that may shrink the log; a failed fetch leaves it
    /// untouched.
    ///
    /// # Errors
    ///
    /// `HistoryFetchFailed`, also recorded in the error slot.
    pub async fn fetch_history(&self, me: &str, peer_id: &str) -> Result<(), ClientError> {
        let url = format!("{}/api/users/{peer_id}/messages", self.base_url);
        let fetched: Result<Vec<Message>, reqwest::Error> = async {
            self.http
                .get(&url)
                .query(&[("me", me)])
                .send()
                .await?
                .error_for_status()?
                .json()
                .await
        }
        .await;

        match fetched {
            Ok(messages) => {
                *self.log.write().await = messages;
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "chat: history fetch failed");
                Err(self.record(ClientError::HistoryFetchFailed(e.to_string())).await)
            }
        }
    }

    /// Current log, in local arrival order.
    pub async fn log(&self) -> Vec<Message> {
        self.log.read().await.clone()
    }

    /// Last chat failure, left in place.
    pub async fn last_error(&self) -> Option<ClientError> {
        self.last_error.read().await.clone()
    }

    /// Last chat failure, clearing the slot.
    pub async fn take_error(&self) -> Option<ClientError> {
        self.last_error.write().await.take()
    }

    /// Empty the log. Teardown only.
    pub async fn clear(&self) {
        self.log.write().await.clear();
    }

    async fn record(&self, err: ClientError) -> ClientError {
        *self.last_error.write().await = Some(err.clone());
        err
    }
}

fn parse_message(frame: &Frame) -> Option<Message> {
    let value = serde_json::to_value(&frame.data).ok()?;
    serde_json::from_value(value).ok()
}

#[cfg(test)]
#[path = "chat_test.rs"]
mod tests;

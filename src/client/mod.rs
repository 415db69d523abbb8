//! Client realtime subsystem.
//!
//! DESIGN
//! ======
//! One `Connection` owns the duplex channel; three projections — online set,
//! activity map, message log — each subscribe to their events and own their
//! state exclusively. The playback bridge is a pure producer on the same
//! channel. No component bypasses the transport to touch another's
//! projection.
//!
//! `RealtimeClient` is the owned context bundling all of it, with an
//! explicit `init`/`teardown` lifecycle instead of ambient globals.

pub mod activity;
pub mod api;
pub mod chat;
pub mod connection;
pub mod error;
pub mod player;
pub mod presence;

use std::sync::atomic::{AtomicBool, Ordering};

pub use activity::ActivityTracker;
pub use chat::{Message, MessageChannel};
pub use connection::{Connection, ConnectionStatus, EventHandler};
pub use error::ClientError;
pub use player::{ActivityBroadcaster, Player, Track};
pub use presence::PresenceTracker;

/// Owned context for the whole realtime subsystem.
pub struct RealtimeClient {
    peer_id: String,
    ws_url: String,
    connection: Connection,
    presence: PresenceTracker,
    activity: ActivityTracker,
    chat: MessageChannel,
    attached: AtomicBool,
}

impl RealtimeClient {
    /// Build a detached context for `peer_id` against a relay at `base_url`
    /// (http/https; the websocket url is derived from it).
    #[must_use]
    pub fn new(base_url: &str, peer_id: &str) -> Self {
        let connection = Connection::new();
        Self {
            peer_id: peer_id.to_owned(),
            ws_url: ws_url_for(base_url),
            presence: PresenceTracker::new(),
            activity: ActivityTracker::new(),
            chat: MessageChannel::new(connection.clone(), base_url),
            connection,
            attached: AtomicBool::new(false),
        }
    }

    /// Wire every projection to the channel, then connect and announce.
    ///
    /// Safe to call again after a teardown: handlers register once, the
    /// connect itself is idempotent.
    ///
    /// # Errors
    ///
    /// Connect failures, see [`Connection::connect`].
    pub async fn init(&self) -> Result<(), ClientError> {
        if !self.attached.swap(true, Ordering::SeqCst) {
            self.presence.attach(&self.connection).await;
            self.activity.attach(&self.connection).await;
            self.chat.attach().await;
        }
        self.connection.connect(&self.ws_url, &self.peer_id).await
    }

    /// Disconnect and reset all three projections to empty.
    pub async fn teardown(&self) {
        self.connection.disconnect().await;
        self.presence.clear().await;
        self.activity.clear().await;
        self.chat.clear().await;
    }

    /// Send a chat message from this peer.
    ///
    /// # Errors
    ///
    /// See [`MessageChannel::send`].
    pub async fn send_message(&self, receiver_id: &str, content: &str) -> Result<(), ClientError> {
        self.chat.send(receiver_id, &self.peer_id, content).await
    }

    /// Replace the message log with the stored conversation with `peer_id`.
    ///
    /// # Errors
    ///
    /// See [`MessageChannel::fetch_history`].
    pub async fn fetch_history(&self, peer_id: &str) -> Result<(), ClientError> {
        self.chat.fetch_history(&self.peer_id, peer_id).await
    }

    /// A broadcaster for this peer, for the playback engine to own.
    #[must_use]
    pub fn broadcaster(&self) -> ActivityBroadcaster {
        ActivityBroadcaster::new(self.connection.clone(), self.peer_id.clone())
    }

    #[must_use]
    pub fn connection(&self) -> &Connection {
        &self.connection
    }

    #[must_use]
    pub fn presence(&self) -> &PresenceTracker {
        &self.presence
    }

    #[must_use]
    pub fn activity(&self) -> &ActivityTracker {
        &self.activity
    }

    #[must_use]
    pub fn chat(&self) -> &MessageChannel {
        &self.chat
    }

    #[must_use]
    pub fn peer_id(&self) -> &str {
        &self.peer_id
    }
}

fn ws_url_for(base_url: &str) -> String {
    let ws_base = if let Some(rest) = base_url.strip_prefix("https://") {
        format!("wss://{rest}")
    } else if let Some(rest) = base_url.strip_prefix("http://") {
        format!("ws://{rest}")
    } else {
        base_url.to_owned()
    };
    format!("{ws_base}/api/ws")
}

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;

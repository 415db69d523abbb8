//! Presence tracker — the set of peers currently online.
//!
//! All mutation is event-driven: a full roster replaces the set wholesale,
//! join/leave events mutate it incrementally. Set semantics absorb
//! duplicate and replayed events. The only query is a snapshot of the
//! current set; nothing here is caller-mutated.

use std::collections::HashSet;
use std::sync::Arc;

use futures::future::BoxFuture;
use tokio::sync::RwLock;

use crate::client::connection::Connection;
use crate::frame::Frame;

/// Client-side projection of who is online, as confirmed by the relay.
#[derive(Clone, Default)]
pub struct PresenceTracker {
    online: Arc<RwLock<HashSet<String>>>,
}

impl PresenceTracker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register this tracker's handlers on the connection.
    pub async fn attach(&self, conn: &Connection) {
        let online = Arc::clone(&self.online);
        conn.on(
            "presence:roster",
            Arc::new(move |frame: Frame| {
                let online = Arc::clone(&online);
                Box::pin(async move {
                    let peers: HashSet<String> = frame
                        .data
                        .get("peers")
                        .and_then(|v| serde_json::from_value(v.clone()).ok())
                        .unwrap_or_default();
                    *online.write().await = peers;
                }) as BoxFuture<'static, ()>
            }),
        )
        .await;

        let online = Arc::clone(&self.online);
        conn.on(
            "presence:join",
            Arc::new(move |frame: Frame| {
                let online = Arc::clone(&online);
                Box::pin(async move {
                    if let Some(peer) = peer_id_of(&frame) {
                        online.write().await.insert(peer);
                    }
                }) as BoxFuture<'static, ()>
            }),
        )
        .await;

        let online = Arc::clone(&self.online);
        conn.on(
            "presence:leave",
            Arc::new(move |frame: Frame| {
                let online = Arc::clone(&online);
                Box::pin(async move {
                    if let Some(peer) = peer_id_of(&frame) {
                        online.write().await.remove(&peer);
                    }
                }) as BoxFuture<'static, ()>
            }),
        )
        .await;
    }

    /// Current online set.
    pub async fn snapshot(&self) -> HashSet<String> {
        self.online.read().await.clone()
    }

    pub async fn is_online(&self, peer_id: &str) -> bool {
        self.online.read().await.contains(peer_id)
    }

    /// Empty the set. Teardown only — the set is otherwise server-driven.
    pub async fn clear(&self) {
        self.online.write().await.clear();
    }
}

fn peer_id_of(frame: &Frame) -> Option<String> {
    frame
        .data
        .get("peer_id")
        .and_then(|v| v.as_str())
        .map(ToOwned::to_owned)
}

#[cfg(test)]
#[path = "presence_test.rs"]
mod tests;

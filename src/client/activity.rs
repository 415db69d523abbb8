//! Activity tracker — what each peer is currently doing.
//!
//! A full snapshot replaces the map wholesale; single updates upsert one
//! key. Labels are opaque strings, never validated or truncated. Arrival
//! order at this client is authoritative: the last update observed wins.
//! Peers absent from the map are unknown/idle by convention, and a peer
//! going offline deliberately leaves its entry stale.

use std::collections::HashMap;
use std::sync::Arc;

use futures::future::BoxFuture;
use tokio::sync::RwLock;

use crate::client::connection::Connection;
use crate::frame::Frame;

/// Client-side projection of peer activity labels.
#[derive(Clone, Default)]
pub struct ActivityTracker {
    activities: Arc<RwLock<HashMap<String, String>>>,
}

impl ActivityTracker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register this tracker's handlers on the connection.
    pub async fn attach(&self, conn: &Connection) {
        let activities = Arc::clone(&self.activities);
        conn.on(
            "activity:snapshot",
            Arc::new(move |frame: Frame| {
                let activities = Arc::clone(&activities);
                Box::pin(async move {
                    let pairs: Vec<(String, String)> = frame
                        .data
                        .get("activities")
                        .and_then(|v| serde_json::from_value(v.clone()).ok())
                        .unwrap_or_default();
                    *activities.write().await = pairs.into_iter().collect();
                }) as BoxFuture<'static, ()>
            }),
        )
        .await;

        let activities = Arc::clone(&self.activities);
        conn.on(
            "activity:update",
            Arc::new(move |frame: Frame| {
                let activities = Arc::clone(&activities);
                Box::pin(async move {
                    let peer = frame.data.get("peer_id").and_then(|v| v.as_str());
                    let label = frame.data.get("activity").and_then(|v| v.as_str());
                    if let (Some(peer), Some(label)) = (peer, label) {
                        activities
                            .write()
                            .await
                            .insert(peer.to_owned(), label.to_owned());
                    }
                }) as BoxFuture<'static, ()>
            }),
        )
        .await;
    }

    /// Current label for one peer, if known.
    pub async fn activity_of(&self, peer_id: &str) -> Option<String> {
        self.activities.read().await.get(peer_id).cloned()
    }

    /// Current activity map.
    pub async fn snapshot(&self) -> HashMap<String, String> {
        self.activities.read().await.clone()
    }

    /// Empty the map. Teardown only.
    pub async fn clear(&self) {
        self.activities.write().await.clear();
    }
}

#[cfg(test)]
#[path = "activity_test.rs"]
mod tests;

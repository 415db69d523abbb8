//! Shared relay state.
//!
//! DESIGN
//! ======
//! `AppState` is injected into Axum handlers via the `State` extractor. It
//! holds the live peer connections, the server-side activity map, and the
//! in-memory message store for the current session. Nothing here survives a
//! restart: chat history lives only as long as the process.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::{RwLock, mpsc};
use uuid::Uuid;

use crate::frame::Frame;

// =============================================================================
// STORED MESSAGE
// =============================================================================

/// A delivered chat message as the relay stores it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredMessage {
    pub id: Uuid,
    pub sender_id: String,
    pub receiver_id: String,
    pub content: String,
    /// Milliseconds since Unix epoch, assigned by the relay on receipt.
    pub ts: i64,
}

// =============================================================================
// APP STATE
// =============================================================================

/// Shared relay state, injected into Axum handlers via the State extractor.
/// Clone is required by Axum — all inner fields are Arc-wrapped.
#[derive(Clone)]
pub struct AppState {
    /// Connected peers: peer id -> sender for outgoing frames.
    pub peers: Arc<RwLock<HashMap<String, mpsc::Sender<Frame>>>>,
    /// Last reported activity label per connected peer.
    pub activities: Arc<RwLock<HashMap<String, String>>>,
    /// All messages delivered during this session, in receipt order.
    pub messages: Arc<RwLock<Vec<StoredMessage>>>,
}

impl AppState {
    #[must_use]
    pub fn new() -> Self {
        Self {
            peers: Arc::new(RwLock::new(HashMap::new())),
            activities: Arc::new(RwLock::new(HashMap::new())),
            messages: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Peer identifiers currently connected.
    pub async fn roster(&self) -> Vec<String> {
        self.peers.read().await.keys().cloned().collect()
    }

    /// Current activity map as ordered pairs.
    pub async fn activity_pairs(&self) -> Vec<(String, String)> {
        self.activities
            .read()
            .await
            .iter()
            .map(|(id, label)| (id.clone(), label.clone()))
            .collect()
    }

    /// Send a frame to every connected peer except `exclude`.
    ///
    /// Peers with a full or closed channel are skipped; the close path
    /// removes them.
    pub async fn broadcast(&self, frame: &Frame, exclude: Option<&str>) {
        let peers = self.peers.read().await;
        for (peer_id, tx) in peers.iter() {
            if Some(peer_id.as_str()) == exclude {
                continue;
            }
            if tx.try_send(frame.clone()).is_err() {
                tracing::warn!(%peer_id, event = %frame.event, "broadcast: peer channel unavailable");
            }
        }
    }

    /// Send a frame to one peer, if connected. Returns whether it was queued.
    pub async fn forward(&self, peer_id: &str, frame: Frame) -> bool {
        let peers = self.peers.read().await;
        let Some(tx) = peers.get(peer_id) else {
            return false;
        };
        tx.try_send(frame).is_ok()
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// TEST HELPERS
// =============================================================================

//! Connection manager — owner of the single realtime channel.
//!
//! DESIGN
//! ======
//! `Connection` is a cheap-clone handle around the one websocket a client
//! process holds. It exposes exactly three capabilities to the rest of the
//! subsystem: subscribe to a named event (`on`), emit a fire-and-forget
//! frame (`emit`), and emit a frame awaiting its acknowledgment
//! (`request`). No other component ever touches the transport.
//!
//! LIFECYCLE
//! =========
//! `connect` dials, spawns a writer pump (queued frames → socket) and a
//! reader pump (socket → dispatch), announces this peer, and transitions to
//! Connected. `disconnect` tears both pumps down and drops every pending
//! acknowledgment, so late acks land against nothing. Connect failures and
//! transport errors set the observable error slot; there is no auto-retry —
//! retry policy belongs to the caller.

use std::collections::HashMap;
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::{SinkExt, StreamExt};
use tokio::sync::{Mutex, RwLock, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite;
use tracing::{info, warn};
use uuid::Uuid;

use crate::client::error::ClientError;
use crate::frame::{Data, Frame};

// =============================================================================
// TYPES
// =============================================================================

/// Async handler invoked for every inbound frame of a subscribed event.
pub type EventHandler = Arc<dyn Fn(Frame) -> BoxFuture<'static, ()> + Send + Sync>;

/// Observable channel state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Disconnected,
    Connecting,
    Connected,
}

/// Cheap-clone handle to the single realtime channel.
#[derive(Clone)]
pub struct Connection {
    inner: Arc<Inner>,
}

struct Inner {
    status: RwLock<ConnectionStatus>,
    peer_id: RwLock<Option<String>>,
    /// Queue feeding the writer pump. `None` while no channel is live.
    outbound: RwLock<Option<mpsc::UnboundedSender<Frame>>>,
    /// In-flight requests awaiting a terminal ack, keyed by request frame id.
    pending: Mutex<HashMap<Uuid, oneshot::Sender<Frame>>>,
    handlers: RwLock<HashMap<String, Vec<EventHandler>>>,
    last_error: RwLock<Option<ClientError>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

// =============================================================================
// LIFECYCLE
// =============================================================================

impl Connection {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                status: RwLock::new(ConnectionStatus::Disconnected),
                peer_id: RwLock::new(None),
                outbound: RwLock::new(None),
                pending: Mutex::new(HashMap::new()),
                handlers: RwLock::new(HashMap::new()),
                last_error: RwLock::new(None),
                tasks: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Open the channel as `peer_id` and announce this peer.
    ///
    /// No-op when a channel is already live. The status write lock is held
    /// across the dial, so rapid repeated calls serialize and the late ones
    /// observe Connected — exactly one announce per successful connect.
    ///
    /// # Errors
    ///
    /// `TransportError` when the dial fails; the error is also recorded in
    /// the error slot and the state returns to Disconnected.
    pub async fn connect(&self, ws_url: &str, peer_id: &str) -> Result<(), ClientError> {
        let mut status = self.inner.status.write().await;
        if *status != ConnectionStatus::Disconnected {
            return Ok(());
        }
        *status = ConnectionStatus::Connecting;

        let url = format!("{ws_url}?peer_id={peer_id}");
        let (ws, _) = match tokio_tungstenite::connect_async(url).await {
            Ok(pair) => pair,
            Err(e) => {
                *status = ConnectionStatus::Disconnected;
                let err = ClientError::TransportError(e.to_string());
                warn!(%peer_id, error = %err, "realtime: connect failed");
                *self.inner.last_error.write().await = Some(err.clone());
                return Err(err);
            }
        };

        let (mut ws_write, mut ws_read) = ws.split();
        let (tx, mut rx) = mpsc::unbounded_channel::<Frame>();

        // Writer pump: serialize queued frames onto the socket.
        let writer = tokio::spawn(async move {
            while let Some(frame) = rx.recv().await {
                let Ok(json) = serde_json::to_string(&frame) else {
                    continue;
                };
                if ws_write.send(tungstenite::Message::Text(json.into())).await.is_err() {
                    break;
                }
            }
            let _ = ws_write.close().await;
        });

        // Reader pump: dispatch inbound frames until the channel dies.
        let inner = Arc::clone(&self.inner);
        let reader = tokio::spawn(async move {
            while let Some(msg) = ws_read.next().await {
                match msg {
                    Ok(tungstenite::Message::Text(text)) => {
                        match serde_json::from_str::<Frame>(text.as_str()) {
                            Ok(frame) => dispatch(&inner, frame).await,
                            Err(e) => warn!(error = %e, "realtime: undecodable inbound frame"),
                        }
                    }
                    Ok(tungstenite::Message::Close(_)) => break,
                    Ok(_) => {}
                    Err(e) => {
                        let err = ClientError::TransportError(e.to_string());
                        warn!(error = %err, "realtime: transport failure");
                        *inner.last_error.write().await = Some(err);
                        break;
                    }
                }
            }
            // The channel is gone: reset state and fail in-flight requests.
            *inner.status.write().await = ConnectionStatus::Disconnected;
            *inner.outbound.write().await = None;
            inner.pending.lock().await.clear();
        });

        *self.inner.peer_id.write().await = Some(peer_id.to_owned());
        *self.inner.outbound.write().await = Some(tx.clone());
        self.inner.tasks.lock().await.extend([writer, reader]);

        let announce = Frame::request("presence:announce", Data::new())
            .with_from(peer_id)
            .with_data("peer_id", peer_id);
        if tx.send(announce).is_err() {
            *status = ConnectionStatus::Disconnected;
            let err = ClientError::TransportError("channel closed during connect".to_owned());
            *self.inner.last_error.write().await = Some(err.clone());
            return Err(err);
        }

        *status = ConnectionStatus::Connected;
        info!(%peer_id, "realtime: connected");
        Ok(())
    }

    /// Close the channel. No-op unless Connected.
    ///
    /// Emits no departure event — the relay informs other peers from its own
    /// close handling. Pending acknowledgments are dropped so a late ack
    /// mutates nothing.
    pub async fn disconnect(&self) {
        {
            let mut status = self.inner.status.write().await;
            if *status != ConnectionStatus::Connected {
                return;
            }
            *status = ConnectionStatus::Disconnected;
        }

        *self.inner.outbound.write().await = None;
        self.inner.pending.lock().await.clear();
        for task in self.inner.tasks.lock().await.drain(..) {
            task.abort();
        }

        info!("realtime: disconnected");
    }
}

impl Default for Connection {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// CAPABILITIES
// =============================================================================

impl Connection {
    /// Subscribe `handler` to every inbound frame named `event`.
    pub async fn on(&self, event: &str, handler: EventHandler) {
        self.inner
            .handlers
            .write()
            .await
            .entry(event.to_owned())
            .or_default()
            .push(handler);
    }

    /// Queue a fire-and-forget frame.
    ///
    /// # Errors
    ///
    /// `NotConnected` when no channel is live; `TransportError` when the
    /// writer pump has already shut down.
    pub async fn emit(&self, frame: Frame) -> Result<(), ClientError> {
        let outbound = self.inner.outbound.read().await;
        let Some(tx) = outbound.as_ref() else {
            return Err(ClientError::NotConnected);
        };
        tx.send(frame)
            .map_err(|_| ClientError::TransportError("outbound channel closed".to_owned()))
    }

    /// Queue a frame and suspend until its terminal acknowledgment arrives.
    ///
    /// There is no timeout here; callers needing bounded latency wrap this
    /// in their own.
    ///
    /// # Errors
    ///
    /// Emission errors as for [`Connection::emit`]. A channel torn down
    /// while the request is in flight resolves to `TransportError`.
    pub async fn request(&self, frame: Frame) -> Result<Frame, ClientError> {
        let id = frame.id;
        let (tx, rx) = oneshot::channel();
        self.inner.pending.lock().await.insert(id, tx);

        if let Err(e) = self.emit(frame).await {
            self.inner.pending.lock().await.remove(&id);
            return Err(e);
        }

        rx.await
            .map_err(|_| ClientError::TransportError("connection closed before acknowledgment".to_owned()))
    }
}

// =============================================================================
// OBSERVABILITY
// =============================================================================

impl Connection {
    pub async fn status(&self) -> ConnectionStatus {
        *self.inner.status.read().await
    }

    /// Credential attached at connect time, if any.
    pub async fn peer_id(&self) -> Option<String> {
        self.inner.peer_id.read().await.clone()
    }

    /// Last transport-level failure, left in place.
    pub async fn last_error(&self) -> Option<ClientError> {
        self.inner.last_error.read().await.clone()
    }

    /// Last transport-level failure, clearing the slot.
    pub async fn take_error(&self) -> Option<ClientError> {
        self.inner.last_error.write().await.take()
    }
}

// =============================================================================
// DISPATCH
// =============================================================================

async fn dispatch(inner: &Arc<Inner>, frame: Frame) {
    // Ack path: resolve the matching in-flight request. An ack with no
    // waiter is a late arrival against a torn-down exchange and is dropped.
    if let (Some(parent_id), true) = (frame.parent_id, frame.status.is_terminal()) {
        let waiter = inner.pending.lock().await.remove(&parent_id);
        if let Some(tx) = waiter {
            let _ = tx.send(frame);
        }
        return;
    }

    // Relay-reported channel failure lands in the error slot; the frame
    // still flows to any subscriber.
    if frame.event == "session:error" {
        let detail = frame
            .error_message()
            .unwrap_or("relay reported an error")
            .to_owned();
        warn!(%detail, "realtime: relay error frame");
        *inner.last_error.write().await = Some(ClientError::TransportError(detail));
    }

    let handlers: Vec<EventHandler> = {
        let registry = inner.handlers.read().await;
        registry.get(&frame.event).cloned().unwrap_or_default()
    };
    for handler in handlers {
        handler(frame.clone()).await;
    }
}

// =============================================================================
// TEST SUPPORT
// =============================================================================

#[cfg(test)]
impl Connection {
    /// Wire a Connected handle to a bare channel, no socket behind it.
    pub(crate) async fn test_connected(peer_id: &str) -> (Self, mpsc::UnboundedReceiver<Frame>) {
        let conn = Self::new();
        let (tx, rx) = mpsc::unbounded_channel();
        *conn.inner.status.write().await = ConnectionStatus::Connected;
        *conn.inner.peer_id.write().await = Some(peer_id.to_owned());
        *conn.inner.outbound.write().await = Some(tx);
        (conn, rx)
    }

    /// Feed one inbound frame through the dispatch path.
    pub(crate) async fn test_dispatch(&self, frame: Frame) {
        dispatch(&self.inner, frame).await;
    }
}

#[cfg(test)]
#[path = "connection_test.rs"]
mod tests;

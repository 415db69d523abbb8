//! Client-side failure taxonomy.
//!
//! All realtime failures are captured into an observable error slot on the
//! component that produced them rather than thrown across the event loop.
//! `NotConnected` and `DeliveryFailed` are recoverable; `TransportError` is
//! terminal for the current channel and requires an explicit reconnect.

/// Everything that can go wrong inside the realtime client.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClientError {
    /// Operation attempted while the channel is not open.
    #[error("not connected")]
    NotConnected,
    /// The relay rejected a send, with its reason.
    #[error("message delivery failed: {0}")]
    DeliveryFailed(String),
    /// Low-level channel failure. Non-recoverable without an explicit
    /// `connect` retry.
    #[error("transport error: {0}")]
    TransportError(String),
    /// Request/response history retrieval failed.
    #[error("history fetch failed: {0}")]
    HistoryFetchFailed(String),
}

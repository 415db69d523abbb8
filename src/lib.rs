//! Realtime presence, activity, and messaging for a shared music catalog.
//!
//! The crate has two halves that speak the same [`frame::Frame`] protocol:
//!
//! - `routes` + `state`: the relay server. Peers connect over a websocket,
//!   announce themselves, and the relay fans presence and activity changes
//!   out to everyone while routing direct messages point-to-point.
//! - `client`: the native client core. [`client::RealtimeClient`] owns a
//!   connection plus local projections of who is online, what they are
//!   listening to, and the direct-message log.

pub mod client;
pub mod frame;
pub mod routes;
pub mod state;

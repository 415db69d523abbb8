//! Playback engine and activity broadcaster.
//!
//! DESIGN
//! ======
//! The playback engine owns the queue and the play flag; the broadcaster is
//! its explicit bridge to the realtime channel. Every playback transition —
//! play, pause, advance, stop, and queue exhaustion — produces exactly one
//! outbound `activity:update`, even when the derived label is identical to
//! the previous one. Remote trackers apply last-event-wins, so a duplicate
//! must be re-sent rather than elided in case the earlier one was lost.
//!
//! A broadcast that cannot be queued (channel down) is logged and dropped;
//! the playback transition itself always proceeds.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::client::connection::Connection;
use crate::frame::{Data, Frame};

/// Label broadcast whenever nothing is playing.
pub const IDLE_LABEL: &str = "Idle";

// =============================================================================
// TRACK
// =============================================================================

/// The slice of catalog metadata the realtime layer needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Track {
    pub id: String,
    pub title: String,
    pub artist: String,
}

// =============================================================================
// BROADCASTER
// =============================================================================

/// Emit-only bridge from playback transitions to remote activity trackers.
#[derive(Clone)]
pub struct ActivityBroadcaster {
    conn: Connection,
    peer_id: String,
}

impl ActivityBroadcaster {
    #[must_use]
    pub fn new(conn: Connection, peer_id: impl Into<String>) -> Self {
        Self { conn, peer_id: peer_id.into() }
    }

    /// Broadcast the label for an active track.
    pub async fn playing(&self, track: &Track) {
        self.broadcast(&playing_label(track)).await;
    }

    /// Broadcast the idle label.
    pub async fn idle(&self) {
        self.broadcast(IDLE_LABEL).await;
    }

    async fn broadcast(&self, label: &str) {
        let frame = Frame::request("activity:update", Data::new())
            .with_from(self.peer_id.clone())
            .with_data("peer_id", self.peer_id.clone())
            .with_data("activity", label);
        if let Err(e) = self.conn.emit(frame).await {
            warn!(error = %e, "activity: broadcast dropped");
        }
    }
}

/// Derived label for an actively playing track.
#[must_use]
pub fn playing_label(track: &Track) -> String {
    format!("Playing {} by {}", track.title, track.artist)
}

// =============================================================================
// PLAYER
// =============================================================================

/// Playback state machine: Idle, or Playing the track at `current_index`.
pub struct Player {
    queue: Vec<Track>,
    current_index: Option<usize>,
    is_playing: bool,
    broadcaster: ActivityBroadcaster,
}

impl Player {
    #[must_use]
    pub fn new(broadcaster: ActivityBroadcaster) -> Self {
        Self { queue: Vec::new(), current_index: None, is_playing: false, broadcaster }
    }

    /// Seed the queue without starting playback. Not a transition: the
    /// activity signal stays untouched.
    pub fn initialize_queue(&mut self, tracks: Vec<Track>) {
        if tracks.is_empty() {
            return;
        }
        self.queue = tracks;
        self.current_index = Some(0);
        self.is_playing = false;
    }

    /// Replace the queue and start playing from `start_index`.
    pub async fn play_album(&mut self, tracks: Vec<Track>, start_index: usize) {
        if tracks.is_empty() || start_index >= tracks.len() {
            return;
        }
        self.queue = tracks;
        self.current_index = Some(start_index);
        self.is_playing = true;
        self.broadcaster.playing(&self.queue[start_index]).await;
    }

    /// Jump to a specific track and play it. Re-emits even if it is the
    /// track already playing.
    pub async fn set_current(&mut self, track: Track) {
        self.broadcaster.playing(&track).await;
        if let Some(pos) = self.queue.iter().position(|t| t.id == track.id) {
            self.current_index = Some(pos);
        }
        self.is_playing = true;
    }

    /// Flip between playing and paused. Pausing emits Idle; resuming with a
    /// current track re-emits its label, resuming with none emits Idle.
    pub async fn toggle_play(&mut self) {
        let will_play = !self.is_playing;
        match (will_play, self.current()) {
            (true, Some(track)) => {
                let track = track.clone();
                self.broadcaster.playing(&track).await;
            }
            _ => self.broadcaster.idle().await,
        }
        self.is_playing = will_play;
    }

    /// Advance to the next queued track; an exhausted queue is identical to
    /// an explicit stop.
    pub async fn play_next(&mut self) {
        let next = self.current_index.map(|i| i + 1);
        match next {
            Some(i) if i < self.queue.len() => {
                self.current_index = Some(i);
                self.is_playing = true;
                let track = self.queue[i].clone();
                self.broadcaster.playing(&track).await;
            }
            _ => self.stop().await,
        }
    }

    /// Step back to the previous queued track; running off the head is
    /// identical to an explicit stop.
    pub async fn play_previous(&mut self) {
        match self.current_index {
            Some(i) if i > 0 => {
                self.current_index = Some(i - 1);
                self.is_playing = true;
                let track = self.queue[i - 1].clone();
                self.broadcaster.playing(&track).await;
            }
            _ => self.stop().await,
        }
    }

    /// Stop playback and report Idle. Always emits, even when already idle.
    pub async fn stop(&mut self) {
        self.is_playing = false;
        self.current_index = None;
        self.broadcaster.idle().await;
    }

    #[must_use]
    pub fn current(&self) -> Option<&Track> {
        self.current_index.and_then(|i| self.queue.get(i))
    }

    #[must_use]
    pub fn is_playing(&self) -> bool {
        self.is_playing
    }
}

#[cfg(test)]
#[path = "player_test.rs"]
mod tests;

//! Queue operations: play, skip, shuffle, listing

use super::core::{EngineCore, PendingKind};
use crate::error::{Error, Result};
use chrono::Utc;
use serde::Serialize;
use tracing::{debug, info, warn};
use tunebot_common::events::PlaybackStatus;
use tunebot_common::{BotEvent, Track};

/// Result of queueing a track
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PlayOutcome {
    /// 0-based index in the queue
    pub position: usize,
    /// Tracks that will play before this one (0 when it starts now)
    pub ahead: usize,
    /// Playback of this track started immediately
    pub started: bool,
}

/// Result of a skip request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SkipOutcome {
    /// Engine was idle; nothing changed
    NothingPlaying,
    /// Current track was abandoned
    Skipped {
        /// Another queued track follows
        has_next: bool,
    },
}

impl EngineCore {
    /// Queue `track`; start it now unless something is playing or loading
    ///
    /// A paused track is released and replaced by the new one.
    pub(super) fn play(&mut self, track: Track) -> Result<PlayOutcome> {
        if self.session.is_none() {
            return Err(Error::NotConnected);
        }

        // Transitioning means a load or stop is already in flight; just queue
        let start_now = matches!(
            self.status(),
            PlaybackStatus::Idle | PlaybackStatus::Paused
        );
        self.queue.add(track.clone());
        let position = self.queue.len() - 1;
        let ahead = position.saturating_sub(self.queue.cursor());

        info!("Queued {} at position {}", track, position);
        self.events.emit_lossy(BotEvent::TrackQueued {
            track: track.clone(),
            position,
            timestamp: Utc::now(),
        });

        if start_now {
            if let Some(paused) = self.loaded.take() {
                // Its idle event is now stale
                debug!("Releasing paused {} for {}", paused.id(), track.id());
                self.sink.stop();
            }
            self.queue.jump_to(position);
            self.begin_load(track);
        }

        Ok(PlayOutcome {
            position,
            ahead: if start_now { 0 } else { ahead },
            started: start_now,
        })
    }

    pub(super) fn skip(&mut self) -> SkipOutcome {
        if self.status() == PlaybackStatus::Idle {
            warn!("Skip requested but nothing is playing");
            return SkipOutcome::NothingPlaying;
        }

        let loading = match self.pending.as_ref().map(|p| &p.kind) {
            Some(PendingKind::Load(track_id)) => Some(track_id.clone()),
            Some(PendingKind::Recommendations(seed_id)) => {
                debug!("Skip ignored while fetching recommendations for {}", seed_id);
                return SkipOutcome::NothingPlaying;
            }
            None => None,
        };

        let has_next = self.queue.has_next();
        if let Some(track_id) = loading {
            // The download keeps running and lands in the cache
            info!("Skipping {} while it is still loading", track_id);
            self.pending = None;
            self.queue.advance();
            self.start_next();
        } else {
            if !self.sink.stop() {
                // A stop is already in flight; its idle event advances once
                debug!("Skip while previous stop is still settling");
            }
            info!("Skipped current track");
        }

        SkipOutcome::Skipped { has_next }
    }

    pub(super) fn shuffle(&mut self) -> usize {
        let count = self.queue.shuffle(&mut rand::thread_rng());
        info!("Shuffled {} upcoming tracks", count);
        count
    }

    pub(super) fn queue_listing(&self) -> Option<String> {
        if self.queue.is_empty() {
            None
        } else {
            Some(self.queue.to_string())
        }
    }
}

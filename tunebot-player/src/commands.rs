//! Chat command layer
//!
//! Turns user commands into engine/provider calls and renders every outcome
//! as a short chat message. Failures become a [`CommandError`] carrying a
//! user-facing message alongside the underlying [`Error`].

use crate::audio::VoiceSession;
use crate::error::Error;
use crate::playback::{PlaybackEngine, SkipOutcome};
use crate::provider::MusicProvider;
use std::sync::Arc;
use thiserror::Error as ThisError;
use tracing::{debug, info};
use tunebot_common::events::PlayMode;
use tunebot_common::human_time::format_clock;
use tunebot_common::{Track, TrackInfo};

/// Command failure with the message shown to the user
#[derive(Debug, ThisError)]
#[error("{message}")]
pub struct CommandError {
    message: String,
    #[source]
    source: Error,
}

impl CommandError {
    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn error(&self) -> &Error {
        &self.source
    }
}

impl From<Error> for CommandError {
    fn from(source: Error) -> Self {
        let message = match &source {
            Error::NotConnected => "❌ You must invite me to a voice channel first.".to_string(),
            Error::NotInitialized(_) => {
                "⏳ The music provider is still starting up, try again shortly.".to_string()
            }
            Error::InvalidParameter(msg) => format!("❌ {}", msg),
            Error::ResourceUnavailable { .. } => "😔 That song could not be loaded.".to_string(),
            Error::RecommendationFailure(_) => "😔 Could not find anything similar.".to_string(),
            Error::Provider(_) => "😔 The music provider is unavailable right now.".to_string(),
            Error::EngineStopped => "❌ Playback is shutting down.".to_string(),
            _ => "❌ Something went wrong.".to_string(),
        };
        Self { message, source }
    }
}

pub type CommandResult = std::result::Result<String, CommandError>;

/// Command handlers bound to one engine
#[derive(Clone)]
pub struct Commands {
    engine: PlaybackEngine,
    provider: Arc<dyn MusicProvider>,
    search_limit: usize,
}

impl Commands {
    pub fn new(engine: PlaybackEngine, provider: Arc<dyn MusicProvider>, search_limit: usize) -> Self {
        Self {
            engine,
            provider,
            search_limit,
        }
    }

    pub fn engine(&self) -> &PlaybackEngine {
        &self.engine
    }

    /// Join a voice channel
    pub async fn join(&self, session: Arc<dyn VoiceSession>) -> CommandResult {
        let channel = session.id().to_string();
        if self.engine.bind_session(session).await? {
            Ok(format!("✅ Joined **{}**.", channel))
        } else {
            Ok(format!("✅ I'm already in **{}**.", channel))
        }
    }

    /// Leave the voice channel, clearing the queue
    pub async fn leave(&self) -> CommandResult {
        let snapshot = self.engine.snapshot().await?;
        if self.engine.disconnect().await? {
            let channel = snapshot.session_id.unwrap_or_default();
            Ok(format!("👋 Left **{}**.", channel))
        } else {
            Ok("ℹ️ I'm not in a voice channel.".to_string())
        }
    }

    /// Search and queue the best match
    pub async fn play(&self, query: &str, requester: &str) -> CommandResult {
        let results = self.provider.search_tracks(query, 1).await.map_err(Error::from)?;
        let Some(info) = results.into_iter().next() else {
            debug!("No results for {:?}", query);
            return Ok("😔 No results!".to_string());
        };
        self.play_track(info, requester).await
    }

    /// Queue a specific search result
    pub async fn play_track(&self, info: TrackInfo, requester: &str) -> CommandResult {
        let track = Track::new(info, requester).map_err(Error::from)?;
        let outcome = self.engine.play(track.clone()).await?;
        info!("{} queued {}", requester, track.id());

        if outcome.started {
            Ok(format!("▶️ Now playing: {}", track))
        } else {
            Ok(format!(
                "➕ Added to the queue ({} ahead): {}",
                outcome.ahead, track
            ))
        }
    }

    /// Raw search results, at most `search_limit`
    pub async fn search_results(
        &self,
        query: &str,
    ) -> std::result::Result<Vec<TrackInfo>, CommandError> {
        Ok(self
            .provider
            .search_tracks(query, self.search_limit)
            .await
            .map_err(Error::from)?)
    }

    /// Numbered list of search results
    pub async fn search(&self, query: &str) -> CommandResult {
        let results = self.search_results(query).await?;
        Ok(render_search(query, &results))
    }

    pub async fn skip(&self) -> CommandResult {
        Ok(match self.engine.skip().await? {
            SkipOutcome::NothingPlaying => "ℹ️ Nothing is playing right now.".to_string(),
            SkipOutcome::Skipped { has_next: true } => "⏭️ Skipped to the next song!".to_string(),
            SkipOutcome::Skipped { has_next: false } => {
                "⏭️ Skipped! That was the last song in the queue.".to_string()
            }
        })
    }

    pub async fn pause(&self) -> CommandResult {
        if self.engine.pause().await? {
            Ok("⏸️ Paused.".to_string())
        } else {
            Ok("ℹ️ Nothing is playing right now.".to_string())
        }
    }

    pub async fn resume(&self) -> CommandResult {
        if self.engine.resume().await? {
            Ok("▶️ Resumed.".to_string())
        } else {
            Ok("ℹ️ Playback is not paused.".to_string())
        }
    }

    /// Set volume from a 0-100 percentage
    pub async fn volume(&self, percent: i64) -> CommandResult {
        if !(0..=100).contains(&percent) {
            return Err(Error::InvalidParameter(format!(
                "Volume must be between 0 and 100, got {}.",
                percent
            ))
            .into());
        }
        self.engine.set_volume(percent as f32 / 100.0).await?;
        Ok(format!("🔊 Volume set to **{}%**.", percent))
    }

    pub async fn playmode(&self, mode: &str) -> CommandResult {
        let mode: PlayMode = mode.parse().map_err(Error::InvalidParameter)?;
        self.engine.set_mode(mode).await?;
        Ok(format!("✅ Playback mode set to **{}**.", mode))
    }

    pub async fn shuffle(&self) -> CommandResult {
        match self.engine.shuffle().await? {
            0 => Ok("ℹ️ There is nothing upcoming to shuffle.".to_string()),
            n => Ok(format!("🔀 Shuffled {} upcoming tracks.", n)),
        }
    }

    pub async fn queue(&self) -> CommandResult {
        Ok(match self.engine.queue_listing().await? {
            Some(listing) => format!("🎶 **Queue**\n{}", listing),
            None => "📭 The queue is currently empty.".to_string(),
        })
    }
}

/// Chat rendering of search results
pub fn render_search(query: &str, results: &[TrackInfo]) -> String {
    if results.is_empty() {
        return "😔 No results!".to_string();
    }
    let lines: Vec<String> = results
        .iter()
        .enumerate()
        .map(|(i, t)| {
            format!(
                "`{}.` **{}** - {} `{}`",
                i + 1,
                t.artist,
                t.title,
                format_clock(t.duration_secs)
            )
        })
        .collect();
    format!("🔎 Results for **{}**:\n{}", query.trim(), lines.join("\n"))
}

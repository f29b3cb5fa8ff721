//! Playback engine
//!
//! [`PlaybackEngine`] is a cloneable handle to an actor task that owns the
//! queue, the audio sink, and the bound voice session. Every operation is a
//! message answered over a oneshot channel; sink lifecycle events and the
//! results of background downloads arrive on their own channels and are
//! handled by the same loop, so engine state has a single writer.
//!
//! **Module Structure:**
//! - `core.rs`: actor state, message loop, track transitions
//! - `queue.rs`: queue-facing operations (play, skip, shuffle, listing)
//! - `diagnostics.rs`: status snapshot

mod core;
mod diagnostics;
mod queue;

pub use diagnostics::EngineSnapshot;
pub use queue::{PlayOutcome, SkipOutcome};

use self::core::EngineCore;
use crate::audio::{AudioSink, SinkEventReceiver, VoiceSession};
use crate::error::{Error, Result};
use crate::playback::cache::StreamCache;
use crate::provider::MusicProvider;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, oneshot};
use tunebot_common::config::PlaybackConfig;
use tunebot_common::events::PlayMode;
use tunebot_common::{BotEvent, EventBus, Track};

/// Pending requests before callers wait for the actor
const COMMAND_CAPACITY: usize = 64;

/// Requester recorded on tracks queued by autoplay
pub const AUTOPLAY_REQUESTER: &str = "autoplay";

/// Engine tuning taken from `[playback]`
#[derive(Debug, Clone, PartialEq)]
pub struct EngineSettings {
    pub default_volume: f32,
    pub autoplay_limit: usize,
    pub leave_on_queue_end: bool,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self::from(&PlaybackConfig::default())
    }
}

impl From<&PlaybackConfig> for EngineSettings {
    fn from(config: &PlaybackConfig) -> Self {
        Self {
            default_volume: config.default_volume,
            autoplay_limit: config.autoplay_limit,
            leave_on_queue_end: config.leave_on_queue_end,
        }
    }
}

pub(crate) enum EngineCommand {
    BindSession {
        session: Arc<dyn VoiceSession>,
        reply: oneshot::Sender<bool>,
    },
    Disconnect {
        reply: oneshot::Sender<bool>,
    },
    Play {
        track: Track,
        reply: oneshot::Sender<Result<PlayOutcome>>,
    },
    Skip {
        reply: oneshot::Sender<SkipOutcome>,
    },
    Pause {
        reply: oneshot::Sender<bool>,
    },
    Resume {
        reply: oneshot::Sender<bool>,
    },
    SetVolume {
        level: f32,
        reply: oneshot::Sender<Result<()>>,
    },
    SetMode {
        mode: PlayMode,
        reply: oneshot::Sender<()>,
    },
    Shuffle {
        reply: oneshot::Sender<usize>,
    },
    Snapshot {
        reply: oneshot::Sender<EngineSnapshot>,
    },
    QueueListing {
        reply: oneshot::Sender<Option<String>>,
    },
    Shutdown {
        reply: oneshot::Sender<()>,
    },
}

/// Handle to a running engine actor
#[derive(Clone)]
pub struct PlaybackEngine {
    commands: mpsc::Sender<EngineCommand>,
    events: EventBus,
}

impl PlaybackEngine {
    /// Start the engine actor on the current tokio runtime
    ///
    /// `sink_events` must be the receiving half of the channel `sink` emits on.
    pub fn spawn(
        settings: EngineSettings,
        cache: Arc<StreamCache>,
        provider: Arc<dyn MusicProvider>,
        sink: Box<dyn AudioSink>,
        sink_events: SinkEventReceiver,
        events: EventBus,
    ) -> Self {
        let (command_tx, command_rx) = mpsc::channel(COMMAND_CAPACITY);
        let (internal_tx, internal_rx) = mpsc::unbounded_channel();

        let core = EngineCore::new(settings, cache, provider, sink, events.clone(), internal_tx);
        tokio::spawn(core.run(command_rx, sink_events, internal_rx));

        Self {
            commands: command_tx,
            events,
        }
    }

    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> EngineCommand,
    ) -> Result<T> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(make(reply))
            .await
            .map_err(|_| Error::EngineStopped)?;
        response.await.map_err(|_| Error::EngineStopped)
    }

    /// Attach to a voice session
    ///
    /// Returns `false` if already bound to a session with the same id. A
    /// different bound session is fully disconnected first.
    pub async fn bind_session(&self, session: Arc<dyn VoiceSession>) -> Result<bool> {
        self.request(|reply| EngineCommand::BindSession { session, reply })
            .await
    }

    /// Stop playback, clear the queue, destroy and unbind the session
    ///
    /// Returns `false` if no session was bound.
    pub async fn disconnect(&self) -> Result<bool> {
        self.request(|reply| EngineCommand::Disconnect { reply }).await
    }

    /// Append a track; starts it immediately when the engine is idle or paused
    pub async fn play(&self, track: Track) -> Result<PlayOutcome> {
        self.request(|reply| EngineCommand::Play { track, reply })
            .await?
    }

    pub async fn skip(&self) -> Result<SkipOutcome> {
        self.request(|reply| EngineCommand::Skip { reply }).await
    }

    pub async fn pause(&self) -> Result<bool> {
        self.request(|reply| EngineCommand::Pause { reply }).await
    }

    pub async fn resume(&self) -> Result<bool> {
        self.request(|reply| EngineCommand::Resume { reply }).await
    }

    /// Set volume (0.0-1.0), applied live to the playing resource
    pub async fn set_volume(&self, level: f32) -> Result<()> {
        self.request(|reply| EngineCommand::SetVolume { level, reply })
            .await?
    }

    /// Takes effect the next time the queue runs out
    pub async fn set_mode(&self, mode: PlayMode) -> Result<()> {
        self.request(|reply| EngineCommand::SetMode { mode, reply })
            .await
    }

    /// Shuffle upcoming tracks; returns how many were eligible
    pub async fn shuffle(&self) -> Result<usize> {
        self.request(|reply| EngineCommand::Shuffle { reply }).await
    }

    pub async fn snapshot(&self) -> Result<EngineSnapshot> {
        self.request(|reply| EngineCommand::Snapshot { reply }).await
    }

    /// Rendered queue, `None` when nothing is left to play
    pub async fn queue_listing(&self) -> Result<Option<String>> {
        self.request(|reply| EngineCommand::QueueListing { reply })
            .await
    }

    /// Disconnect and stop the actor; later calls fail with `EngineStopped`
    pub async fn shutdown(&self) -> Result<()> {
        self.request(|reply| EngineCommand::Shutdown { reply }).await
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<BotEvent> {
        self.events.subscribe()
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }
}

//! Engine actor: state, message loop, and track transitions

use super::{EngineCommand, EngineSettings, AUTOPLAY_REQUESTER};
use crate::audio::{AudioResource, AudioSink, ResourceId, SinkEvent, SinkEventReceiver, SinkStatus, VoiceSession};
use crate::error::{Error, Result};
use crate::playback::cache::StreamCache;
use crate::playback::queue::Queue;
use crate::provider::MusicProvider;
use chrono::Utc;
use std::ops::ControlFlow;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use tunebot_common::events::{PlayMode, PlaybackStatus};
use tunebot_common::{BotEvent, EventBus, Track, TrackInfo};

/// Background work the engine is waiting on
pub(super) struct Pending {
    pub(super) generation: u64,
    pub(super) kind: PendingKind,
}

pub(super) enum PendingKind {
    /// Resolving audio for the track under the cursor
    Load(String),
    /// Fetching autoplay recommendations for this seed
    Recommendations(String),
}

/// Results reported back by spawned tasks
pub(super) enum Internal {
    Loaded {
        generation: u64,
        track: Track,
        result: Result<PathBuf>,
    },
    Recommended {
        generation: u64,
        seed_id: String,
        result: Result<Vec<TrackInfo>>,
    },
}

pub(super) struct EngineCore {
    pub(super) queue: Queue,
    pub(super) sink: Box<dyn AudioSink>,
    pub(super) session: Option<Arc<dyn VoiceSession>>,
    pub(super) loaded: Option<AudioResource>,
    pub(super) pending: Option<Pending>,
    pub(super) volume: f32,
    pub(super) mode: PlayMode,
    pub(super) events: EventBus,
    pub(super) cache: Arc<StreamCache>,
    settings: EngineSettings,
    provider: Arc<dyn MusicProvider>,
    internal_tx: mpsc::UnboundedSender<Internal>,
    generation: u64,
    next_resource: u64,
    /// Set when autoplay appends a batch, cleared once anything plays
    autoplay_unproven: bool,
    last_status: PlaybackStatus,
}

impl EngineCore {
    pub(super) fn new(
        settings: EngineSettings,
        cache: Arc<StreamCache>,
        provider: Arc<dyn MusicProvider>,
        sink: Box<dyn AudioSink>,
        events: EventBus,
        internal_tx: mpsc::UnboundedSender<Internal>,
    ) -> Self {
        Self {
            queue: Queue::new(),
            sink,
            session: None,
            loaded: None,
            pending: None,
            volume: settings.default_volume,
            mode: PlayMode::Normal,
            events,
            cache,
            settings,
            provider,
            internal_tx,
            generation: 0,
            next_resource: 0,
            autoplay_unproven: false,
            last_status: PlaybackStatus::Idle,
        }
    }

    pub(super) async fn run(
        mut self,
        mut commands: mpsc::Receiver<EngineCommand>,
        mut sink_events: SinkEventReceiver,
        mut internal: mpsc::UnboundedReceiver<Internal>,
    ) {
        info!("Playback engine started (volume {:.2})", self.volume);

        loop {
            tokio::select! {
                command = commands.recv() => {
                    let Some(command) = command else {
                        debug!("All engine handles dropped");
                        self.shutdown();
                        break;
                    };
                    if self.handle_command(command).is_break() {
                        break;
                    }
                }
                Some(event) = sink_events.recv() => self.handle_sink_event(event),
                Some(message) = internal.recv() => self.handle_internal(message),
            }
            self.publish_status();
        }

        info!("Playback engine stopped");
    }

    fn handle_command(&mut self, command: EngineCommand) -> ControlFlow<()> {
        // Replies are best-effort: the caller may have given up waiting
        match command {
            EngineCommand::BindSession { session, reply } => {
                let _ = reply.send(self.bind_session(session));
            }
            EngineCommand::Disconnect { reply } => {
                let _ = reply.send(self.disconnect());
            }
            EngineCommand::Play { track, reply } => {
                let _ = reply.send(self.play(track));
            }
            EngineCommand::Skip { reply } => {
                let _ = reply.send(self.skip());
            }
            EngineCommand::Pause { reply } => {
                let _ = reply.send(self.pause());
            }
            EngineCommand::Resume { reply } => {
                let _ = reply.send(self.resume());
            }
            EngineCommand::SetVolume { level, reply } => {
                let _ = reply.send(self.set_volume(level));
            }
            EngineCommand::SetMode { mode, reply } => {
                self.set_mode(mode);
                let _ = reply.send(());
            }
            EngineCommand::Shuffle { reply } => {
                let _ = reply.send(self.shuffle());
            }
            EngineCommand::Snapshot { reply } => {
                let _ = reply.send(self.snapshot());
            }
            EngineCommand::QueueListing { reply } => {
                let _ = reply.send(self.queue_listing());
            }
            EngineCommand::Shutdown { reply } => {
                self.shutdown();
                let _ = reply.send(());
                return ControlFlow::Break(());
            }
        }
        ControlFlow::Continue(())
    }

    /// Engine-level status derived from sink state and pending work
    pub(super) fn status(&self) -> PlaybackStatus {
        if self.pending.is_some() {
            return PlaybackStatus::Transitioning;
        }
        match (&self.loaded, self.sink.status()) {
            (None, _) => PlaybackStatus::Idle,
            (Some(_), SinkStatus::Playing) => PlaybackStatus::Playing,
            (Some(_), SinkStatus::Paused) => PlaybackStatus::Paused,
            // Stopped, idle event not yet processed
            (Some(_), SinkStatus::Idle) => PlaybackStatus::Transitioning,
        }
    }

    fn publish_status(&mut self) {
        let status = self.status();
        if status != self.last_status {
            debug!("Engine status {} -> {}", self.last_status, status);
            self.events.emit_lossy(BotEvent::PlaybackStateChanged {
                old_state: self.last_status,
                new_state: status,
                timestamp: Utc::now(),
            });
            self.last_status = status;
        }
    }

    fn is_loaded(&self, resource: ResourceId) -> bool {
        self.loaded.as_ref().map(AudioResource::id) == Some(resource)
    }

    fn next_generation(&mut self) -> u64 {
        self.generation += 1;
        self.generation
    }

    /// Clear `pending` if it belongs to `generation`
    fn take_pending(&mut self, generation: u64) -> bool {
        if self.pending.as_ref().is_some_and(|p| p.generation == generation) {
            self.pending = None;
            true
        } else {
            false
        }
    }

    // ------------------------------------------------------------------
    // Session lifecycle
    // ------------------------------------------------------------------

    pub(super) fn bind_session(&mut self, session: Arc<dyn VoiceSession>) -> bool {
        if let Some(current) = &self.session {
            if current.id() == session.id() {
                debug!("Already bound to voice session {}", session.id());
                return false;
            }
            info!("Moving from voice session {} to {}", current.id(), session.id());
            self.disconnect();
        }

        self.sink.subscribe(Arc::clone(&session));
        info!("Bound to voice session {}", session.id());
        self.events.emit_lossy(BotEvent::SessionBound {
            session_id: session.id().to_string(),
            timestamp: Utc::now(),
        });
        self.session = Some(session);
        true
    }

    pub(super) fn disconnect(&mut self) -> bool {
        let Some(session) = self.session.take() else {
            warn!("No active voice connection to disconnect");
            return false;
        };

        if let Some(pending) = self.pending.take() {
            debug!("Discarding pending work (generation {})", pending.generation);
        }
        // Released before stopping so the resulting idle event is stale
        if let Some(resource) = self.loaded.take() {
            debug!("Releasing {}", resource.id());
        }
        self.sink.stop();
        self.queue.clear();
        self.autoplay_unproven = false;
        self.sink.unsubscribe();
        session.destroy();

        info!("Disconnected from voice session {}", session.id());
        self.events.emit_lossy(BotEvent::Disconnected {
            session_id: session.id().to_string(),
            timestamp: Utc::now(),
        });
        true
    }

    fn shutdown(&mut self) {
        if self.session.is_some() {
            self.disconnect();
        } else {
            self.pending = None;
            self.loaded = None;
            self.sink.stop();
        }
    }

    // ------------------------------------------------------------------
    // Controls
    // ------------------------------------------------------------------

    pub(super) fn pause(&mut self) -> bool {
        if self.loaded.is_some() && self.sink.pause() {
            info!("Playback paused");
            true
        } else {
            false
        }
    }

    pub(super) fn resume(&mut self) -> bool {
        if self.loaded.is_some() && self.sink.unpause() {
            info!("Playback resumed");
            true
        } else {
            false
        }
    }

    pub(super) fn set_volume(&mut self, level: f32) -> Result<()> {
        if !level.is_finite() || !(0.0..=1.0).contains(&level) {
            warn!("Rejected volume {} (keeping {:.2})", level, self.volume);
            return Err(Error::InvalidParameter(format!(
                "volume must be within 0.0-1.0, got {}",
                level
            )));
        }

        self.volume = level;
        if let Some(resource) = &self.loaded {
            resource.gain().set(level);
        }
        info!("Volume set to {:.0}%", level * 100.0);
        self.events.emit_lossy(BotEvent::VolumeChanged {
            volume: level,
            timestamp: Utc::now(),
        });
        Ok(())
    }

    pub(super) fn set_mode(&mut self, mode: PlayMode) {
        if self.mode != mode {
            info!("Play mode set to {}", mode);
        }
        self.mode = mode;
        self.events.emit_lossy(BotEvent::ModeChanged {
            mode,
            timestamp: Utc::now(),
        });
    }

    // ------------------------------------------------------------------
    // Transitions
    // ------------------------------------------------------------------

    fn handle_sink_event(&mut self, event: SinkEvent) {
        match event {
            SinkEvent::Idle { resource } => {
                if self.is_loaded(resource) {
                    self.on_resource_finished();
                } else {
                    debug!("Ignoring idle for stale {}", resource);
                }
            }
            SinkEvent::Error { resource, message } => {
                if !self.is_loaded(resource) {
                    debug!("Ignoring error for stale {}: {}", resource, message);
                    return;
                }
                error!("Playback error on {}: {}", resource, message);
                if let Some(track) = self.loaded.as_ref().map(|r| r.track().clone()) {
                    self.emit_track_failed(&track, &message);
                }
                // Treated as a skip; the stop produces the idle event
                if !self.sink.stop() {
                    self.on_resource_finished();
                }
            }
            SinkEvent::StateChanged { resource, old, new } => {
                debug!(
                    "Sink {} -> {} ({})",
                    old,
                    new,
                    resource.map(|r| r.to_string()).unwrap_or_default()
                );
            }
        }
    }

    fn handle_internal(&mut self, message: Internal) {
        match message {
            Internal::Loaded {
                generation,
                track,
                result,
            } => {
                if !self.take_pending(generation) {
                    debug!("Discarding stale resolution of {}", track.id());
                    return;
                }
                match result {
                    Ok(path) => self.start_resource(track, path),
                    Err(e) => self.track_failed(&track, &e.to_string()),
                }
            }
            Internal::Recommended {
                generation,
                seed_id,
                result,
            } => {
                if !self.take_pending(generation) {
                    debug!("Discarding stale recommendations for {}", seed_id);
                    return;
                }
                self.on_recommendations(&seed_id, result);
            }
        }
    }

    fn on_resource_finished(&mut self) {
        if let Some(resource) = self.loaded.take() {
            debug!("{} finished", resource.id());
        }
        self.queue.advance();
        self.start_next();
    }

    /// Load the track under the cursor, refill via autoplay, or go idle
    pub(super) fn start_next(&mut self) {
        if let Some(track) = self.queue.current().cloned() {
            self.begin_load(track);
            return;
        }

        if self.mode == PlayMode::Autoplay {
            if self.autoplay_unproven {
                warn!("No track from the last autoplay batch could be played");
            } else if let Some(seed) = self.queue.last().map(|t| t.id().to_string()) {
                self.begin_recommendations(seed);
                return;
            } else {
                debug!("Autoplay has no seed track");
            }
        }

        self.queue_exhausted();
    }

    fn queue_exhausted(&mut self) {
        info!("Queue finished");
        self.events.emit_lossy(BotEvent::QueueExhausted {
            timestamp: Utc::now(),
        });
        if self.settings.leave_on_queue_end {
            self.disconnect();
        }
    }

    pub(super) fn begin_load(&mut self, track: Track) {
        let generation = self.next_generation();
        debug!("Resolving {} (generation {})", track.id(), generation);
        self.pending = Some(Pending {
            generation,
            kind: PendingKind::Load(track.id().to_string()),
        });

        let cache = Arc::clone(&self.cache);
        let tx = self.internal_tx.clone();
        tokio::spawn(async move {
            let result = cache.resolve(track.id()).await;
            let _ = tx.send(Internal::Loaded {
                generation,
                track,
                result,
            });
        });
    }

    fn begin_recommendations(&mut self, seed_id: String) {
        let generation = self.next_generation();
        info!("Fetching autoplay recommendations for {}", seed_id);
        self.pending = Some(Pending {
            generation,
            kind: PendingKind::Recommendations(seed_id.clone()),
        });

        let provider = Arc::clone(&self.provider);
        let limit = self.settings.autoplay_limit;
        let tx = self.internal_tx.clone();
        tokio::spawn(async move {
            let result = provider
                .get_recommendations(&seed_id, limit)
                .await
                .map_err(|e| Error::RecommendationFailure(e.to_string()));
            let _ = tx.send(Internal::Recommended {
                generation,
                seed_id,
                result,
            });
        });
    }

    fn on_recommendations(&mut self, seed_id: &str, result: Result<Vec<TrackInfo>>) {
        let infos = match result {
            Ok(infos) => infos,
            Err(e) => {
                error!("{}", e);
                self.queue_exhausted();
                return;
            }
        };

        let tracks: Vec<Track> = infos
            .into_iter()
            .filter(|info| info.id != seed_id)
            .take(self.settings.autoplay_limit)
            .filter_map(|info| match Track::new(info, AUTOPLAY_REQUESTER) {
                Ok(track) => Some(track),
                Err(e) => {
                    warn!("Skipping recommendation: {}", e);
                    None
                }
            })
            .collect();

        if tracks.is_empty() {
            warn!("No recommendations for {}", seed_id);
            self.queue_exhausted();
            return;
        }

        let count = self.queue.add_many(tracks);
        self.autoplay_unproven = true;
        info!("Autoplay queued {} tracks seeded by {}", count, seed_id);
        self.events.emit_lossy(BotEvent::AutoplayQueued {
            seed_id: seed_id.to_string(),
            count,
            timestamp: Utc::now(),
        });
        self.start_next();
    }

    fn start_resource(&mut self, track: Track, path: PathBuf) {
        if self.session.is_none() {
            warn!("Resolved {} with no voice session bound; dropping", track.id());
            return;
        }
        if let Some(previous) = self.loaded.take() {
            debug!("Releasing {}", previous.id());
            self.sink.stop();
        }

        self.next_resource += 1;
        let resource = AudioResource::new(
            ResourceId::new(self.next_resource),
            track.clone(),
            path,
            self.volume,
        );

        match self.sink.play(resource.clone()) {
            Ok(()) => {
                self.loaded = Some(resource);
                self.autoplay_unproven = false;
                info!("Now playing: {}", track);
                self.events.emit_lossy(BotEvent::NowPlaying {
                    track,
                    timestamp: Utc::now(),
                });
            }
            Err(e) => self.track_failed(&track, &e.to_string()),
        }
    }

    fn emit_track_failed(&self, track: &Track, reason: &str) {
        self.events.emit_lossy(BotEvent::TrackFailed {
            track_id: track.id().to_string(),
            title: track.title().to_string(),
            reason: reason.to_string(),
            timestamp: Utc::now(),
        });
    }

    /// Skip a track that could not be started and move on
    fn track_failed(&mut self, track: &Track, reason: &str) {
        error!("Failed to play \"{}\" ({}): {}", track.title(), track.id(), reason);
        self.emit_track_failed(track, reason);
        self.queue.advance();
        self.start_next();
    }
}

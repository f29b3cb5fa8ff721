//! Shared fakes for integration tests
//!
//! - `FakeProvider`: in-memory catalog, counts audio fetches, can fail or hold
//!   individual downloads
//! - `ManualSink`: sink driven by the test through a `SinkProbe`
//! - `Harness`: engine wired to both, with a temp cache directory

#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::{broadcast, Semaphore};
use tunebot_common::config::CacheConfig;
use tunebot_common::events::PlaybackStatus;
use tunebot_common::{BotEvent, EventBus, Track, TrackInfo};
use tunebot_player::audio::{
    sink_channel, AudioResource, AudioSink, ResourceId, SinkError, SinkEvent, SinkEventSender,
    SinkStatus, VoiceSession,
};
use tunebot_player::playback::{EngineSettings, PlaybackEngine, StreamCache};
use tunebot_player::provider::{AudioStream, MusicProvider, ProviderError};

pub fn info(id: &str, secs: u64) -> TrackInfo {
    TrackInfo {
        id: id.to_string(),
        title: format!("Song {}", id),
        artist: format!("Artist {}", id),
        duration_secs: secs,
        thumbnail: format!("https://img.example/{}.jpg", id),
    }
}

pub fn track(id: &str) -> Track {
    Track::new(info(id, 180), "alice").unwrap()
}

// ============================================================================
// Provider
// ============================================================================

#[derive(Default)]
pub struct FakeProvider {
    initialized: AtomicBool,
    search_results: Mutex<HashMap<String, Vec<TrackInfo>>>,
    recommendations: Mutex<HashMap<String, Vec<TrackInfo>>>,
    failing_recommendations: AtomicBool,
    failing_audio: Mutex<HashSet<String>>,
    held_audio: Mutex<HashMap<String, Arc<Semaphore>>>,
    fetches: Mutex<HashMap<String, usize>>,
    recommendation_calls: AtomicUsize,
}

impl FakeProvider {
    pub fn new() -> Self {
        let provider = Self::default();
        provider.initialized.store(true, Ordering::SeqCst);
        provider
    }

    pub fn uninitialized() -> Self {
        Self::default()
    }

    pub fn set_search(&self, query: &str, results: Vec<TrackInfo>) {
        self.search_results
            .lock()
            .unwrap()
            .insert(query.to_string(), results);
    }

    pub fn set_recommendations(&self, seed: &str, results: Vec<TrackInfo>) {
        self.recommendations
            .lock()
            .unwrap()
            .insert(seed.to_string(), results);
    }

    pub fn fail_recommendations(&self) {
        self.failing_recommendations.store(true, Ordering::SeqCst);
    }

    pub fn fail_audio(&self, id: &str) {
        self.failing_audio.lock().unwrap().insert(id.to_string());
    }

    /// Downloads of `id` block until `release(id)`
    pub fn hold_audio(&self, id: &str) {
        self.held_audio
            .lock()
            .unwrap()
            .insert(id.to_string(), Arc::new(Semaphore::new(0)));
    }

    pub fn release_audio(&self, id: &str) {
        if let Some(gate) = self.held_audio.lock().unwrap().get(id) {
            gate.add_permits(1);
        }
    }

    pub fn fetch_count(&self, id: &str) -> usize {
        self.fetches.lock().unwrap().get(id).copied().unwrap_or(0)
    }

    pub fn recommendation_calls(&self) -> usize {
        self.recommendation_calls.load(Ordering::SeqCst)
    }

    fn check_init(&self) -> Result<(), ProviderError> {
        if self.initialized.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(ProviderError::NotInitialized)
        }
    }
}

#[async_trait]
impl MusicProvider for FakeProvider {
    async fn init(&self) -> Result<(), ProviderError> {
        self.initialized.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn shutdown(&self) {
        self.initialized.store(false, Ordering::SeqCst);
    }

    fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
    }

    async fn search_tracks(&self, query: &str, limit: usize) -> Result<Vec<TrackInfo>, ProviderError> {
        self.check_init()?;
        if query.trim().is_empty() {
            return Err(ProviderError::InvalidQuery("search query is empty".to_string()));
        }
        let results = self
            .search_results
            .lock()
            .unwrap()
            .get(query)
            .cloned()
            .unwrap_or_default();
        Ok(results.into_iter().take(limit).collect())
    }

    async fn get_recommendations(
        &self,
        seed_id: &str,
        limit: usize,
    ) -> Result<Vec<TrackInfo>, ProviderError> {
        self.check_init()?;
        self.recommendation_calls.fetch_add(1, Ordering::SeqCst);
        if self.failing_recommendations.load(Ordering::SeqCst) {
            return Err(ProviderError::Api(503, "unavailable".to_string()));
        }
        let results = self
            .recommendations
            .lock()
            .unwrap()
            .get(seed_id)
            .cloned()
            .unwrap_or_default();
        Ok(results.into_iter().take(limit).collect())
    }

    async fn fetch_audio(&self, track_id: &str) -> Result<AudioStream, ProviderError> {
        self.check_init()?;
        *self
            .fetches
            .lock()
            .unwrap()
            .entry(track_id.to_string())
            .or_default() += 1;

        let gate = self.held_audio.lock().unwrap().get(track_id).cloned();
        if let Some(gate) = gate {
            if let Ok(permit) = gate.acquire().await {
                permit.forget();
            }
        }

        if self.failing_audio.lock().unwrap().contains(track_id) {
            return Err(ProviderError::NoAudioStream(track_id.to_string()));
        }
        let chunks = vec![
            Ok(Bytes::from(format!("audio:{}", track_id))),
            Ok(Bytes::from_static(b":end")),
        ];
        Ok(futures::stream::iter(chunks).boxed())
    }
}

// ============================================================================
// Sink
// ============================================================================

#[derive(Default)]
struct ManualState {
    session: Option<String>,
    current: Option<AudioResource>,
    paused: bool,
    played: Vec<String>,
    /// When set, idle events from `stop()` wait for `release_stops()`
    hold_stops: bool,
    deferred: Vec<ResourceId>,
}

/// Sink whose resources only finish when the test says so
pub struct ManualSink {
    state: Arc<Mutex<ManualState>>,
    events: SinkEventSender,
}

/// Test-side view of a `ManualSink`
#[derive(Clone)]
pub struct SinkProbe {
    state: Arc<Mutex<ManualState>>,
    events: SinkEventSender,
}

impl AudioSink for ManualSink {
    fn subscribe(&mut self, session: Arc<dyn VoiceSession>) {
        self.state.lock().unwrap().session = Some(session.id().to_string());
    }

    fn unsubscribe(&mut self) {
        self.state.lock().unwrap().session = None;
    }

    fn is_subscribed(&self) -> bool {
        self.state.lock().unwrap().session.is_some()
    }

    fn play(&mut self, resource: AudioResource) -> Result<(), SinkError> {
        let mut state = self.state.lock().unwrap();
        if state.session.is_none() {
            return Err(SinkError::NotSubscribed);
        }
        state.played.push(resource.track().id().to_string());
        state.current = Some(resource);
        state.paused = false;
        Ok(())
    }

    fn stop(&mut self) -> bool {
        let mut state = self.state.lock().unwrap();
        let Some(resource) = state.current.take() else {
            return false;
        };
        if state.hold_stops {
            state.deferred.push(resource.id());
        } else {
            let _ = self.events.send(SinkEvent::Idle {
                resource: resource.id(),
            });
        }
        true
    }

    fn pause(&mut self) -> bool {
        let mut state = self.state.lock().unwrap();
        if state.current.is_some() && !state.paused {
            state.paused = true;
            true
        } else {
            false
        }
    }

    fn unpause(&mut self) -> bool {
        let mut state = self.state.lock().unwrap();
        if state.current.is_some() && state.paused {
            state.paused = false;
            true
        } else {
            false
        }
    }

    fn status(&self) -> SinkStatus {
        let state = self.state.lock().unwrap();
        match (&state.current, state.paused) {
            (None, _) => SinkStatus::Idle,
            (Some(_), false) => SinkStatus::Playing,
            (Some(_), true) => SinkStatus::Paused,
        }
    }
}

impl SinkProbe {
    /// Id of the track currently loaded in the sink
    pub fn current(&self) -> Option<String> {
        self.state
            .lock()
            .unwrap()
            .current
            .as_ref()
            .map(|r| r.track().id().to_string())
    }

    pub fn current_gain(&self) -> Option<f32> {
        self.state
            .lock()
            .unwrap()
            .current
            .as_ref()
            .map(|r| r.gain().get())
    }

    pub fn current_resource(&self) -> Option<ResourceId> {
        self.state.lock().unwrap().current.as_ref().map(|r| r.id())
    }

    /// Track ids in the order they were handed to the sink
    pub fn played(&self) -> Vec<String> {
        self.state.lock().unwrap().played.clone()
    }

    pub fn session(&self) -> Option<String> {
        self.state.lock().unwrap().session.clone()
    }

    /// Let the current resource end naturally
    pub fn finish(&self) {
        let finished = self.state.lock().unwrap().current.take();
        let resource = finished.expect("nothing playing");
        self.events
            .send(SinkEvent::Idle {
                resource: resource.id(),
            })
            .unwrap();
    }

    /// Report a playback error for the current resource
    pub fn fail(&self, message: &str) {
        let id = self.current_resource().expect("nothing playing");
        self.events
            .send(SinkEvent::Error {
                resource: id,
                message: message.to_string(),
            })
            .unwrap();
    }

    /// Keep idle events from `stop()` back until `release_stops()`
    pub fn hold_stops(&self) {
        self.state.lock().unwrap().hold_stops = true;
    }

    /// Deliver held idle events and stop holding new ones
    pub fn release_stops(&self) {
        let deferred = {
            let mut state = self.state.lock().unwrap();
            state.hold_stops = false;
            std::mem::take(&mut state.deferred)
        };
        for resource in deferred {
            self.events.send(SinkEvent::Idle { resource }).unwrap();
        }
    }

    /// Inject an arbitrary event
    pub fn send(&self, event: SinkEvent) {
        self.events.send(event).unwrap();
    }
}

// ============================================================================
// Harness
// ============================================================================

pub struct Harness {
    pub engine: PlaybackEngine,
    pub provider: Arc<FakeProvider>,
    pub cache: Arc<StreamCache>,
    pub sink: SinkProbe,
    pub events: broadcast::Receiver<BotEvent>,
    pub cache_dir: TempDir,
}

pub fn harness() -> Harness {
    harness_with(EngineSettings::default())
}

pub fn harness_with(settings: EngineSettings) -> Harness {
    let cache_dir = TempDir::new().unwrap();
    let provider = Arc::new(FakeProvider::new());
    let config = CacheConfig {
        dir: Some(cache_dir.path().to_path_buf()),
        ..CacheConfig::default()
    };
    let cache = Arc::new(StreamCache::new(&config, provider.clone()));

    let (tx, rx) = sink_channel();
    let state = Arc::new(Mutex::new(ManualState::default()));
    let sink = ManualSink {
        state: state.clone(),
        events: tx.clone(),
    };
    let probe = SinkProbe { state, events: tx };

    let bus = EventBus::new(256);
    let events = bus.subscribe();
    let engine = PlaybackEngine::spawn(
        settings,
        cache.clone(),
        provider.clone(),
        Box::new(sink),
        rx,
        bus,
    );

    Harness {
        engine,
        provider,
        cache,
        sink: probe,
        events,
        cache_dir,
    }
}

/// Poll `check` until it holds, failing after two seconds
pub async fn wait_until<F>(what: &str, mut check: F)
where
    F: FnMut() -> bool,
{
    for _ in 0..400 {
        if check() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("timed out waiting for {}", what);
}

/// Poll the engine until it reports `status`
pub async fn wait_for_status(engine: &PlaybackEngine, status: PlaybackStatus) {
    for _ in 0..400 {
        if engine.snapshot().await.unwrap().status == status {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("timed out waiting for engine status {}", status);
}

/// Next event satisfying `pred`, failing after two seconds
pub async fn expect_event<P>(rx: &mut broadcast::Receiver<BotEvent>, mut pred: P) -> BotEvent
where
    P: FnMut(&BotEvent) -> bool,
{
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    loop {
        let event = tokio::time::timeout_at(deadline, rx.recv())
            .await
            .expect("timed out waiting for event")
            .expect("event bus closed");
        if pred(&event) {
            return event;
        }
    }
}
